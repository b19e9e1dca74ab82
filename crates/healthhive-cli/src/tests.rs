use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, TimeDelta, Utc};
use clap::Parser;
use healthhive_core::sync::{SyncResult, VisitSyncApi};
use healthhive_core::{
    BulkSyncResponse, ClientConfig, PendingVisitRecord, SaveOutcome, SyncError, SyncSummary,
    VisitPayload, VisitType,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use crate::cli::{Cli, Commands, CompletionShell, ConfigCommands, QueueCommands};
use crate::commands::common::{format_pending_lines, format_relative_time, open_queue, Context};
use crate::commands::completions::render_completions;
use crate::commands::config::{apply_init_values, run_config_init};
use crate::commands::queue::{parse_visit_payload, run_queue_add};
use crate::commands::record::{
    build_visit, parse_age, parse_medication, save_recorded_visit,
};
use crate::commands::status::format_status_lines;
use crate::commands::sync::drain_queue;
use crate::error::CliError;

fn temp_db() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("healthhive.db");
    (dir, path)
}

fn record_args(extra: &[&str]) -> crate::cli::RecordArgs {
    let mut argv = vec!["healthhive", "record", "--patient-id", "JAG-000123"];
    argv.extend_from_slice(extra);
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Record(args) => args,
        _ => panic!("expected record command"),
    }
}

struct StubApi {
    response: Option<BulkSyncResponse>,
    calls: AtomicUsize,
}

impl StubApi {
    fn answering(response: BulkSyncResponse) -> Self {
        Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        }
    }

    fn unreachable() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }
}

impl VisitSyncApi for StubApi {
    async fn record_visit(&self, _visit: &VisitPayload) -> SyncResult<Value> {
        Err(SyncError::Network("unreachable".to_string()))
    }

    async fn bulk_sync_visits(
        &self,
        _visits: &[PendingVisitRecord],
    ) -> SyncResult<BulkSyncResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| SyncError::Network("unreachable".to_string()))
    }
}

#[test]
fn record_args_build_visit_with_derived_fields() {
    let args = record_args(&[
        "--visit-type",
        "follow-up",
        "--weight",
        "81",
        "--height",
        "160",
        "--systolic",
        "150",
        "--diastolic",
        "95",
        "--medication",
        "Amlodipine:5mg",
        "--medications-provided",
        "y",
    ]);

    let visit = build_visit(args).unwrap();

    assert_eq!(visit.patient_id, "JAG-000123");
    assert_eq!(visit.visit_type, VisitType::FollowUp);
    assert_eq!(visit.vitals.bmi, Some(31.6));
    assert!(visit.flagged_for_follow_up);
    assert_eq!(visit.current_medications.len(), 1);
    assert_eq!(visit.current_medications[0].name, "Amlodipine");
    assert_eq!(visit.current_medications[0].dosage, "5mg");
    assert_eq!(visit.medications_provided, Some(true));
    assert_eq!(visit.medications_taken_regularly, None);
}

#[test]
fn record_rejects_invalid_yes_no_flag() {
    let result = Cli::try_parse_from([
        "healthhive",
        "record",
        "--patient-id",
        "JAG-1",
        "--taken-regularly",
        "sometimes",
    ]);
    assert!(result.is_err());
}

#[test]
fn record_dob_gives_age() {
    let args = record_args(&["--dob", "19/10/1980"]);
    let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

    assert_eq!(parse_age(args.dob.as_deref().unwrap(), today).unwrap(), 45);
    assert!(matches!(
        parse_age("1980-10-19", today),
        Err(CliError::InvalidDateOfBirth(_))
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_record_queues_without_valid_api_url() {
    let (_dir, db_path) = temp_db();
    let config = ClientConfig {
        api_base_url: "not a url".to_string(),
        ..ClientConfig::default()
    };
    let context = Context::from_config(config, Some(db_path.clone()), true);
    assert!(context.api_client().is_err());

    let queue = open_queue(&db_path).await.unwrap();
    let visit = build_visit(record_args(&[])).unwrap();
    let outcome = save_recorded_visit(visit, &queue, &context).await.unwrap();

    assert!(matches!(outcome, SaveOutcome::Queued { pending: 1 }));
    assert_eq!(queue.load().await[0].visit.patient_id, "JAG-000123");
}

#[test]
fn record_rejects_blank_patient_id() {
    let mut args = record_args(&[]);
    args.patient_id = "   ".to_string();
    assert!(matches!(build_visit(args), Err(CliError::EmptyPatientId)));
}

#[test]
fn parse_medication_requires_name_and_dosage() {
    let medication = parse_medication(" Metformin : 500mg ").unwrap();
    assert_eq!(medication.name, "Metformin");
    assert_eq!(medication.dosage, "500mg");
    assert_eq!(medication.quantity, 30);

    assert!(parse_medication("Metformin").is_err());
    assert!(parse_medication(":500mg").is_err());
}

#[test]
fn global_flags_parse_after_subcommand() {
    let cli = Cli::try_parse_from(["healthhive", "status", "--json", "--offline"]).unwrap();
    assert!(cli.offline);
    assert!(matches!(cli.command, Commands::Status { json: true }));

    let cli = Cli::try_parse_from(["healthhive", "queue", "list", "--db-path", "/tmp/x.db"]).unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/x.db")));
    assert!(matches!(
        cli.command,
        Commands::Queue {
            command: QueueCommands::List { json: false }
        }
    ));
}

#[test]
fn config_show_parses() {
    let cli = Cli::try_parse_from(["healthhive", "config", "show", "--json"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            command: ConfigCommands::Show { json: true }
        }
    ));
}

#[test]
fn parse_visit_payload_keeps_unknown_fields() {
    let visit = parse_visit_payload(
        r#"{"patient_id": "JAG-7", "visit_type": "screening", "vitals": {"weight": 50, "height": 160}, "barangay": "San Isidro"}"#,
    )
    .unwrap();

    assert_eq!(visit.patient_id, "JAG-7");
    assert_eq!(visit.vitals.bmi, Some(19.5));
    assert_eq!(visit.extra.get("barangay"), Some(&json!("San Isidro")));
}

#[test]
fn parse_visit_payload_rejects_bad_input() {
    assert!(matches!(
        parse_visit_payload("[1, 2]"),
        Err(CliError::InvalidPayload(_))
    ));
    assert!(matches!(
        parse_visit_payload(r#"{"patient_id": " ", "visit_type": "screening"}"#),
        Err(CliError::EmptyPatientId)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
    assert_eq!(format_relative_time(now - 14 * 86_400_000, now), "2w ago");
}

#[test]
fn pending_lines_are_numbered_in_order() {
    let mut flagged = VisitPayload::new("JAG-2", VisitType::FollowUp);
    flagged.flagged_for_follow_up = true;
    let records = vec![
        PendingVisitRecord::new(VisitPayload::new("JAG-1", VisitType::Screening)),
        PendingVisitRecord::new(flagged),
    ];

    let lines = format_pending_lines(&records);

    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("  1. "));
    assert!(lines[0].contains("JAG-1"));
    assert!(lines[1].starts_with("  2. "));
    assert!(lines[1].ends_with("follow-up"));
}

#[test]
fn status_lines_prompt_sync_when_pending() {
    let summary = SyncSummary {
        pending: 3,
        quarantined: 0,
        last_synced_at: None,
        overdue: true,
    };
    let lines = format_status_lines(&summary, false);
    assert_eq!(lines[0], "Pending visits: 3");
    assert_eq!(lines[1], "Last sync: never");
    assert!(lines.iter().any(|line| line.contains("healthhive sync")));
}

#[test]
fn status_lines_warn_when_overdue_and_empty() {
    let summary = SyncSummary {
        pending: 0,
        quarantined: 1,
        last_synced_at: Some(Utc::now() - TimeDelta::hours(30)),
        overdue: true,
    };
    let lines = format_status_lines(&summary, true);
    assert!(lines.iter().any(|line| line.contains("set aside: 1")));
    assert!(lines.iter().any(|line| line.starts_with("Mode: offline")));
    assert_eq!(lines.last().unwrap(), "No sync in the last 24 hours.");
}

#[test]
fn context_flags_override_config() {
    let config = ClientConfig {
        db_path: Some(PathBuf::from("/from/config.db")),
        ..ClientConfig::default()
    };

    let context = Context::from_config(config.clone(), None, false);
    assert_eq!(context.db_path, PathBuf::from("/from/config.db"));
    assert!(!context.offline);

    let context = Context::from_config(
        ClientConfig {
            force_offline: true,
            ..config
        },
        Some(PathBuf::from("/from/flag.db")),
        false,
    );
    assert_eq!(context.db_path, PathBuf::from("/from/flag.db"));
    assert!(context.offline);
}

#[test]
fn context_rejects_invalid_api_url() {
    let config = ClientConfig {
        api_base_url: "localhost:8000".to_string(),
        ..ClientConfig::default()
    };
    let context = Context::from_config(config, None, false);
    assert!(context.api_client().is_err());
}

#[test]
fn config_init_merges_into_existing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    run_config_init(
        &path,
        Some("https://api.healthhive.ph/".to_string()),
        Some("token".to_string()),
        None,
    )
    .unwrap();
    run_config_init(&path, None, None, Some(10)).unwrap();

    let config = ClientConfig::load_from_path(&path).unwrap();
    assert_eq!(config.api_base_url, "https://api.healthhive.ph");
    assert_eq!(config.access_token.as_deref(), Some("token"));
    assert_eq!(config.request_timeout_secs, 10);
}

#[test]
fn apply_init_values_ignores_blank_values() {
    let config = apply_init_values(
        ClientConfig::default(),
        Some("  ".to_string()),
        Some(String::new()),
        None,
    );
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn completions_mention_binary_name() {
    for shell in [CompletionShell::Bash, CompletionShell::Zsh, CompletionShell::Fish] {
        let script = String::from_utf8(render_completions(shell)).unwrap();
        assert!(script.contains("healthhive"), "{shell:?} completions");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_add_persists_across_reopen() {
    let (dir, db_path) = temp_db();
    let payload = dir.path().join("visit.json");
    std::fs::write(&payload, r#"{"patient_id": "JAG-9", "visit_type": "education"}"#).unwrap();

    run_queue_add(Some(&payload), &db_path).await.unwrap();
    run_queue_add(Some(&payload), &db_path).await.unwrap();

    let queue = open_queue(&db_path).await.unwrap();
    assert_eq!(queue.pending_count(), 2);
    let records = queue.load().await;
    assert_eq!(records[0].visit.visit_type, VisitType::Education);
}

#[tokio::test(flavor = "multi_thread")]
async fn queue_add_rejects_empty_file() {
    let (dir, db_path) = temp_db();
    let payload = dir.path().join("empty.json");
    std::fs::write(&payload, "  \n").unwrap();

    let result = run_queue_add(Some(&payload), &db_path).await;
    assert!(matches!(result, Err(CliError::EmptyPayload)));
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_reports_nothing_to_sync() {
    let (_dir, db_path) = temp_db();
    let queue = open_queue(&db_path).await.unwrap();
    let api = StubApi::unreachable();

    let message = drain_queue(&queue, &api).await.unwrap();

    assert_eq!(message, "No pending visits to sync.");
    assert_eq!(api.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_clears_on_clean_response() {
    let (_dir, db_path) = temp_db();
    let queue = open_queue(&db_path).await.unwrap();
    queue
        .enqueue(VisitPayload::new("JAG-1", VisitType::Screening))
        .await
        .unwrap();

    let api = StubApi::answering(BulkSyncResponse::default());
    let message = drain_queue(&queue, &api).await.unwrap();

    assert_eq!(message, "Synced 1 visit(s).");
    let reopened = open_queue(&db_path).await.unwrap();
    assert_eq!(reopened.pending_count(), 0);
    assert!(reopened.summary().await.last_synced_at.is_some());
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_distinguishes_review_from_failure() {
    let (_dir, db_path) = temp_db();
    let queue = open_queue(&db_path).await.unwrap();
    queue
        .enqueue(VisitPayload::new("JAG-1", VisitType::Screening))
        .await
        .unwrap();

    let conflicted = StubApi::answering(BulkSyncResponse {
        success: Some(Vec::new()),
        errors: Vec::new(),
        conflicts: vec![json!({ "patient_id": "JAG-1" })],
    });
    let review = drain_queue(&queue, &conflicted).await.unwrap_err();
    assert!(matches!(
        review,
        CliError::SyncNeedsReview {
            pending: 1,
            errors: 0,
            conflicts: 1
        }
    ));

    let failed = drain_queue(&queue, &StubApi::unreachable()).await.unwrap_err();
    assert!(matches!(failed, CliError::SyncFailed { pending: 1, .. }));
    assert_eq!(queue.load().await.len(), 1);
}
