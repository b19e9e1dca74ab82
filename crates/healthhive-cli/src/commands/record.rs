use chrono::{Local, NaiveDate};
use healthhive_core::util::normalize_text_option;
use healthhive_core::vitals::{age_from_dob, BmiCategory, RiskLevel};
use healthhive_core::{AssumeOnline, Medication, SaveOutcome, VisitPayload, VisitRecorder, Vitals};

use crate::cli::RecordArgs;
use crate::commands::common::{open_queue, Context, LocalQueue};
use crate::error::CliError;

pub async fn run_record(args: RecordArgs, context: &Context) -> Result<(), CliError> {
    let age = args
        .dob
        .as_deref()
        .map(|dob| parse_age(dob, Local::now().date_naive()))
        .transpose()?;
    let visit = build_visit(args)?;
    if let Some(age) = age {
        println!("Age: {age}");
    }
    print_assessment(&visit);

    let queue = open_queue(&context.db_path).await?;
    match save_recorded_visit(visit, &queue, context).await? {
        SaveOutcome::Recorded(response) => {
            let visit_id = response
                .get("visit_id")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            println!("Visit saved ({visit_id})");
        }
        SaveOutcome::Queued { pending } => {
            println!("Visit saved locally, {pending} pending sync");
        }
    }
    Ok(())
}

/// Queue directly when offline; the API client is only built when online.
pub async fn save_recorded_visit(
    visit: VisitPayload,
    queue: &LocalQueue,
    context: &Context,
) -> Result<SaveOutcome, CliError> {
    if context.offline {
        let pending = queue.enqueue(visit).await?;
        return Ok(SaveOutcome::Queued { pending });
    }

    let api = context.api_client()?;
    let recorder = VisitRecorder::new(queue, &api, AssumeOnline);
    Ok(recorder.save_visit(visit).await?)
}

pub fn build_visit(args: RecordArgs) -> Result<VisitPayload, CliError> {
    let patient_id = args.patient_id.trim();
    if patient_id.is_empty() {
        return Err(CliError::EmptyPatientId);
    }

    let mut visit = VisitPayload::new(patient_id, args.visit_type);
    visit.vitals = Vitals {
        weight: args.weight,
        height: args.height,
        bmi: None,
        systolic: args.systolic,
        diastolic: args.diastolic,
        glucose_random: args.glucose_random,
        glucose_fasting: args.glucose_fasting,
    };
    visit.current_medications = args
        .medications
        .iter()
        .map(|raw| parse_medication(raw))
        .collect::<Result<_, _>>()?;
    visit.medications_provided = args.medications_provided;
    visit.medications_taken_regularly = args.taken_regularly;
    visit.previous_medications = normalize_text_option(args.previous_medications);

    Ok(visit.with_derived_fields())
}

pub fn parse_medication(raw: &str) -> Result<Medication, CliError> {
    let Some((name, dosage)) = raw.split_once(':') else {
        return Err(CliError::InvalidMedication(raw.to_string()));
    };
    let (name, dosage) = (name.trim(), dosage.trim());
    if name.is_empty() || dosage.is_empty() {
        return Err(CliError::InvalidMedication(raw.to_string()));
    }
    Ok(Medication::new(name, dosage))
}

pub fn parse_age(dob: &str, today: NaiveDate) -> Result<u32, CliError> {
    age_from_dob(dob, today).ok_or_else(|| CliError::InvalidDateOfBirth(dob.to_string()))
}

fn print_assessment(visit: &VisitPayload) {
    if let Some(bmi) = visit.vitals.bmi {
        println!("BMI {bmi:.1} ({})", BmiCategory::from_bmi(bmi));
    }
    let risk = RiskLevel::assess(&visit.vitals);
    if risk != RiskLevel::Normal {
        println!("Risk level: {risk}");
    }
    if visit.flagged_for_follow_up {
        println!("Flagged for follow-up");
    }
}
