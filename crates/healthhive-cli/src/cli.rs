use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use healthhive_core::util::parse_yes_no;
use healthhive_core::VisitType;

#[derive(Parser)]
#[command(name = "healthhive")]
#[command(about = "Record community health visits and sync them when online")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Treat the device as offline and queue visits locally
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a visit, queueing it locally when the API is unreachable
    Record(RecordArgs),
    /// Inspect or extend the offline visit queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Show pending visits and last sync time
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Submit all pending visits in one bulk request
    Sync,
    /// Manage the client configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    /// Patient identifier (e.g. JAG-000123)
    #[arg(long, value_name = "ID")]
    pub patient_id: String,
    /// Date of birth as DD/MM/YYYY, used to print the patient's age
    #[arg(long, value_name = "DD/MM/YYYY")]
    pub dob: Option<String>,
    /// Visit type: screening, follow-up, or education
    #[arg(long, default_value_t = VisitType::Screening)]
    pub visit_type: VisitType,
    /// Weight in kilograms
    #[arg(long, value_name = "KG")]
    pub weight: Option<f64>,
    /// Height in centimeters
    #[arg(long, value_name = "CM")]
    pub height: Option<f64>,
    /// Systolic blood pressure (mmHg)
    #[arg(long)]
    pub systolic: Option<f64>,
    /// Diastolic blood pressure (mmHg)
    #[arg(long)]
    pub diastolic: Option<f64>,
    /// Random blood glucose (mg/dL)
    #[arg(long)]
    pub glucose_random: Option<f64>,
    /// Fasting blood glucose (mg/dL)
    #[arg(long)]
    pub glucose_fasting: Option<f64>,
    /// Current medication as NAME:DOSAGE (repeatable)
    #[arg(long = "medication", value_name = "NAME:DOSAGE")]
    pub medications: Vec<String>,
    /// Whether medications were provided (y/n)
    #[arg(long, value_parser = parse_flag)]
    pub medications_provided: Option<bool>,
    /// Whether medications are taken regularly (y/n)
    #[arg(long, value_parser = parse_flag)]
    pub taken_regularly: Option<bool>,
    /// Free-text list of previous medications
    #[arg(long, value_name = "TEXT")]
    pub previous_medications: Option<String>,
}

#[derive(Subcommand)]
pub enum QueueCommands {
    /// Queue a raw visit payload (JSON object) from a file or stdin
    Add {
        /// Payload file (stdin when omitted)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
    /// List pending visits in submission order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// API base URL (e.g. <https://api.example.com>)
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Bearer access token for the API
        #[arg(long, value_name = "TOKEN")]
        access_token: Option<String>,
        /// Request timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,
    },
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    parse_yes_no(raw).ok_or_else(|| format!("expected y or n, got '{raw}'"))
}
