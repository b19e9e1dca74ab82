use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] healthhive_core::Error),
    #[error(transparent)]
    Api(#[from] healthhive_core::SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Patient ID cannot be empty")]
    EmptyPatientId,
    #[error("Invalid medication '{0}': expected NAME:DOSAGE")]
    InvalidMedication(String),
    #[error("Invalid date of birth '{0}': expected DD/MM/YYYY")]
    InvalidDateOfBirth(String),
    #[error("No visit payload provided")]
    EmptyPayload,
    #[error("Invalid visit payload: {0}")]
    InvalidPayload(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync failed, {pending} visit(s) still pending: {reason}")]
    SyncFailed { pending: usize, reason: String },
    #[error(
        "Sync needs review: {errors} error(s) and {conflicts} conflict(s) reported, {pending} visit(s) kept"
    )]
    SyncNeedsReview {
        pending: usize,
        errors: usize,
        conflicts: usize,
    },
}
