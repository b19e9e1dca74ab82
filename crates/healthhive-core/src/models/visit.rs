//! Visit payload model
//!
//! The payload is what a screening or follow-up form assembles before it is
//! posted to `/api/visits`. Fields the client does not know about are kept in
//! `extra` so payloads round-trip through the offline queue untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::vitals;

/// Kind of visit being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum VisitType {
    /// First-contact vitals screening
    #[default]
    Screening,
    /// Scheduled follow-up of a known patient
    FollowUp,
    /// Health education session
    Education,
}

impl VisitType {
    /// Wire name used by the API
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Screening => "screening",
            Self::FollowUp => "follow-up",
            Self::Education => "education",
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VisitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "screening" => Ok(Self::Screening),
            "follow-up" | "followup" | "follow_up" => Ok(Self::FollowUp),
            "education" => Ok(Self::Education),
            other => Err(format!("unknown visit type '{other}'")),
        }
    }
}

/// Vital signs captured during a visit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    /// Weight in kilograms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Height in centimetres
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Body-mass index, one decimal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bmi: Option<f64>,
    /// Systolic blood pressure (mmHg)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<f64>,
    /// Diastolic blood pressure (mmHg)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<f64>,
    /// Random blood glucose (mg/dL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glucose_random: Option<f64>,
    /// Fasting blood glucose (mg/dL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glucose_fasting: Option<f64>,
}

/// A medication the patient is currently taking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default = "default_instructions")]
    pub instructions: String,
}

const fn default_quantity() -> u32 {
    30
}

fn default_instructions() -> String {
    "Take as prescribed".to_string()
}

impl Medication {
    /// Create a medication entry with the default 30-day supply
    pub fn new(name: impl Into<String>, dosage: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dosage: dosage.into(),
            quantity: default_quantity(),
            instructions: default_instructions(),
        }
    }
}

/// A visit as assembled by the recording workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitPayload {
    /// Registry identifier of the patient (e.g. `JAG-000123`)
    pub patient_id: String,
    pub visit_type: VisitType,
    /// Server-side visit identifier, when the client already has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visit_id: Option<String>,
    #[serde(default)]
    pub vitals: Vitals,
    #[serde(default)]
    pub current_medications: Vec<Medication>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications_provided: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medications_taken_regularly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_medications: Option<String>,
    #[serde(default)]
    pub flagged_for_follow_up: bool,
    /// Fields not modelled by this client, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VisitPayload {
    /// Create an empty payload for a patient
    pub fn new(patient_id: impl Into<String>, visit_type: VisitType) -> Self {
        Self {
            patient_id: patient_id.into(),
            visit_type,
            visit_id: None,
            vitals: Vitals::default(),
            current_medications: Vec::new(),
            medications_provided: None,
            medications_taken_regularly: None,
            previous_medications: None,
            flagged_for_follow_up: false,
            extra: Map::new(),
        }
    }

    /// Fill `vitals.bmi` from weight/height and recompute the follow-up flag.
    #[must_use]
    pub fn with_derived_fields(mut self) -> Self {
        if let (Some(weight), Some(height)) = (self.vitals.weight, self.vitals.height) {
            if let Some(bmi) = vitals::bmi(weight, height) {
                self.vitals.bmi = Some(bmi);
            }
        }
        self.flagged_for_follow_up = vitals::needs_follow_up(&self.vitals);
        self
    }
}
