//! Derived vitals fields: BMI, risk level, follow-up flag, and age.
//!
//! Thresholds follow the screening protocol used by the field forms:
//! hypertension at 140/90, diabetes at 200 mg/dL random or 126 mg/dL
//! fasting glucose, and Asian BMI cut-offs.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Vitals;

/// Body-mass index rounded to one decimal.
///
/// Returns `None` unless both weight (kg) and height (cm) are positive.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if !(weight_kg > 0.0 && height_cm > 0.0) {
        return None;
    }
    let height_m = height_cm / 100.0;
    let value = weight_kg / (height_m * height_m);
    Some((value * 10.0).round() / 10.0)
}

/// BMI category using Asian-Pacific cut-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    ObeseI,
    ObeseII,
}

impl BmiCategory {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            Self::Underweight
        } else if bmi < 23.0 {
            Self::Normal
        } else if bmi < 25.0 {
            Self::Overweight
        } else if bmi < 30.0 {
            Self::ObeseI
        } else {
            Self::ObeseII
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Underweight => "Underweight",
            Self::Normal => "Normal",
            Self::Overweight => "Overweight",
            Self::ObeseI => "Obese I",
            Self::ObeseII => "Obese II",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cardiometabolic risk tier derived from blood pressure and glucose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Normal,
    Elevated,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl RiskLevel {
    /// Assess risk from vitals; the first tier whose threshold is met wins.
    pub fn assess(vitals: &Vitals) -> Self {
        let glucose = vitals.glucose_random.or(vitals.glucose_fasting);
        let meets = |systolic: f64, diastolic: f64, glucose_limit: f64| {
            vitals.systolic.is_some_and(|value| value >= systolic)
                || vitals.diastolic.is_some_and(|value| value >= diastolic)
                || glucose.is_some_and(|value| value >= glucose_limit)
        };

        if meets(180.0, 110.0, 300.0) {
            Self::VeryHigh
        } else if meets(160.0, 100.0, 250.0) {
            Self::High
        } else if meets(140.0, 90.0, 200.0) {
            Self::Elevated
        } else {
            Self::Normal
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Elevated => "Elevated",
            Self::High => "High",
            Self::VeryHigh => "Very High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether the visit should be flagged for follow-up.
///
/// Blood pressure only counts when both readings are present and both are
/// at or above 140/90.
pub fn needs_follow_up(vitals: &Vitals) -> bool {
    let hypertensive = matches!(
        (vitals.systolic, vitals.diastolic),
        (Some(systolic), Some(diastolic)) if systolic >= 140.0 && diastolic >= 90.0
    );
    let bmi = vitals.bmi.or_else(|| match (vitals.weight, vitals.height) {
        (Some(weight), Some(height)) => bmi(weight, height),
        _ => None,
    });

    hypertensive
        || vitals.glucose_random.is_some_and(|value| value >= 200.0)
        || vitals.glucose_fasting.is_some_and(|value| value >= 126.0)
        || bmi.is_some_and(|value| value >= 30.0)
}

/// Whole years between a `dd/mm/yyyy` date of birth and `today`.
pub fn age_from_dob(dob: &str, today: NaiveDate) -> Option<u32> {
    let mut parts = dob.trim().split('/');
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let year = parts.next()?.trim().parse::<i32>().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let birth = NaiveDate::from_ymd_opt(year, month, day)?;
    if birth > today {
        return None;
    }

    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}
