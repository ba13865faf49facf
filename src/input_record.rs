//! Questionnaire input for a single risk assessment.
//!
//! `InputRecord` is the typed, validated form of the eight answers. `RawAnswers`
//! is the loose shape a form or JSON payload arrives in; converting it is where
//! missing fields are caught.

use crate::errors::{RiskError, RiskResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_AGE: f64 = 0.0;
pub const MAX_AGE: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkType {
    GovtJob,
    NeverWorked,
    Private,
    SelfEmployed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmokingStatus {
    FormerlySmoked,
    NeverSmoked,
    Smokes,
}

/// Lowercase and fold separators so "Self-employed", "self_employed" and
/// "SELF EMPLOYED" compare equal.
fn normalize_label(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

impl FromStr for Sex {
    type Err = RiskError;

    fn from_str(input: &str) -> Result<Sex, Self::Err> {
        match normalize_label(input).as_str() {
            "female" => Ok(Sex::Female),
            "male" => Ok(Sex::Male),
            _ => Err(RiskError::validation("gender", format!("unknown value '{input}'"))),
        }
    }
}

impl FromStr for WorkType {
    type Err = RiskError;

    fn from_str(input: &str) -> Result<WorkType, Self::Err> {
        match normalize_label(input).as_str() {
            "govt_job" | "government" => Ok(WorkType::GovtJob),
            "never_worked" => Ok(WorkType::NeverWorked),
            "private" => Ok(WorkType::Private),
            "self_employed" => Ok(WorkType::SelfEmployed),
            _ => Err(RiskError::validation("work_type", format!("unknown value '{input}'"))),
        }
    }
}

impl FromStr for SmokingStatus {
    type Err = RiskError;

    fn from_str(input: &str) -> Result<SmokingStatus, Self::Err> {
        match normalize_label(input).as_str() {
            "formerly_smoked" | "formerly" => Ok(SmokingStatus::FormerlySmoked),
            "never_smoked" | "never" => Ok(SmokingStatus::NeverSmoked),
            "smokes" | "currently" => Ok(SmokingStatus::Smokes),
            _ => Err(RiskError::validation(
                "smoking_status",
                format!("unknown value '{input}'"),
            )),
        }
    }
}

impl Sex {
    /// Questionnaire label, as used in the encoding table.
    pub const fn label(self) -> &'static str {
        match self {
            Sex::Female => "Female",
            Sex::Male => "Male",
        }
    }
}

impl WorkType {
    pub const fn label(self) -> &'static str {
        match self {
            WorkType::GovtJob => "Govt_job",
            WorkType::NeverWorked => "Never_worked",
            WorkType::Private => "Private",
            WorkType::SelfEmployed => "Self-employed",
        }
    }
}

impl SmokingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SmokingStatus::FormerlySmoked => "formerly smoked",
            SmokingStatus::NeverSmoked => "never smoked",
            SmokingStatus::Smokes => "smokes",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for SmokingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parse a Yes/No answer.
pub fn parse_yes_no(field: &str, input: &str) -> RiskResult<bool> {
    match normalize_label(input).as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err(RiskError::validation(field, format!("expected Yes or No, got '{input}'"))),
    }
}

/// The eight self-reported attributes for one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputRecord {
    pub age: f64,
    pub gender: Sex,
    pub ever_married: bool,
    pub work_type: WorkType,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub avg_glucose_level: f64,
    pub smoking_status: SmokingStatus,
}

impl InputRecord {
    /// Build a record, rejecting out-of-domain numbers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        age: f64,
        gender: Sex,
        ever_married: bool,
        work_type: WorkType,
        hypertension: bool,
        heart_disease: bool,
        avg_glucose_level: f64,
        smoking_status: SmokingStatus,
    ) -> RiskResult<Self> {
        let record = Self {
            age,
            gender,
            ever_married,
            work_type,
            hypertension,
            heart_disease,
            avg_glucose_level,
            smoking_status,
        };
        record.validate()?;
        Ok(record)
    }

    /// Check the numeric fields against their declared domains.
    ///
    /// The enum and boolean fields are valid by construction.
    pub fn validate(&self) -> RiskResult<()> {
        if !self.age.is_finite() {
            return Err(RiskError::validation("age", "must be a finite number"));
        }
        if !(MIN_AGE..=MAX_AGE).contains(&self.age) {
            return Err(RiskError::validation(
                "age",
                format!("{} is outside {MIN_AGE}..={MAX_AGE}", self.age),
            ));
        }
        if !self.avg_glucose_level.is_finite() {
            return Err(RiskError::validation("avg_glucose_level", "must be a finite number"));
        }
        if self.avg_glucose_level <= 0.0 {
            return Err(RiskError::validation(
                "avg_glucose_level",
                format!("{} must be greater than 0", self.avg_glucose_level),
            ));
        }
        Ok(())
    }
}

/// Answers as submitted by the questionnaire, before any checking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawAnswers {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub ever_married: Option<String>,
    pub work_type: Option<String>,
    pub hypertension: Option<String>,
    pub heart_disease: Option<String>,
    pub avg_glucose_level: Option<f64>,
    pub smoking_status: Option<String>,
}

fn required<T>(field: &str, value: Option<T>) -> RiskResult<T> {
    value.ok_or_else(|| RiskError::validation(field, "missing answer"))
}

impl TryFrom<RawAnswers> for InputRecord {
    type Error = RiskError;

    fn try_from(raw: RawAnswers) -> Result<Self, Self::Error> {
        let age = required("age", raw.age)?;
        let gender: Sex = required("gender", raw.gender)?.parse()?;
        let ever_married =
            parse_yes_no("ever_married", &required("ever_married", raw.ever_married)?)?;
        let work_type: WorkType = required("work_type", raw.work_type)?.parse()?;
        let hypertension =
            parse_yes_no("hypertension", &required("hypertension", raw.hypertension)?)?;
        let heart_disease =
            parse_yes_no("heart_disease", &required("heart_disease", raw.heart_disease)?)?;
        let avg_glucose_level = required("avg_glucose_level", raw.avg_glucose_level)?;
        let smoking_status: SmokingStatus =
            required("smoking_status", raw.smoking_status)?.parse()?;

        InputRecord::new(
            age,
            gender,
            ever_married,
            work_type,
            hypertension,
            heart_disease,
            avg_glucose_level,
            smoking_status,
        )
    }
}
