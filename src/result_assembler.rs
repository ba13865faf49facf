//! Packages a probability and its attributions into the record handed to the
//! presentation layer.

use crate::attribution::{AttributionSet, SUM_TOLERANCE};
use crate::errors::{RiskError, RiskResult};
use crate::feature_encoder::BASE_FEATURE_COUNT;
use crate::model_adapter::ScoreResult;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Binary reading of the probability against the decision threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClass {
    Baseline,
    Elevated,
}

impl RiskClass {
    /// `Elevated` strictly above the threshold.
    pub fn classify(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            RiskClass::Elevated
        } else {
            RiskClass::Baseline
        }
    }
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskClass::Baseline => write!(f, "baseline"),
            RiskClass::Elevated => write!(f, "elevated"),
        }
    }
}

/// Three-way banding used for recommendations: low < 30 %, moderate < 70 %, high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    pub fn from_percent(percent: f64) -> Self {
        if percent < 30.0 {
            RiskBand::Low
        } else if percent < 70.0 {
            RiskBand::Moderate
        } else {
            RiskBand::High
        }
    }
}

impl fmt::Display for RiskBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBand::Low => write!(f, "low"),
            RiskBand::Moderate => write!(f, "moderate"),
            RiskBand::High => write!(f, "high"),
        }
    }
}

/// Everything the presentation layer needs, as plain values.
///
/// Output only: a record is built by `assemble`, which checks its invariants,
/// and is never parsed back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub probability: f64,
    pub percent: f64,
    pub classification: RiskClass,
    pub band: RiskBand,
    pub threshold: f64,
    pub attributions: AttributionSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

impl ResultRecord {
    pub fn is_elevated(&self) -> bool {
        self.classification == RiskClass::Elevated
    }

    pub fn with_model(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.model_name = Some(name.into());
        self.model_version = Some(version.into());
        self
    }
}

/// Build the result record, re-checking the attribution invariant.
pub fn assemble(
    probability: ScoreResult,
    attributions: AttributionSet,
    threshold: f64,
) -> RiskResult<ResultRecord> {
    if !threshold.is_finite() || threshold <= 0.0 || threshold >= 1.0 {
        return Err(RiskError::config(format!(
            "decision threshold {threshold} must lie strictly between 0 and 1"
        )));
    }

    let p = probability.probability();
    if attributions.len() != BASE_FEATURE_COUNT {
        return Err(RiskError::attribution(format!(
            "expected {BASE_FEATURE_COUNT} attributions, got {}",
            attributions.len()
        )));
    }
    if attributions.iter().any(|a| !(a.contribution >= 0.0)) {
        return Err(RiskError::attribution("contributions must be non-negative"));
    }
    let total = attributions.total();
    if (total - p).abs() > SUM_TOLERANCE {
        return Err(RiskError::attribution(format!(
            "contributions sum to {total}, probability is {p}"
        )));
    }

    let percent = p * 100.0;
    Ok(ResultRecord {
        probability: p,
        percent,
        classification: RiskClass::classify(p, threshold),
        band: RiskBand::from_percent(percent),
        threshold,
        attributions,
        model_name: None,
        model_version: None,
    })
}
