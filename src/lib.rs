//! Library root for the `stroke_risk` crate
//!
//! Risk scoring and attribution: questionnaire answers are encoded, scored by a
//! frozen classifier, and the probability is split across the eight answers.

// Core error handling
pub mod errors;

// Input and encoding
pub mod feature_encoder;
pub mod input_record;

// Classifier seam
pub mod model_adapter;
pub mod model_artifact;
pub mod risk_model;

// Explanation and results
pub mod attribution;
pub mod guidance;
pub mod result_assembler;

// Composed pipeline
pub mod risk_engine;

// Configuration & CLI
pub mod cli;
pub mod config;

#[cfg(test)]
mod tests {
    pub mod engine_scenarios;
    pub mod schema_consistency;
    pub mod test_utils;
}

pub use attribution::{Attribution, AttributionSet, ExplainerKind};
pub use errors::{RiskError, RiskResult};
pub use feature_encoder::{encode, FeatureVector};
pub use input_record::{InputRecord, RawAnswers, Sex, SmokingStatus, WorkType};
pub use model_adapter::{ModelAdapter, ScoreResult};
pub use result_assembler::{ResultRecord, RiskBand, RiskClass};
pub use risk_engine::RiskEngine;
