//! Runtime configuration for the risk engine.
//!
//! Layered with figment: built-in defaults, then `stroke_risk.toml` (or an
//! explicit path), then `STROKE_RISK_*` environment variables. Nested keys use
//! a double underscore, e.g. `STROKE_RISK_MODEL__PATH`.

use crate::attribution::ExplainerKind;
use crate::errors::{RiskError, RiskResult};
use crate::feature_encoder::FEATURE_COUNT;
use crate::result_assembler::DEFAULT_THRESHOLD;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_FILE: &str = "stroke_risk.toml";
pub const ENV_PREFIX: &str = "STROKE_RISK_";
pub const DEFAULT_MODEL_PATH: &str = "models/stroke_gb_v1.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Pin the artifact to a known SHA-256 (hex).
    #[serde(default)]
    pub expected_sha256: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            expected_sha256: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    #[serde(default)]
    pub strategy: ExplainerKind,
    /// Overrides the baseline row shipped with the artifact.
    #[serde(default)]
    pub baseline: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub explainer: ExplainerConfig,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            model: ModelConfig::default(),
            explainer: ExplainerConfig::default(),
            threshold: default_threshold(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> RiskResult<()> {
        if self.model.path.as_os_str().is_empty() {
            return Err(RiskError::config("model.path must be set"));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 || self.threshold >= 1.0 {
            return Err(RiskError::config(format!(
                "threshold {} must lie strictly between 0 and 1",
                self.threshold
            )));
        }
        if let Some(baseline) = &self.explainer.baseline {
            if baseline.len() != FEATURE_COUNT {
                return Err(RiskError::config(format!(
                    "explainer.baseline must have {FEATURE_COUNT} entries, found {}",
                    baseline.len()
                )));
            }
            if baseline.iter().any(|v| !v.is_finite()) {
                return Err(RiskError::config("explainer.baseline entries must be finite"));
            }
        }
        if let Some(sha) = &self.model.expected_sha256 {
            if sha.len() != 64 || !sha.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(RiskError::config("model.expected_sha256 must be 64 hex characters"));
            }
        }
        Ok(())
    }

    /// Configured baseline as a fixed-width row.
    pub fn baseline_row(&self) -> Option<[f64; FEATURE_COUNT]> {
        self.explainer
            .baseline
            .as_ref()
            .and_then(|row| <[f64; FEATURE_COUNT]>::try_from(row.as_slice()).ok())
    }
}

/// Build the figment without extracting, for callers that want to layer more.
pub fn figment(path: Option<&str>) -> Figment {
    Figment::from(Serialized::defaults(RiskConfig::default()))
        .merge(Toml::file(path.unwrap_or(DEFAULT_CONFIG_FILE)))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load and validate configuration. Read once at process start.
pub fn load_config(path: Option<&str>) -> RiskResult<RiskConfig> {
    let config: RiskConfig = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RiskConfig::default();
        config.validate().unwrap();
        assert_eq!(config.threshold, 0.5);
        assert_eq!(config.explainer.strategy, ExplainerKind::Shapley);
        assert!(config.baseline_row().is_none());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = RiskConfig::default();
        config.threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = RiskConfig::default();
        config.explainer.baseline = Some(vec![0.0; 3]);
        assert!(config.validate().is_err());

        let mut config = RiskConfig::default();
        config.model.expected_sha256 = Some("abc".into());
        assert!(config.validate().is_err());
    }
}
