//! On-disk classifier artifacts.
//!
//! An artifact is a JSON document carrying the fitted model together with the
//! feature schema and category codes it was trained on. Loading verifies that
//! schema against the encoder before anything is scored.

use crate::errors::{RiskError, RiskResult};
use crate::feature_encoder::{encoding_table_map, ENCODING_VERSION, FEATURE_COUNT, FEATURE_NAMES};
use crate::risk_model::{GradientBoostedTrees, LogisticModel, RiskModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBody {
    Logistic(LogisticModel),
    GradientBoosting(GradientBoostedTrees),
}

impl ModelBody {
    fn validate(&self) -> Result<(), String> {
        match self {
            ModelBody::Logistic(model) => model.validate(),
            ModelBody::GradientBoosting(model) => model.validate(),
        }
    }

    pub fn into_model(self) -> Arc<dyn RiskModel> {
        match self {
            ModelBody::Logistic(model) => Arc::new(model),
            ModelBody::GradientBoosting(model) => Arc::new(model),
        }
    }
}

/// Serialized classifier plus the schema it expects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelArtifact {
    pub name: String,
    pub version: String,
    pub encoding_version: String,
    pub feature_names: Vec<String>,
    pub categories: BTreeMap<String, BTreeMap<String, u8>>,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    /// Reference row for the local explainer.
    #[serde(default)]
    pub baseline: Option<Vec<f64>>,
    /// Overrides the model's own global importances when present.
    #[serde(default)]
    pub feature_importances: Option<Vec<f64>>,
    pub model: ModelBody,
}

impl ModelArtifact {
    /// Check the artifact against the encoder's schema.
    ///
    /// Any mismatch here would make every prediction silently wrong, so each
    /// one is a load failure.
    pub fn verify_schema(&self) -> Result<(), String> {
        if self.encoding_version != ENCODING_VERSION {
            return Err(format!(
                "encoding version '{}' does not match encoder '{}'",
                self.encoding_version, ENCODING_VERSION
            ));
        }

        if self.feature_names.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {FEATURE_COUNT} features, artifact declares {}",
                self.feature_names.len()
            ));
        }
        for (i, (declared, expected)) in self.feature_names.iter().zip(FEATURE_NAMES).enumerate() {
            if declared != expected {
                return Err(format!(
                    "feature {i} is '{declared}', encoder produces '{expected}'"
                ));
            }
        }

        let expected_categories = encoding_table_map();
        if self.categories != expected_categories {
            let detail = expected_categories
                .iter()
                .find(|(attribute, codes)| self.categories.get(*attribute) != Some(*codes))
                .map(|(attribute, _)| format!("codes for '{attribute}' differ"))
                .unwrap_or_else(|| "unexpected category attributes".to_string());
            return Err(format!("category encoding mismatch: {detail}"));
        }

        if let Some(baseline) = &self.baseline {
            check_row("baseline", baseline)?;
        }
        if let Some(importances) = &self.feature_importances {
            check_row("feature_importances", importances)?;
            if importances.iter().any(|v| *v < 0.0) {
                return Err("feature_importances must be non-negative".to_string());
            }
        }

        self.model.validate()
    }
}

fn check_row(what: &str, row: &[f64]) -> Result<(), String> {
    if row.len() != FEATURE_COUNT {
        return Err(format!("{what} must have {FEATURE_COUNT} entries, found {}", row.len()));
    }
    if row.iter().any(|v| !v.is_finite()) {
        return Err(format!("{what} entries must be finite"));
    }
    Ok(())
}

/// Lowercase hex SHA-256 of the artifact bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A verified artifact and where it came from.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub artifact: ModelArtifact,
    pub path: String,
    pub sha256: String,
}

/// Parse and verify artifact bytes. `source` is only used in error messages.
pub fn parse_artifact(
    source: &str,
    bytes: &[u8],
    expected_sha256: Option<&str>,
) -> RiskResult<LoadedArtifact> {
    let sha256 = fingerprint(bytes);
    if let Some(expected) = expected_sha256 {
        if !expected.trim().eq_ignore_ascii_case(&sha256) {
            return Err(RiskError::model_load(
                source,
                format!("checksum mismatch: expected {expected}, found {sha256}"),
            ));
        }
    }

    let artifact: ModelArtifact = serde_json::from_slice(bytes)
        .map_err(|e| RiskError::model_load(source, format!("invalid artifact: {e}")))?;

    artifact
        .verify_schema()
        .map_err(|message| RiskError::model_load(source, message))?;

    debug!("Artifact {} verified against encoding {}", artifact.name, ENCODING_VERSION);

    Ok(LoadedArtifact {
        artifact,
        path: source.to_string(),
        sha256,
    })
}

/// Read, fingerprint and verify an artifact file.
pub fn load_artifact(path: &Path, expected_sha256: Option<&str>) -> RiskResult<LoadedArtifact> {
    let location = path.display().to_string();
    let bytes = fs::read(path)
        .map_err(|e| RiskError::model_load(&location, format!("cannot read artifact: {e}")))?;

    let loaded = parse_artifact(&location, &bytes, expected_sha256)?;
    info!(
        "Loaded model artifact: {} v{} ({}) sha256={}",
        loaded.artifact.name,
        loaded.artifact.version,
        location,
        loaded.sha256
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk_model::{RegressionTree, TreeNode};
    use std::io::Write;

    fn minimal_artifact() -> ModelArtifact {
        ModelArtifact {
            name: "unit".to_string(),
            version: "0.0.1".to_string(),
            encoding_version: ENCODING_VERSION.to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            categories: encoding_table_map(),
            trained_at: None,
            baseline: Some(vec![0.0; FEATURE_COUNT]),
            feature_importances: None,
            model: ModelBody::GradientBoosting(GradientBoostedTrees {
                init_score: -2.0,
                learning_rate: 0.1,
                trees: vec![RegressionTree {
                    nodes: vec![
                        TreeNode::split(6, 60.0, 1, 2),
                        TreeNode::leaf(-1.0),
                        TreeNode::leaf(1.0),
                    ],
                }],
            }),
        }
    }

    #[test]
    fn verified_artifact_parses() {
        let bytes = serde_json::to_vec(&minimal_artifact()).unwrap();
        let loaded = parse_artifact("memory", &bytes, None).unwrap();
        assert_eq!(loaded.artifact.name, "unit");
        assert_eq!(loaded.sha256.len(), 64);
    }

    #[test]
    fn reordered_features_are_rejected() {
        let mut artifact = minimal_artifact();
        artifact.feature_names.swap(6, 7);
        let bytes = serde_json::to_vec(&artifact).unwrap();
        let err = parse_artifact("memory", &bytes, None).unwrap_err();
        assert!(matches!(err, RiskError::ModelLoad { .. }));
        assert!(err.to_string().contains("feature 6"));
    }

    #[test]
    fn drifted_category_codes_are_rejected() {
        let mut artifact = minimal_artifact();
        artifact
            .categories
            .get_mut("smoking_status")
            .unwrap()
            .insert("never smoked".to_string(), 0);
        let bytes = serde_json::to_vec(&artifact).unwrap();
        let err = parse_artifact("memory", &bytes, None).unwrap_err();
        assert!(err.to_string().contains("smoking_status"));
    }

    #[test]
    fn wrong_encoding_version_is_rejected() {
        let mut artifact = minimal_artifact();
        artifact.encoding_version = "onehot-v3".to_string();
        let bytes = serde_json::to_vec(&artifact).unwrap();
        assert!(parse_artifact("memory", &bytes, None).is_err());
    }

    #[test]
    fn short_baseline_is_rejected() {
        let mut artifact = minimal_artifact();
        artifact.baseline = Some(vec![0.0; 8]);
        let bytes = serde_json::to_vec(&artifact).unwrap();
        assert!(parse_artifact("memory", &bytes, None).is_err());
    }

    #[test]
    fn checksum_pin_is_enforced() {
        let bytes = serde_json::to_vec(&minimal_artifact()).unwrap();
        let digest = fingerprint(&bytes);
        assert!(parse_artifact("memory", &bytes, Some(&digest.to_uppercase())).is_ok());

        let err = parse_artifact("memory", &bytes, Some("deadbeef")).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn missing_and_corrupt_files_fail_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        let err = load_artifact(&missing, None).unwrap_err();
        assert!(matches!(err, RiskError::ModelLoad { .. }));

        let corrupt = dir.path().join("corrupt.json");
        let mut file = fs::File::create(&corrupt).unwrap();
        file.write_all(b"{\"name\": \"truncated\"").unwrap();
        let err = load_artifact(&corrupt, None).unwrap_err();
        assert!(err.to_string().contains("invalid artifact"));
    }
}
