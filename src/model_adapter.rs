//! Model adapter: the single seam between encoded features and a classifier.

use crate::errors::{RiskError, RiskResult};
use crate::feature_encoder::{FeatureVector, FEATURE_COUNT};
use crate::model_artifact::{load_artifact, LoadedArtifact};
use crate::risk_model::RiskModel;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Probability of the modelled event, guaranteed finite and in [0, 1].
///
/// Deserializing goes through the same range check as `ScoreResult::new`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct ScoreResult(f64);

impl ScoreResult {
    pub fn new(probability: f64) -> RiskResult<Self> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(RiskError::inference(format!(
                "classifier returned {probability}, expected a probability in [0, 1]"
            )));
        }
        Ok(Self(probability))
    }

    pub fn probability(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for ScoreResult {
    type Error = RiskError;

    fn try_from(probability: f64) -> Result<Self, Self::Error> {
        ScoreResult::new(probability)
    }
}

impl From<ScoreResult> for f64 {
    fn from(score: ScoreResult) -> f64 {
        score.0
    }
}

/// Descriptive information about the wrapped classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub name: String,
    pub version: String,
    pub kind: String,
    pub source: String,
    pub sha256: Option<String>,
    pub trained_at: Option<DateTime<Utc>>,
    pub loaded_at: DateTime<Utc>,
}

/// Owns one frozen classifier and exposes it as `score` plus global importances.
pub struct ModelAdapter {
    model: Arc<dyn RiskModel>,
    importances: Vec<f64>,
    baseline: Option<FeatureVector>,
    metadata: ModelMetadata,
}

impl std::fmt::Debug for ModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ModelAdapter {
    /// Wrap an in-memory classifier.
    ///
    /// Fails when the model was not fitted on the encoder's feature width or
    /// does not pass its own structural checks.
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        model: Arc<dyn RiskModel>,
    ) -> RiskResult<Self> {
        let name = name.into();
        if model.n_features() != FEATURE_COUNT {
            return Err(RiskError::model_load(
                &name,
                format!(
                    "model expects {} features, encoder produces {FEATURE_COUNT}",
                    model.n_features()
                ),
            ));
        }
        model
            .validate()
            .map_err(|message| RiskError::model_load(&name, message))?;
        let importances = model.feature_importances();
        if importances.len() != FEATURE_COUNT {
            return Err(RiskError::model_load(
                &name,
                format!("model reports {} importances", importances.len()),
            ));
        }

        let metadata = ModelMetadata {
            name,
            version: version.into(),
            kind: model.kind().to_string(),
            source: "<memory>".to_string(),
            sha256: None,
            trained_at: None,
            loaded_at: Utc::now(),
        };

        Ok(Self {
            model,
            importances,
            baseline: None,
            metadata,
        })
    }

    /// Build an adapter from a verified artifact.
    pub fn from_artifact(loaded: LoadedArtifact) -> RiskResult<Self> {
        let LoadedArtifact {
            artifact,
            path,
            sha256,
        } = loaded;

        let model = artifact.model.into_model();
        let mut adapter = Self::new(artifact.name, artifact.version, model)?;

        if let Some(importances) = artifact.feature_importances {
            adapter.importances = importances;
        }
        adapter.baseline = artifact
            .baseline
            .and_then(|row| <[f64; FEATURE_COUNT]>::try_from(row).ok())
            .map(FeatureVector::from_values);
        adapter.metadata.source = path;
        adapter.metadata.sha256 = Some(sha256);
        adapter.metadata.trained_at = artifact.trained_at;

        Ok(adapter)
    }

    pub fn with_baseline(mut self, baseline: FeatureVector) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Class-1 probability for one feature vector.
    pub fn score(&self, features: &FeatureVector) -> RiskResult<ScoreResult> {
        let probability = self.model.predict_proba(features.as_slice());
        debug!("Model {} scored {:.6}", self.metadata.name, probability);
        ScoreResult::new(probability)
    }

    /// Raw class-1 probability for an arbitrary row, used by explainers that
    /// evaluate the model on rows other than the observed input.
    pub fn predict_row(&self, row: &[f64; FEATURE_COUNT]) -> f64 {
        self.model.predict_proba(row)
    }

    /// Global per-feature importances in feature order.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Reference row shipped with the artifact, if any.
    pub fn baseline(&self) -> Option<&FeatureVector> {
        self.baseline.as_ref()
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

/// Where to find the classifier artifact.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub path: PathBuf,
    pub expected_sha256: Option<String>,
}

/// Load-once holder for the process-wide classifier.
///
/// The first caller performs the load; concurrent callers block until it
/// finishes and then share the same instance. A failed load is returned to
/// every caller that attempted it and is not cached.
pub struct ModelStore {
    source: ModelSource,
    cell: OnceCell<Arc<ModelAdapter>>,
}

impl ModelStore {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    /// A store that already holds an adapter and never touches storage.
    pub fn preloaded(adapter: Arc<ModelAdapter>) -> Self {
        let cell = OnceCell::new();
        let source = ModelSource {
            path: PathBuf::from(&adapter.metadata().source),
            expected_sha256: adapter.metadata().sha256.clone(),
        };
        // A fresh cell cannot already be set.
        let _ = cell.set(adapter);
        Self { source, cell }
    }

    pub fn get(&self) -> RiskResult<Arc<ModelAdapter>> {
        self.cell
            .get_or_try_init(|| {
                info!("Loading classifier from {}", self.source.path.display());
                let loaded =
                    load_artifact(&self.source.path, self.source.expected_sha256.as_deref())?;
                ModelAdapter::from_artifact(loaded).map(Arc::new)
            })
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }
}
