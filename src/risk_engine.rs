//! risk_engine.rs
//! Composed scoring pipeline: encode -> score -> explain -> assemble.
//!
//! The engine owns the classifier handle and the explainer. Both are created at
//! most once and only read afterwards, so one engine can serve concurrent
//! requests from many threads.

use crate::attribution::{build_explainer, AttributionEngine, Explainer, ExplainerKind};
use crate::config::RiskConfig;
use crate::errors::RiskResult;
use crate::feature_encoder::{encode, FeatureVector};
use crate::input_record::{InputRecord, RawAnswers};
use crate::model_adapter::{ModelAdapter, ModelSource, ModelStore};
use crate::result_assembler::{assemble, ResultRecord};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

pub struct RiskEngine {
    store: ModelStore,
    explainer_kind: ExplainerKind,
    baseline_override: Option<FeatureVector>,
    threshold: f64,
    attribution: OnceCell<AttributionEngine>,
}

impl RiskEngine {
    /// Engine that loads its classifier lazily from the configured artifact.
    pub fn from_config(config: &RiskConfig) -> RiskResult<Self> {
        config.validate()?;
        let store = ModelStore::new(ModelSource {
            path: config.model.path.clone(),
            expected_sha256: config.model.expected_sha256.clone(),
        });

        info!(
            "RiskEngine configured with model {}, explainer {:?}, threshold {}",
            config.model.path.display(),
            config.explainer.strategy,
            config.threshold
        );

        Ok(Self {
            store,
            explainer_kind: config.explainer.strategy,
            baseline_override: config.baseline_row().map(FeatureVector::from_values),
            threshold: config.threshold,
            attribution: OnceCell::new(),
        })
    }

    /// Engine around an already-constructed classifier and explainer.
    pub fn with_model(
        adapter: Arc<ModelAdapter>,
        explainer: Arc<dyn Explainer>,
        threshold: f64,
    ) -> Self {
        let attribution = OnceCell::new();
        let _ = attribution.set(AttributionEngine::new(explainer));
        Self {
            store: ModelStore::preloaded(adapter),
            explainer_kind: ExplainerKind::default(),
            baseline_override: None,
            threshold,
            attribution,
        }
    }

    /// Load the classifier and build the explainer now instead of on first request.
    pub fn warm_up(&self) -> RiskResult<Arc<ModelAdapter>> {
        let model = self.store.get()?;
        self.attribution_engine(&model)?;
        Ok(model)
    }

    pub fn model(&self) -> RiskResult<Arc<ModelAdapter>> {
        self.store.get()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn attribution_engine(&self, model: &ModelAdapter) -> RiskResult<&AttributionEngine> {
        self.attribution.get_or_try_init(|| {
            let explainer = build_explainer(self.explainer_kind, model, self.baseline_override)?;
            info!("Attribution engine ready: {}", explainer.name());
            Ok(AttributionEngine::new(explainer))
        })
    }

    /// Score one questionnaire and explain the result.
    pub fn compute_risk(&self, input: &InputRecord) -> RiskResult<ResultRecord> {
        let request_id = Uuid::new_v4();
        let span = info_span!("compute_risk", %request_id);
        let _enter = span.enter();

        let features = encode(input).inspect_err(|e| warn!("Rejected input: {e}"))?;
        debug!("Encoded features: {:?}", features.named());

        let model = self.store.get()?;
        let probability = model.score(&features)?;
        debug!("Probability: {:.6}", probability.probability());

        let attributions = self
            .attribution_engine(&model)?
            .explain(&features, probability, &model)?;

        let metadata = model.metadata();
        let record = assemble(probability, attributions, self.threshold)?
            .with_model(metadata.name.clone(), metadata.version.clone());

        debug!(
            "Result: {:.4} ({}, {})",
            record.probability, record.classification, record.band
        );
        Ok(record)
    }

    /// Validate raw questionnaire answers, then score them.
    pub fn compute_risk_from_answers(&self, answers: RawAnswers) -> RiskResult<ResultRecord> {
        let input = InputRecord::try_from(answers).inspect_err(|e| warn!("Rejected answers: {e}"))?;
        self.compute_risk(&input)
    }
}
