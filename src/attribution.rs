//! Attribution engine: split a predicted probability across the eight
//! questionnaire attributes.
//!
//! Raw per-feature importances come from an `Explainer`. Only the base
//! attributes are kept, signs are dropped, and the magnitudes are rescaled so
//! they add up to the predicted probability. A 2 % risk therefore renders as
//! eight small slices rather than eight slices summing to 100 %.

use crate::errors::{RiskError, RiskResult};
use crate::feature_encoder::{
    FeatureVector, BASE_FEATURE_COUNT, BASE_LABELS, FEATURE_COUNT, FEATURE_NAMES,
};
use crate::model_adapter::{ModelAdapter, ScoreResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

/// Probabilities below this are treated as exactly zero.
pub const ZERO_PROBABILITY_EPSILON: f64 = 1e-12;

/// Tolerance for the "contributions sum to probability" invariant.
pub const SUM_TOLERANCE: f64 = 1e-6;

/// Source of signed per-feature importances for one prediction.
///
/// Always returns one value per model input column, base attributes first.
pub trait Explainer: Send + Sync {
    fn raw_importances(
        &self,
        model: &ModelAdapter,
        features: &FeatureVector,
        probability: ScoreResult,
    ) -> RiskResult<[f64; FEATURE_COUNT]>;

    fn name(&self) -> &'static str;
}

/// Which explanation technique to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplainerKind {
    #[default]
    Shapley,
    GlobalImportance,
}

/// Exact interventional Shapley values against a fixed baseline row.
///
/// Every coalition of the eleven inputs is evaluated once (2^11 model calls),
/// features in the coalition taking the observed value and the rest the
/// baseline value. Enumeration order is fixed, so results are reproducible
/// bit for bit.
#[derive(Debug, Clone)]
pub struct ShapleyExplainer {
    baseline: FeatureVector,
    weights: [f64; FEATURE_COUNT],
}

impl ShapleyExplainer {
    pub fn new(baseline: FeatureVector) -> Self {
        Self {
            baseline,
            weights: shapley_weights(),
        }
    }

    pub fn baseline(&self) -> &FeatureVector {
        &self.baseline
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

/// `weights[s] = s! (n - s - 1)! / n!` for coalitions of size `s`.
fn shapley_weights() -> [f64; FEATURE_COUNT] {
    let n = FEATURE_COUNT;
    let mut weights = [0.0; FEATURE_COUNT];
    for (s, weight) in weights.iter_mut().enumerate() {
        *weight = factorial(s) * factorial(n - s - 1) / factorial(n);
    }
    weights
}

impl Explainer for ShapleyExplainer {
    fn raw_importances(
        &self,
        model: &ModelAdapter,
        features: &FeatureVector,
        _probability: ScoreResult,
    ) -> RiskResult<[f64; FEATURE_COUNT]> {
        let observed = features.values();
        let reference = self.baseline.values();
        let coalitions = 1usize << FEATURE_COUNT;

        let mut value = vec![0.0; coalitions];
        let mut row = [0.0; FEATURE_COUNT];
        for (mask, slot) in value.iter_mut().enumerate() {
            for i in 0..FEATURE_COUNT {
                row[i] = if mask & (1 << i) != 0 { observed[i] } else { reference[i] };
            }
            *slot = model.predict_row(&row);
        }

        let mut phi = [0.0; FEATURE_COUNT];
        for (i, contribution) in phi.iter_mut().enumerate() {
            let bit = 1usize << i;
            for mask in (0..coalitions).filter(|m| m & bit == 0) {
                let size = mask.count_ones() as usize;
                *contribution += self.weights[size] * (value[mask | bit] - value[mask]);
            }
        }

        Ok(phi)
    }

    fn name(&self) -> &'static str {
        "shapley"
    }
}

/// Fallback: the model's global importances scaled by this prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalImportanceExplainer;

impl Explainer for GlobalImportanceExplainer {
    fn raw_importances(
        &self,
        model: &ModelAdapter,
        _features: &FeatureVector,
        probability: ScoreResult,
    ) -> RiskResult<[f64; FEATURE_COUNT]> {
        let importances = model.feature_importances();
        let mut raw = [0.0; FEATURE_COUNT];
        for (slot, weight) in raw.iter_mut().zip(importances) {
            *slot = weight * probability.probability();
        }
        Ok(raw)
    }

    fn name(&self) -> &'static str {
        "global_importance"
    }
}

/// Pick an explainer. Shapley needs a baseline: the override if given,
/// otherwise the one shipped with the model.
pub fn build_explainer(
    kind: ExplainerKind,
    model: &ModelAdapter,
    baseline_override: Option<FeatureVector>,
) -> RiskResult<Arc<dyn Explainer>> {
    match kind {
        ExplainerKind::Shapley => {
            let baseline = baseline_override
                .or_else(|| model.baseline().copied())
                .ok_or_else(|| {
                    RiskError::config(format!(
                        "shapley explainer needs a baseline; model '{}' ships none and none is configured",
                        model.metadata().name
                    ))
                })?;
            Ok(Arc::new(ShapleyExplainer::new(baseline)))
        }
        ExplainerKind::GlobalImportance => Ok(Arc::new(GlobalImportanceExplainer)),
    }
}

/// One attribute's share of the predicted probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub attribute: String,
    pub label: String,
    pub contribution: f64,
}

/// Per-attribute contributions, always in encoding order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AttributionSet {
    items: Vec<Attribution>,
}

impl AttributionSet {
    /// Label base-attribute contributions in encoding order.
    pub fn from_contributions(contributions: [f64; BASE_FEATURE_COUNT]) -> Self {
        let items = FEATURE_NAMES
            .iter()
            .zip(BASE_LABELS)
            .zip(contributions)
            .map(|((attribute, label), contribution)| Attribution {
                attribute: attribute.to_string(),
                label: label.to_string(),
                contribution,
            })
            .collect();
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Attribution> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Attribution] {
        &self.items
    }

    pub fn get(&self, attribute: &str) -> Option<&Attribution> {
        self.items.iter().find(|a| a.attribute == attribute)
    }

    pub fn total(&self) -> f64 {
        self.items.iter().map(|a| a.contribution).sum()
    }

    /// Largest contribution first; ties keep encoding order.
    pub fn ranked(&self) -> Vec<&Attribution> {
        let mut ranked: Vec<&Attribution> = self.items.iter().collect();
        // sort_by is stable, so equal contributions stay in encoding order
        ranked.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(Ordering::Equal)
        });
        ranked
    }

    pub fn largest(&self) -> Option<&Attribution> {
        self.ranked().into_iter().next()
    }

    pub fn top(&self, n: usize) -> Vec<&Attribution> {
        self.ranked().into_iter().take(n).collect()
    }
}

impl<'a> IntoIterator for &'a AttributionSet {
    type Item = &'a Attribution;
    type IntoIter = std::slice::Iter<'a, Attribution>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Turn raw importances into non-negative contributions summing to `probability`.
///
/// Derived polynomial terms are dropped, not redistributed.
pub fn normalize_contributions(
    raw: &[f64; FEATURE_COUNT],
    probability: ScoreResult,
) -> RiskResult<[f64; BASE_FEATURE_COUNT]> {
    let p = probability.probability();
    if p < ZERO_PROBABILITY_EPSILON {
        return Ok([0.0; BASE_FEATURE_COUNT]);
    }

    let mut magnitudes = [0.0; BASE_FEATURE_COUNT];
    for (slot, value) in magnitudes.iter_mut().zip(&raw[..BASE_FEATURE_COUNT]) {
        if !value.is_finite() {
            return Err(RiskError::attribution(format!(
                "explainer produced a non-finite importance ({value})"
            )));
        }
        *slot = value.abs();
    }

    let total: f64 = magnitudes.iter().sum();
    if total == 0.0 {
        return Err(RiskError::attribution(format!(
            "all base-attribute importances are zero for a probability of {p}"
        )));
    }

    Ok(magnitudes.map(|m| m / total * p))
}

/// Sum of absolute importances over the base attributes.
fn base_magnitude(raw: &[f64; FEATURE_COUNT]) -> f64 {
    raw[..BASE_FEATURE_COUNT].iter().map(|v| v.abs()).sum()
}

/// Runs an explainer and normalises its output.
///
/// When the configured explainer attributes nothing to the base attributes,
/// the model's global importances are used instead. Only if those are zero as
/// well does the request fail with `RiskError::Attribution`.
#[derive(Clone)]
pub struct AttributionEngine {
    explainer: Arc<dyn Explainer>,
}

impl AttributionEngine {
    pub fn new(explainer: Arc<dyn Explainer>) -> Self {
        Self { explainer }
    }

    pub fn explainer_name(&self) -> &'static str {
        self.explainer.name()
    }

    pub fn explain(
        &self,
        features: &FeatureVector,
        probability: ScoreResult,
        model: &ModelAdapter,
    ) -> RiskResult<AttributionSet> {
        // Nothing to apportion; skip the explainer entirely.
        if probability.probability() < ZERO_PROBABILITY_EPSILON {
            debug!("Zero probability, attributions set to zero");
            return Ok(AttributionSet::from_contributions([0.0; BASE_FEATURE_COUNT]));
        }

        let mut raw = self.explainer.raw_importances(model, features, probability)?;
        debug!("{} raw importances: {:?}", self.explainer.name(), raw);

        // A local explainer can see no base attribute move the prediction, e.g. an
        // input on the same side of every tree split as the baseline. Global
        // importances still apportion the probability in that case.
        if base_magnitude(&raw) == 0.0
            && self.explainer.name() != GlobalImportanceExplainer.name()
        {
            debug!(
                "{} gave no base-attribute signal, using global importances",
                self.explainer.name()
            );
            raw = GlobalImportanceExplainer.raw_importances(model, features, probability)?;
        }

        let contributions = normalize_contributions(&raw, probability)?;
        Ok(AttributionSet::from_contributions(contributions))
    }
}
