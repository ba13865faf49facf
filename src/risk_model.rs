//! Classifier implementations behind the `RiskModel` capability.
//!
//! Anything that turns an 11-wide feature slice into a class-1 probability can
//! sit behind the adapter. Two concrete models are provided: a logistic model
//! and a binary gradient-boosted tree ensemble.

use crate::feature_encoder::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Binary classifier with a probability output for the positive class.
pub trait RiskModel: Send + Sync {
    /// Probability of the modelled event for one feature row.
    fn predict_proba(&self, features: &[f64]) -> f64;

    /// Global per-feature importances, one per input column.
    fn feature_importances(&self) -> Vec<f64>;

    /// Number of input columns the model was fitted on.
    fn n_features(&self) -> usize;

    /// Short identifier for logs.
    fn kind(&self) -> &'static str;

    /// Structural checks, run before the model is ever asked for a prediction.
    ///
    /// `predict_proba` may assume these hold.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

pub fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Standardisation applied before the linear term (`(x - mean) / scale`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Logistic regression over the encoded features.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub scaler: Option<Scaler>,
}

impl LogisticModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
            scaler: None,
        }
    }

    pub fn with_scaler(mut self, scaler: Scaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    fn scaled(&self, index: usize, value: f64) -> f64 {
        match &self.scaler {
            Some(scaler) => (value - scaler.mean[index]) / scaler.scale[index],
            None => value,
        }
    }
}

impl RiskModel for LogisticModel {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        // Linear combination: intercept + sum(coef_i * x_i)
        let linear_score = self.intercept
            + features
                .iter()
                .enumerate()
                .zip(self.coefficients.iter())
                .map(|((i, x), w)| self.scaled(i, *x) * w)
                .sum::<f64>();

        sigmoid(linear_score)
    }

    fn feature_importances(&self) -> Vec<f64> {
        // Coefficient magnitude in standardised units when a scaler is present.
        let raw: Vec<f64> = self.coefficients.iter().map(|c| c.abs()).collect();
        normalize_to_unit_sum(raw)
    }

    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn kind(&self) -> &'static str {
        "logistic"
    }

    fn validate(&self) -> Result<(), String> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {FEATURE_COUNT} coefficients, found {}",
                self.coefficients.len()
            ));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err("coefficients must be finite".to_string());
        }
        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != FEATURE_COUNT || scaler.scale.len() != FEATURE_COUNT {
                return Err(format!("scaler must have {FEATURE_COUNT} entries"));
            }
            if scaler.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
                return Err("scaler scale entries must be finite and non-zero".to_string());
            }
        }
        Ok(())
    }
}

/// One node of a flattened regression tree. Leaves carry `value`; splits carry
/// `feature`, `threshold`, `left` and `right`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TreeNode {
    #[serde(default)]
    pub feature: Option<usize>,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub left: Option<usize>,
    #[serde(default)]
    pub right: Option<usize>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl TreeNode {
    pub fn leaf(value: f64) -> Self {
        Self {
            feature: None,
            threshold: None,
            left: None,
            right: None,
            value: Some(value),
        }
    }

    pub fn split(feature: usize, threshold: f64, left: usize, right: usize) -> Self {
        Self {
            feature: Some(feature),
            threshold: Some(threshold),
            left: Some(left),
            right: Some(right),
            value: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Walk from the root; samples go left when `x <= threshold`.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if let Some(value) = node.value {
                return value;
            }
            // validate() guarantees every split node has all four fields
            let (Some(feature), Some(threshold), Some(left), Some(right)) =
                (node.feature, node.threshold, node.left, node.right)
            else {
                return 0.0;
            };
            index = if features[feature] <= threshold { left } else { right };
        }
    }

    fn validate(&self, tree_index: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err(format!("tree {tree_index} has no nodes"));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match (node.value, node.feature, node.threshold, node.left, node.right) {
                (Some(value), None, None, None, None) => {
                    if !value.is_finite() {
                        return Err(format!("tree {tree_index} node {i}: leaf value not finite"));
                    }
                }
                (None, Some(feature), Some(threshold), Some(left), Some(right)) => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!(
                            "tree {tree_index} node {i}: split feature {feature} out of range"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("tree {tree_index} node {i}: threshold not finite"));
                    }
                    // Children must point forward, which also rules out cycles.
                    let len = self.nodes.len();
                    if left <= i || right <= i || left >= len || right >= len {
                        return Err(format!("tree {tree_index} node {i}: invalid child index"));
                    }
                }
                _ => return Err(format!("tree {tree_index} node {i}: neither leaf nor split")),
            }
        }
        Ok(())
    }
}

/// Binary gradient-boosted ensemble: `sigmoid(init + lr * sum(tree outputs))`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradientBoostedTrees {
    pub init_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(features)).sum();
        self.init_score + self.learning_rate * sum
    }
}

impl RiskModel for GradientBoostedTrees {
    fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.decision_function(features))
    }

    /// Split frequency per feature, normalised to sum to 1.
    fn feature_importances(&self) -> Vec<f64> {
        let mut counts = vec![0.0; FEATURE_COUNT];
        for tree in &self.trees {
            for node in &tree.nodes {
                if let Some(feature) = node.feature {
                    if let Some(count) = counts.get_mut(feature) {
                        *count += 1.0;
                    }
                }
            }
        }
        normalize_to_unit_sum(counts)
    }

    fn n_features(&self) -> usize {
        FEATURE_COUNT
    }

    fn kind(&self) -> &'static str {
        "gradient_boosting"
    }

    fn validate(&self) -> Result<(), String> {
        if !self.init_score.is_finite() {
            return Err("init_score must be finite".to_string());
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err("learning_rate must be finite and positive".to_string());
        }
        if self.trees.is_empty() {
            return Err("ensemble has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i)?;
        }
        Ok(())
    }
}

fn normalize_to_unit_sum(values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.into_iter().map(|v| v / total).collect()
    } else {
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(feature: usize, threshold: f64, left: f64, right: f64) -> RegressionTree {
        RegressionTree {
            nodes: vec![
                TreeNode::split(feature, threshold, 1, 2),
                TreeNode::leaf(left),
                TreeNode::leaf(right),
            ],
        }
    }

    #[test]
    fn logistic_matches_hand_computation() {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[6] = 0.05;
        let model = LogisticModel::new(-4.0, coefficients);
        model.validate().unwrap();

        let mut x = vec![0.0; FEATURE_COUNT];
        x[6] = 40.0;
        let expected = 1.0 / (1.0 + (2.0f64).exp());
        assert!((model.predict_proba(&x) - expected).abs() < 1e-12);
    }

    #[test]
    fn logistic_scaler_is_applied() {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[7] = 1.0;
        let mut mean = vec![0.0; FEATURE_COUNT];
        mean[7] = 100.0;
        let mut scale = vec![1.0; FEATURE_COUNT];
        scale[7] = 50.0;
        let model = LogisticModel::new(0.0, coefficients).with_scaler(Scaler { mean, scale });
        model.validate().unwrap();

        let mut x = vec![0.0; FEATURE_COUNT];
        x[7] = 100.0;
        assert!((model.predict_proba(&x) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn logistic_rejects_wrong_width() {
        let model = LogisticModel::new(0.0, vec![1.0; 8]);
        assert!(model.validate().is_err());
    }

    #[test]
    fn tree_goes_left_on_equal_threshold() {
        let tree = stump(6, 60.0, -1.0, 1.0);
        let mut x = vec![0.0; FEATURE_COUNT];
        x[6] = 60.0;
        assert_eq!(tree.predict(&x), -1.0);
        x[6] = 60.5;
        assert_eq!(tree.predict(&x), 1.0);
    }

    #[test]
    fn ensemble_combines_trees_with_learning_rate() {
        let model = GradientBoostedTrees {
            init_score: -1.0,
            learning_rate: 0.5,
            trees: vec![stump(6, 60.0, -1.0, 1.0), stump(7, 140.0, 0.0, 2.0)],
        };
        model.validate().unwrap();

        let mut x = vec![0.0; FEATURE_COUNT];
        x[6] = 70.0;
        x[7] = 150.0;
        assert!((model.decision_function(&x) - 0.5).abs() < 1e-12);
        assert!((model.predict_proba(&x) - sigmoid(0.5)).abs() < 1e-12);
    }

    #[test]
    fn split_frequency_importances_sum_to_one() {
        let model = GradientBoostedTrees {
            init_score: 0.0,
            learning_rate: 0.1,
            trees: vec![
                stump(6, 60.0, -1.0, 1.0),
                stump(6, 40.0, -1.0, 1.0),
                stump(7, 140.0, 0.0, 2.0),
            ],
        };
        let importances = model.feature_importances();
        assert_eq!(importances.len(), FEATURE_COUNT);
        assert!((importances[6] - 2.0 / 3.0).abs() < 1e-12);
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn malformed_trees_are_rejected() {
        let backwards = RegressionTree {
            nodes: vec![TreeNode::split(6, 60.0, 0, 1), TreeNode::leaf(1.0)],
        };
        let model = GradientBoostedTrees {
            init_score: 0.0,
            learning_rate: 0.1,
            trees: vec![backwards],
        };
        assert!(model.validate().is_err());

        let bad_feature = GradientBoostedTrees {
            init_score: 0.0,
            learning_rate: 0.1,
            trees: vec![stump(FEATURE_COUNT, 1.0, 0.0, 1.0)],
        };
        assert!(bad_feature.validate().is_err());
    }
}
