//! ML model inference components

pub mod aggregator;
pub mod inference;
pub mod loader;

pub use aggregator::ScoreAggregator;
pub use inference::InferenceEngine;
pub use loader::ModelLoader;

use crate::error::Result;
use std::collections::BTreeMap;

/// Raw output of a scoring backend for one feature vector
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Positive-class probability, when the backend exposes one
    pub probability: Option<f64>,
    /// Hard label, for backends that only predict a class
    pub label: Option<bool>,
    /// Per-model scores that went into `probability`
    pub model_scores: BTreeMap<String, f64>,
}

impl ModelOutput {
    pub fn from_probability(name: &str, probability: f64) -> Self {
        let mut model_scores = BTreeMap::new();
        model_scores.insert(name.to_string(), probability);
        Self {
            probability: Some(probability),
            label: None,
            model_scores,
        }
    }
}

/// An externally trained classifier, consumed as an opaque scoring function
pub trait FraudModel: Send + Sync {
    fn name(&self) -> &str;

    /// Score one feature vector, ordered as the feature schema
    fn score(&self, features: &[f32]) -> Result<ModelOutput>;

    fn score_batch(&self, rows: &[Vec<f32>]) -> Result<Vec<ModelOutput>> {
        rows.iter().map(|row| self.score(row)).collect()
    }
}
