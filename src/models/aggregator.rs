//! Score aggregation for multi-model ensemble

use std::collections::{BTreeMap, HashMap};

/// Aggregates scores from multiple models into a single fraud probability.
pub struct ScoreAggregator {
    /// Model weights for weighted average
    weights: HashMap<String, f64>,
    /// Weight for models not in the weights map
    default_weight: f64,
}

impl ScoreAggregator {
    /// Create a new score aggregator with model weights.
    pub fn new(weights: HashMap<String, f64>) -> Self {
        Self {
            weights,
            default_weight: 0.1,
        }
    }

    pub fn weight(&self, model_name: &str) -> f64 {
        self.weights
            .get(model_name)
            .copied()
            .unwrap_or(self.default_weight)
    }

    /// Weighted average of the model scores, weights normalized to sum to 1.
    ///
    /// `None` when there is nothing to aggregate or every weight is zero.
    pub fn aggregate(&self, model_scores: &BTreeMap<String, f64>) -> Option<f64> {
        let (weighted_sum, total_weight) = model_scores.iter().fold(
            (0.0, 0.0),
            |(sum, total), (model_name, &score)| {
                let weight = self.weight(model_name);
                (sum + score * weight, total + weight)
            },
        );

        if total_weight > 0.0 {
            Some((weighted_sum / total_weight).clamp(0.0, 1.0))
        } else {
            None
        }
    }
}
