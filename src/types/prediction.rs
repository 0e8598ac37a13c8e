//! Structured output of the fraud pipeline

use crate::types::alert::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Predicted class of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudClass {
    NotFraud,
    Fraud,
}

impl FraudClass {
    pub fn is_fraud(&self) -> bool {
        matches!(self, FraudClass::Fraud)
    }

    /// Numeric label as used in the training data (0 / 1)
    pub fn label(&self) -> u8 {
        match self {
            FraudClass::NotFraud => 0,
            FraudClass::Fraud => 1,
        }
    }
}

impl From<bool> for FraudClass {
    fn from(is_fraud: bool) -> Self {
        if is_fraud {
            FraudClass::Fraud
        } else {
            FraudClass::NotFraud
        }
    }
}

impl fmt::Display for FraudClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FraudClass::NotFraud => f.write_str("not fraud"),
            FraudClass::Fraud => f.write_str("fraud"),
        }
    }
}

/// Result of running one record through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub class: FraudClass,

    /// Fraud probability in `[0, 1]`, when the model exposes one
    pub fraud_probability: Option<f64>,

    /// Risk bucket derived from the probability
    pub risk_level: Option<RiskLevel>,

    /// Decision threshold applied to the probability
    pub threshold: f64,

    /// Per-model scores (one entry for the primary strategy)
    pub model_scores: BTreeMap<String, f64>,
}

impl PredictionResult {
    pub fn is_fraud(&self) -> bool {
        self.class.is_fraud()
    }
}
