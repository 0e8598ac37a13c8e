//! Fraud alert data structures

use crate::types::prediction::PredictionResult;
use crate::types::transaction::RawTransaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from score and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.7,
            critical: 0.9,
        }
    }
}

/// Alert published when a streamed transaction is classified as fraud
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudAlert {
    /// Unique alert identifier
    pub alert_id: String,

    /// Associated transaction ID (generated when the record had none)
    pub transaction_id: String,

    /// Fraud probability reported by the model, if any
    pub fraud_probability: Option<f64>,

    pub risk_level: Option<RiskLevel>,

    /// Individual model scores
    pub model_scores: BTreeMap<String, f64>,

    /// Alert generation timestamp
    pub timestamp: DateTime<Utc>,

    pub step: u32,
    pub transaction_type: String,
    pub amount: f64,

    /// Leading character of the originating account id (e.g. `C`)
    pub origin_kind: Option<String>,
    /// Leading character of the destination account id (e.g. `M`)
    pub destination_kind: Option<String>,
}

impl FraudAlert {
    /// Build an alert from a transaction and the prediction made for it
    pub fn from_prediction(transaction: &RawTransaction, prediction: &PredictionResult) -> Self {
        let leading = |id: &Option<String>| {
            id.as_deref()
                .and_then(|s| s.trim().chars().next())
                .map(String::from)
        };

        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            transaction_id: transaction
                .transaction_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            fraud_probability: prediction.fraud_probability,
            risk_level: prediction.risk_level,
            model_scores: prediction.model_scores.clone(),
            timestamp: Utc::now(),
            step: transaction.step,
            transaction_type: transaction.tx_type.clone(),
            amount: transaction.amount,
            origin_kind: leading(&transaction.name_orig),
            destination_kind: leading(&transaction.name_dest),
        }
    }
}
