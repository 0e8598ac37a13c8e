//! Type definitions for the fraud detection pipeline

pub mod alert;
pub mod prediction;
pub mod transaction;

pub use alert::{FraudAlert, RiskLevel, RiskLevelThresholds};
pub use prediction::{FraudClass, PredictionResult};
pub use transaction::{RawTransaction, TRANSACTION_TYPES};
