//! Transaction Fraud Detection Library
//!
//! Turns raw mobile-money transactions into model features (derive, encode,
//! scale, select), scores them with ONNX models and serves the result over
//! a CLI, an HTTP form and a NATS stream.

pub mod artifacts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod consumer;
pub mod error;
pub mod evaluation;
pub mod frame;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod producer;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use artifacts::PipelineArtifacts;
pub use config::AppConfig;
pub use error::{ErrorKind, PipelineError, Stage};
pub use evaluation::EvaluationMetrics;
pub use models::{FraudModel, InferenceEngine, ModelOutput};
pub use pipeline::FraudPipeline;
pub use types::{alert::FraudAlert, prediction::PredictionResult, transaction::RawTransaction};
