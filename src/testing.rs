//! Shared fixtures for unit tests

use crate::artifacts::PipelineArtifacts;
use crate::config::{DetectionConfig, PreprocessingConfig};
use crate::error::Result;
use crate::models::{FraudModel, ModelOutput};
use crate::pipeline::FraudPipeline;
use crate::preprocessing::FeatureDeriver;
use crate::types::transaction::RawTransaction;
use std::sync::Arc;

/// Scores the `type_TRANSFER` indicator, the last schema column
pub struct TransferModel;

impl FraudModel for TransferModel {
    fn name(&self) -> &str {
        "transfer_stub"
    }

    fn score(&self, features: &[f32]) -> Result<ModelOutput> {
        let transfer = features.last().copied().unwrap_or(0.0) as f64;
        Ok(ModelOutput::from_probability(self.name(), 0.05 + 0.9 * transfer))
    }
}

pub fn training_rows() -> Vec<RawTransaction> {
    vec![
        RawTransaction::new(1, "TRANSFER", 1000.0)
            .with_origin_balances(1000.0, 0.0)
            .with_destination_balances(0.0, 1000.0),
        RawTransaction::new(5, "PAYMENT", 20.0)
            .with_origin_balances(5000.0, 4980.0)
            .with_destination_balances(0.0, 0.0),
        RawTransaction::new(10, "CASH_OUT", 2000.0)
            .with_origin_balances(2000.0, 0.0)
            .with_destination_balances(500.0, 2500.0),
        RawTransaction::new(0, "CASH_IN", 300.0)
            .with_origin_balances(100.0, 400.0)
            .with_destination_balances(3000.0, 2700.0),
        RawTransaction::new(7, "DEBIT", 50.0)
            .with_origin_balances(60.0, 10.0)
            .with_destination_balances(100.0, 150.0),
    ]
}

pub fn fitted_artifacts() -> PipelineArtifacts {
    let deriver = FeatureDeriver::new();
    let derived = deriver.derive_batch(&training_rows()).unwrap();
    let x_train = deriver.model_frame(&derived).unwrap();
    PipelineArtifacts::fit(&x_train, &PreprocessingConfig::default()).unwrap()
}

pub fn pipeline() -> FraudPipeline {
    FraudPipeline::new(
        Arc::new(fitted_artifacts()),
        Arc::new(TransferModel),
        &DetectionConfig::default(),
    )
    .unwrap()
}

/// The worked transfer example: drains the origin into the destination
pub fn example() -> RawTransaction {
    RawTransaction::new(1, "TRANSFER", 1000.0)
        .with_origin_balances(1000.0, 0.0)
        .with_destination_balances(0.0, 1000.0)
}
