//! The fraud pipeline: derive, encode, scale, select, then score.
//!
//! The same stages run for a single record (form, stream) and for a batch
//! (evaluation), so both paths produce identical feature vectors.

use crate::artifacts::PipelineArtifacts;
use crate::config::DetectionConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::frame::to_feature_rows;
use crate::models::{FraudModel, ModelOutput};
use crate::preprocessing::FeatureDeriver;
use crate::types::alert::{RiskLevel, RiskLevelThresholds};
use crate::types::prediction::{FraudClass, PredictionResult};
use crate::types::transaction::RawTransaction;
use polars::prelude::DataFrame;
use std::sync::Arc;
use tracing::debug;

/// Fitted preprocessing plus a model, behind one entry point
pub struct FraudPipeline {
    deriver: FeatureDeriver,
    artifacts: Arc<PipelineArtifacts>,
    model: Arc<dyn FraudModel>,
    threshold: f64,
    risk_levels: RiskLevelThresholds,
}

impl FraudPipeline {
    /// Build a pipeline from loaded artifacts and a model.
    ///
    /// Fails if the feature schema cannot be produced by the encoder and
    /// scaler outputs.
    pub fn new(
        artifacts: Arc<PipelineArtifacts>,
        model: Arc<dyn FraudModel>,
        detection: &DetectionConfig,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&detection.threshold) {
            return Err(PipelineError::Config(format!(
                "decision threshold must be within [0, 1], got {}",
                detection.threshold
            )));
        }
        artifacts.validate()?;

        Ok(Self {
            deriver: FeatureDeriver::new(),
            artifacts,
            model,
            threshold: detection.threshold,
            risk_levels: detection.risk_levels.clone(),
        })
    }

    pub fn artifacts(&self) -> &PipelineArtifacts {
        &self.artifacts
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Run every preprocessing stage and return the model input frame
    pub fn prepare(&self, transactions: &[RawTransaction]) -> Result<DataFrame> {
        let derived = self
            .deriver
            .derive_batch(transactions)
            .and_then(|rows| self.deriver.model_frame(&rows))
            .map_err(|e| e.in_stage(Stage::Derive))?;

        let encoded = self
            .artifacts
            .encoding
            .transform(&derived)
            .map_err(|e| e.in_stage(Stage::Encode))?;

        let scaled = self
            .artifacts
            .scaling
            .transform(&encoded)
            .map_err(|e| e.in_stage(Stage::Scale))?;

        self.artifacts
            .schema
            .select(&scaled)
            .map_err(|e| e.in_stage(Stage::Select))
    }

    /// Model input vectors, one per transaction
    pub fn feature_vectors(&self, transactions: &[RawTransaction]) -> Result<Vec<Vec<f32>>> {
        let prepared = self.prepare(transactions)?;
        to_feature_rows(&prepared).map_err(|e| e.in_stage(Stage::Select))
    }

    /// Classify a single transaction
    pub fn predict(&self, transaction: &RawTransaction) -> Result<PredictionResult> {
        self.predict_batch(std::slice::from_ref(transaction))?
            .pop()
            .ok_or_else(|| {
                PipelineError::Model("model returned no output".to_string())
                    .in_stage(Stage::Predict)
            })
    }

    /// Classify a batch; any invalid record fails the whole batch
    pub fn predict_batch(&self, transactions: &[RawTransaction]) -> Result<Vec<PredictionResult>> {
        if transactions.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.feature_vectors(transactions)?;
        let outputs = self
            .model
            .score_batch(&rows)
            .map_err(|e| e.in_stage(Stage::Predict))?;
        if outputs.len() != rows.len() {
            return Err(PipelineError::Model(format!(
                "model returned {} outputs for {} rows",
                outputs.len(),
                rows.len()
            ))
            .in_stage(Stage::Predict));
        }

        let results = outputs
            .into_iter()
            .map(|output| self.decide(output))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| e.in_stage(Stage::Predict))?;

        debug!(
            model = %self.model.name(),
            rows = results.len(),
            flagged = results.iter().filter(|r| r.is_fraud()).count(),
            "Batch scored"
        );
        Ok(results)
    }

    fn decide(&self, output: ModelOutput) -> Result<PredictionResult> {
        let ModelOutput {
            probability,
            label,
            model_scores,
        } = output;

        let class = match (probability, label) {
            (Some(p), _) => {
                if !(0.0..=1.0).contains(&p) {
                    return Err(PipelineError::Model(format!(
                        "probability {} is outside [0, 1]",
                        p
                    )));
                }
                FraudClass::from(p >= self.threshold)
            }
            (None, Some(label)) => FraudClass::from(label),
            (None, None) => {
                return Err(PipelineError::Model(
                    "model returned neither a probability nor a label".to_string(),
                ))
            }
        };

        Ok(PredictionResult {
            class,
            fraud_probability: probability,
            risk_level: probability.map(|p| RiskLevel::from_score(p, &self.risk_levels)),
            threshold: self.threshold,
            model_scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::frame::{column_names, numeric_values};
    use crate::preprocessing::{FeatureSchema, FINAL_FEATURES};
    use crate::testing::{example, fitted_artifacts, pipeline, training_rows, TransferModel};

    struct LabelOnlyModel;

    impl FraudModel for LabelOnlyModel {
        fn name(&self) -> &str {
            "label_only"
        }

        fn score(&self, _features: &[f32]) -> Result<ModelOutput> {
            Ok(ModelOutput {
                probability: None,
                label: Some(true),
                model_scores: Default::default(),
            })
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let pipeline = pipeline();
        let prepared = pipeline.prepare(&[example()]).unwrap();

        assert_eq!(column_names(&prepared), FINAL_FEATURES.to_vec());
        let row = &to_feature_rows(&prepared).unwrap()[0];
        for value in row {
            assert!((0.0..=1.0).contains(value), "{:?}", row);
        }
        assert_eq!(numeric_values(&prepared, "type_TRANSFER").unwrap(), vec![1.0]);

        let result = pipeline.predict(&example()).unwrap();
        assert_eq!(result.class, FraudClass::Fraud);
        let p = result.fraud_probability.unwrap();
        assert!((0.0..=1.0).contains(&p));
        assert_eq!(result.model_scores.get("transfer_stub"), Some(&p));
    }

    #[test]
    fn test_derived_deltas_reach_the_scaler() {
        let artifacts = fitted_artifacts();
        let balance = artifacts.scaling.range("diff_new_old_balance").unwrap();
        let destiny = artifacts.scaling.range("diff_new_old_destiny").unwrap();

        let row = &pipeline().feature_vectors(&[example()]).unwrap()[0];
        assert_eq!(row[4] as f64, balance.scale(-1000.0) as f32 as f64);
        assert_eq!(row[5] as f64, destiny.scale(1000.0) as f32 as f64);
    }

    #[test]
    fn test_other_indicators_are_zero() {
        let pipeline = pipeline();
        let derived = pipeline
            .deriver
            .model_frame(&pipeline.deriver.derive_batch(&[example()]).unwrap())
            .unwrap();
        let encoded = pipeline.artifacts.encoding.transform(&derived).unwrap();

        for name in pipeline.artifacts.encoding.indicator_columns() {
            let expected = if name == "type_TRANSFER" { 1.0 } else { 0.0 };
            assert_eq!(numeric_values(&encoded, &name).unwrap(), vec![expected], "{}", name);
        }
    }

    #[test]
    fn test_step_reaches_model_unscaled() {
        let pipeline = pipeline();
        assert!(pipeline.artifacts().scaling.range("step").is_none());

        for tx in training_rows() {
            let row = &pipeline.feature_vectors(std::slice::from_ref(&tx)).unwrap()[0];
            assert_eq!(row[0], tx.step as f32);
        }
    }

    #[test]
    fn test_bulk_and_single_paths_match() {
        let pipeline = pipeline();
        let rows = training_rows();
        let bulk = pipeline.feature_vectors(&rows).unwrap();

        for (tx, expected) in rows.iter().zip(&bulk) {
            let single = &pipeline.feature_vectors(std::slice::from_ref(tx)).unwrap()[0];
            let single_bits: Vec<u32> = single.iter().map(|v| v.to_bits()).collect();
            let bulk_bits: Vec<u32> = expected.iter().map(|v| v.to_bits()).collect();
            assert_eq!(single_bits, bulk_bits);
        }

        let batch = pipeline.predict_batch(&rows).unwrap();
        for (tx, result) in rows.iter().zip(&batch) {
            assert_eq!(&pipeline.predict(tx).unwrap(), result);
        }
    }

    #[test]
    fn test_swapping_encoder_and_scaler_is_detected() {
        let pipeline = pipeline();
        let derived = pipeline
            .deriver
            .model_frame(&pipeline.deriver.derive_batch(&[example()]).unwrap())
            .unwrap();

        let err = pipeline.artifacts.scaling.transform(&derived).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("type_"));
    }

    #[test]
    fn test_missing_selector_column_is_schema_error() {
        let mut artifacts = fitted_artifacts();
        artifacts
            .schema
            .columns
            .push("type_TRANSFER_FLAGGED".to_string());
        assert!(FraudPipeline::new(
            Arc::new(artifacts.clone()),
            Arc::new(TransferModel),
            &DetectionConfig::default()
        )
        .is_err());

        // bypass construction checks to exercise the per-call check
        let pipeline = FraudPipeline {
            artifacts: Arc::new(artifacts),
            ..pipeline()
        };
        let err = pipeline.predict(&example()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Select));
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("type_TRANSFER_FLAGGED"));
    }

    #[test]
    fn test_derive_failure_stops_the_pipeline() {
        let tx = example().with_accounts("", "C1");
        let err = pipeline().predict(&tx).unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Derive));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("derive stage failed"));
    }

    #[test]
    fn test_unseen_type_scores_as_non_transfer() {
        let tx = RawTransaction::new(1, "WIRE", 10.0);
        let result = pipeline().predict(&tx).unwrap();
        assert_eq!(result.class, FraudClass::NotFraud);
    }

    #[test]
    fn test_label_only_model() {
        let pipeline = FraudPipeline::new(
            Arc::new(fitted_artifacts()),
            Arc::new(LabelOnlyModel),
            &DetectionConfig::default(),
        )
        .unwrap();

        let result = pipeline.predict(&example()).unwrap();
        assert!(result.is_fraud());
        assert_eq!(result.fraud_probability, None);
        assert_eq!(result.risk_level, None);
    }

    #[test]
    fn test_default_schema_is_versioned() {
        assert_eq!(pipeline().artifacts().schema, FeatureSchema::default());
        assert_eq!(pipeline().predict_batch(&[]).unwrap(), Vec::new());
    }
}
