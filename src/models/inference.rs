//! Multi-model inference engine for fraud detection

use crate::config::{InferenceStrategy, ModelsConfig};
use crate::error::{PipelineError, Result};
use crate::models::aggregator::ScoreAggregator;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::models::{FraudModel, ModelOutput};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::collections::BTreeMap;
use std::io;
use std::sync::RwLock;
use tracing::{debug, info};

/// Multi-model inference engine using ONNX Runtime
pub struct InferenceEngine {
    /// Loaded ONNX models; a session run needs `&mut`, hence the lock
    models: Vec<RwLock<LoadedModel>>,
    /// Score aggregator for combining model outputs
    aggregator: ScoreAggregator,
    /// Inference strategy: primary model or ensemble
    strategy: InferenceStrategy,
    /// Primary model name (for primary strategy)
    primary_model: String,
    /// Name reported through [`FraudModel::name`]
    name: String,
}

impl InferenceEngine {
    /// Load the configured models.
    ///
    /// The primary strategy loads only the primary model, and its file must
    /// exist. The ensemble strategy loads every configured file present.
    pub fn new(config: &ModelsConfig) -> Result<Self> {
        let files = match config.strategy {
            InferenceStrategy::Primary => {
                let file = config.files.get(&config.primary_model).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "primary model '{}' has no configured file",
                        config.primary_model
                    ))
                })?;
                let path = config.models_dir.join(file);
                if !path.exists() {
                    return Err(PipelineError::io(
                        path,
                        io::Error::new(io::ErrorKind::NotFound, "primary model file not found"),
                    ));
                }

                let mut files = BTreeMap::new();
                files.insert(config.primary_model.clone(), file.clone());
                files
            }
            InferenceStrategy::Ensemble => config.files.clone(),
        };

        let loader = ModelLoader::with_threads(config.onnx_threads)?;
        let models: Vec<RwLock<LoadedModel>> = loader
            .load_models(&config.models_dir, &files)?
            .into_iter()
            .map(RwLock::new)
            .collect();

        let name = match config.strategy {
            InferenceStrategy::Primary => config.primary_model.clone(),
            InferenceStrategy::Ensemble => "ensemble".to_string(),
        };

        info!(
            strategy = ?config.strategy,
            primary_model = %config.primary_model,
            models = models.len(),
            "Inference engine initialized"
        );

        Ok(Self {
            models,
            aggregator: ScoreAggregator::new(config.weights.clone()),
            strategy: config.strategy.clone(),
            primary_model: config.primary_model.clone(),
            name,
        })
    }

    /// Get the current inference strategy
    pub fn strategy(&self) -> &InferenceStrategy {
        &self.strategy
    }

    /// Get loaded model names
    pub fn model_names(&self) -> Vec<String> {
        self.models
            .iter()
            .filter_map(|m| m.read().ok().map(|m| m.name.clone()))
            .collect()
    }

    /// Run inference on feature vector using the configured strategy
    pub fn predict(&self, features: &[f32]) -> Result<ModelOutput> {
        match self.strategy {
            InferenceStrategy::Primary => self.predict_primary(features),
            InferenceStrategy::Ensemble => self.predict_ensemble(features),
        }
    }

    /// Run inference using only the primary model
    fn predict_primary(&self, features: &[f32]) -> Result<ModelOutput> {
        for model_lock in &self.models {
            let mut model = model_lock
                .write()
                .map_err(|e| PipelineError::Model(format!("model lock poisoned: {}", e)))?;
            if model.name != self.primary_model {
                continue;
            }

            let score = run_single_model(&mut model, features)?;
            debug!(
                strategy = "primary",
                model = %self.primary_model,
                score = score,
                "Primary model inference complete"
            );
            return Ok(ModelOutput::from_probability(&self.primary_model, score));
        }

        Err(PipelineError::Model(format!(
            "primary model '{}' is not loaded",
            self.primary_model
        )))
    }

    /// Run inference using all models and combine with the aggregator
    fn predict_ensemble(&self, features: &[f32]) -> Result<ModelOutput> {
        let mut model_scores = BTreeMap::new();

        for model_lock in &self.models {
            let mut model = model_lock
                .write()
                .map_err(|e| PipelineError::Model(format!("model lock poisoned: {}", e)))?;
            let score = run_single_model(&mut model, features)?;
            model_scores.insert(model.name.clone(), score);
        }

        let probability = self.aggregator.aggregate(&model_scores).ok_or_else(|| {
            PipelineError::Model("ensemble has no weighted model scores".to_string())
        })?;

        debug!(
            strategy = "ensemble",
            probability = probability,
            model_scores = ?model_scores,
            "Ensemble inference complete"
        );

        Ok(ModelOutput {
            probability: Some(probability),
            label: None,
            model_scores,
        })
    }
}

impl FraudModel for InferenceEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &[f32]) -> Result<ModelOutput> {
        self.predict(features)
    }
}

fn model_error(model_name: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Model(format!("{}: {}", model_name, e))
}

/// Run a single model on features
fn run_single_model(model: &mut LoadedModel, features: &[f32]) -> Result<f64> {
    let model_name = model.name.clone();

    // Prepare input tensor - shape [1, num_features]
    let shape = vec![1_i64, features.len() as i64];
    let input_tensor = Tensor::from_array((shape, features.to_vec()))
        .map_err(|e| model_error(&model_name, e))?;

    let outputs = model
        .session
        .run(ort::inputs![&model.input_name => input_tensor])
        .map_err(|e| model_error(&model_name, e))?;

    extract_probability(&outputs, &model.output_name, &model_name)
}

/// Extract the fraud probability from model output.
/// Handles tensor outputs (XGBoost, random forest) and seq(map) outputs
/// (skl2onnx classifiers with ZipMap).
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            if let Some(prob) = fraud_probability_from_tensor(&dims, data) {
                debug!(model = %model_name, prob = prob, "Extracted from tensor");
                return Ok(prob);
            }
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(prob) = extract_from_sequence_map(output, model_name) {
                return Ok(prob);
            }
        }
    }

    // Fallback: try every non-label output
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }

        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            if let Some(prob) = fraud_probability_from_tensor(&dims, data) {
                debug!(
                    model = %model_name,
                    output = %name,
                    prob = prob,
                    "Extracted from tensor (fallback)"
                );
                return Ok(prob);
            }
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            if let Ok(prob) = extract_from_sequence_map(&output, model_name) {
                return Ok(prob);
            }
        }
    }

    Err(PipelineError::Model(format!(
        "{}: no probability output found",
        model_name
    )))
}

/// Extract probability from seq(map(int64, float)) format
fn extract_from_sequence_map(output: &ort::value::DynValue, model_name: &str) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| model_error(model_name, e))?;

    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(|e| model_error(model_name, e))?;

    // batch size is always 1
    let map_value = maps
        .first()
        .ok_or_else(|| model_error(model_name, "empty probability sequence"))?;

    let kv_pairs = map_value
        .try_extract_key_values::<i64, f32>()
        .map_err(|e| model_error(model_name, e))?;

    let pairs: Vec<(i64, f32)> = kv_pairs.iter().map(|(k, v)| (*k, *v)).collect();
    let prob = fraud_probability_from_class_map(&pairs)
        .ok_or_else(|| model_error(model_name, "no class probability in map"))?;

    debug!(model = %model_name, prob = prob, "Extracted from seq(map)");
    Ok(prob)
}

/// Positive-class probability from a `[batch, classes]`, `[classes]` or
/// single-value tensor
pub fn fraud_probability_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return data.last().map(|&v| f64::from(v)),
    };

    match classes {
        c if c >= 2 => data.get(1).map(|&v| f64::from(v)),
        1 => data.first().map(|&v| f64::from(v)),
        _ => None,
    }
}

/// Class 1 probability from a class-id map, or the complement of class 0
pub fn fraud_probability_from_class_map(pairs: &[(i64, f32)]) -> Option<f64> {
    pairs
        .iter()
        .find(|(class, _)| *class == 1)
        .map(|(_, p)| f64::from(*p))
        .or_else(|| {
            pairs
                .iter()
                .find(|(class, _)| *class == 0)
                .map(|(_, p)| 1.0 - f64::from(*p))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_tensor_probability_layouts() {
        assert_eq!(fraud_probability_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(fraud_probability_from_tensor(&[2], &[0.5, 0.5]), Some(0.5));
        assert_eq!(fraud_probability_from_tensor(&[1, 1], &[0.125]), Some(0.125));
        assert_eq!(fraud_probability_from_tensor(&[1, 0], &[]), None);
        assert_eq!(fraud_probability_from_tensor(&[1, 1, 1], &[]), None);
    }

    #[test]
    fn test_class_map_probability() {
        assert_eq!(fraud_probability_from_class_map(&[(0, 0.25), (1, 0.75)]), Some(0.75));
        assert_eq!(fraud_probability_from_class_map(&[(0, 0.25)]), Some(0.75));
        assert_eq!(fraud_probability_from_class_map(&[(2, 0.25)]), None);
    }

    #[test]
    fn test_missing_primary_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelsConfig {
            models_dir: dir.path().to_path_buf(),
            ..ModelsConfig::default()
        };

        let err = InferenceEngine::new(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("xgboost.onnx"));
    }

    #[test]
    fn test_unconfigured_primary_is_config_error() {
        let config = ModelsConfig {
            primary_model: "catboost".to_string(),
            ..ModelsConfig::default()
        };

        let err = InferenceEngine::new(&config).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
