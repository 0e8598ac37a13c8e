//! Score the test split and persist evaluation metrics per model

use super::batch::{final_features_path, read_labels, y_split_path};
use crate::artifacts::{self, SCHEMA_FILE};
use crate::config::{AppConfig, InferenceStrategy, ModelsConfig};
use crate::evaluation::{score_frame, EvaluationMetrics};
use crate::frame;
use crate::models::{FraudModel, InferenceEngine};
use crate::preprocessing::FeatureSchema;
use anyhow::{bail, Context, Result};
use tracing::{info, warn};

/// Evaluate one model, or every configured model whose file exists
pub fn run(config: &AppConfig, model: Option<&str>) -> Result<Vec<EvaluationMetrics>> {
    let names: Vec<String> = match model {
        Some(name) => vec![name.to_string()],
        None => config
            .models
            .files
            .iter()
            .filter(|(name, file)| {
                let exists = config.models.models_dir.join(file).exists();
                if !exists {
                    warn!(model = %name, file = %file, "Model file not found, skipping evaluation");
                }
                exists
            })
            .map(|(name, _)| name.clone())
            .collect(),
    };
    if names.is_empty() {
        bail!(
            "no model files found in {}",
            config.models.models_dir.display()
        );
    }

    let mut results = Vec::with_capacity(names.len() + 1);
    for name in &names {
        let models = ModelsConfig {
            strategy: InferenceStrategy::Primary,
            primary_model: name.clone(),
            ..config.models.clone()
        };
        let engine = InferenceEngine::new(&models)
            .with_context(|| format!("Failed to load model '{}'", name))?;
        results.push(evaluate_model(config, &engine)?);
    }

    if model.is_none() && config.models.strategy == InferenceStrategy::Ensemble && names.len() > 1 {
        let engine = InferenceEngine::new(&config.models).context("Failed to load the ensemble")?;
        results.push(evaluate_model(config, &engine)?);
    }
    Ok(results)
}

/// Score the prepared test split with `model` and write its metrics to
/// `<metrics_dir>/<model name>/`
pub fn evaluate_model(config: &AppConfig, model: &dyn FraudModel) -> Result<EvaluationMetrics> {
    let schema: FeatureSchema = artifacts::read_json(config.artifacts.dir.join(SCHEMA_FILE))
        .context("Feature schema is missing, run `select` first")?;

    let x_path = final_features_path(config, "test");
    let x_test = frame::read_csv(&x_path)
        .with_context(|| format!("Failed to read {}", x_path.display()))?;
    let y_test = read_labels(&y_split_path(config, "test"))?;

    let (y_pred, y_score) = score_frame(model, &schema, &x_test, config.detection.threshold)
        .with_context(|| format!("Scoring with '{}' failed", model.name()))?;
    let metrics = EvaluationMetrics::compute(model.name(), &y_test, &y_pred, y_score.as_deref())?;

    metrics.save(config.data.metrics_dir.join(model.name()))?;
    info!(
        model = %model.name(),
        rows = y_test.len(),
        accuracy = metrics.accuracy,
        precision = metrics.precision,
        recall = metrics.recall,
        f1 = metrics.f1,
        roc_auc = ?metrics.roc_auc,
        "Evaluation complete"
    );
    Ok(metrics)
}
