//! Subcommand implementations

pub mod batch;
pub mod evaluate;
pub mod predict;
pub mod stream;

use crate::artifacts::PipelineArtifacts;
use crate::config::AppConfig;
use crate::models::InferenceEngine;
use crate::pipeline::FraudPipeline;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Load the fitted artifacts and the configured model into a pipeline
pub fn load_pipeline(config: &AppConfig) -> Result<FraudPipeline> {
    let artifacts = PipelineArtifacts::load(&config.artifacts.dir).with_context(|| {
        format!(
            "Failed to load pipeline artifacts from {}, run `prepare` first",
            config.artifacts.dir.display()
        )
    })?;

    let engine =
        InferenceEngine::new(&config.models).context("Failed to initialize inference engine")?;
    info!(
        strategy = ?engine.strategy(),
        models = ?engine.model_names(),
        "Inference engine ready"
    );

    FraudPipeline::new(Arc::new(artifacts), Arc::new(engine), &config.detection)
        .context("Fitted artifacts do not satisfy the feature schema")
}
