//! Single-record prediction and the HTTP form

use crate::config::AppConfig;
use crate::server;
use crate::types::prediction::PredictionResult;
use crate::types::transaction::RawTransaction;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Classify one JSON transaction from `input`, or stdin when `None`
pub fn run(config: &AppConfig, input: Option<&Path>) -> Result<PredictionResult> {
    let json = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read transaction from stdin")?;
            buf
        }
    };
    let transaction: RawTransaction =
        serde_json::from_str(&json).context("Input is not a valid transaction record")?;

    let pipeline = super::load_pipeline(config)?;
    let prediction = pipeline.predict(&transaction)?;
    Ok(prediction)
}

pub async fn serve(config: &AppConfig) -> Result<()> {
    let pipeline = Arc::new(super::load_pipeline(config)?);
    server::run_server(&config.server, pipeline).await
}
