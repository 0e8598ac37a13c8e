//! Fitted preprocessing state persisted next to the model

use crate::config::PreprocessingConfig;
use crate::error::{PipelineError, Result, Stage};
use crate::preprocessing::{EncodingState, FeatureSchema, ScalingState, MODEL_INPUT_COLUMNS};
use polars::prelude::DataFrame;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const ENCODER_FILE: &str = "one_hot_encoder.json";
pub const SCALER_FILE: &str = "minmax_scaler.json";
pub const SCHEMA_FILE: &str = "feature_schema.json";

/// Encoder, scaler and schema fitted on the training partition.
///
/// Loaded once at startup and shared read-only (`Arc`) by every
/// pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineArtifacts {
    pub encoding: EncodingState,
    pub scaling: ScalingState,
    pub schema: FeatureSchema,
}

impl PipelineArtifacts {
    pub fn new(encoding: EncodingState, scaling: ScalingState, schema: FeatureSchema) -> Self {
        Self {
            encoding,
            scaling,
            schema,
        }
    }

    /// Fit the encoder and scaler on the training features.
    ///
    /// With `scale_indicators` the scaler also covers the encoder's indicator
    /// columns, so it can only run on encoded frames.
    pub fn fit(x_train: &DataFrame, settings: &PreprocessingConfig) -> Result<Self> {
        let encoding = EncodingState::fit(x_train, &settings.categorical_columns)
            .map_err(|e| e.in_stage(Stage::Encode))?;
        let encoded = encoding
            .transform(x_train)
            .map_err(|e| e.in_stage(Stage::Encode))?;

        let scaled_columns = scaled_columns(settings, &encoding);
        let scaling =
            ScalingState::fit(&encoded, &scaled_columns).map_err(|e| e.in_stage(Stage::Scale))?;

        let schema = FeatureSchema::new(settings.schema_version, settings.feature_columns.clone())?;

        let artifacts = Self::new(encoding, scaling, schema);
        artifacts.validate()?;
        Ok(artifacts)
    }

    /// Load all three artifacts from `dir`
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let artifacts = Self {
            encoding: read_json(dir.join(ENCODER_FILE))?,
            scaling: read_json(dir.join(SCALER_FILE))?,
            schema: read_json(dir.join(SCHEMA_FILE))?,
        };

        info!(
            dir = %dir.display(),
            indicators = artifacts.encoding.indicator_columns().len(),
            scaled = artifacts.scaling.ranges.len(),
            schema_version = artifacts.schema.version,
            "Pipeline artifacts loaded"
        );
        Ok(artifacts)
    }

    /// Write all three artifacts into `dir`, creating it if needed
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| PipelineError::io(dir, e))?;
        write_json(dir.join(ENCODER_FILE), &self.encoding)?;
        write_json(dir.join(SCALER_FILE), &self.scaling)?;
        write_json(dir.join(SCHEMA_FILE), &self.schema)?;
        info!(dir = %dir.display(), "Pipeline artifacts saved");
        Ok(())
    }

    /// Check that the schema can be satisfied by the encoder and scaler
    /// outputs, and that every scaled column exists before scaling.
    pub fn validate(&self) -> Result<()> {
        let sources = self.encoding.source_columns();
        let indicators = self.encoding.indicator_columns();

        let pre_scale: Vec<&str> = MODEL_INPUT_COLUMNS
            .iter()
            .copied()
            .filter(|c| !sources.contains(c))
            .chain(indicators.iter().map(String::as_str))
            .collect();

        let unscalable: Vec<&str> = self
            .scaling
            .columns()
            .into_iter()
            .filter(|c| !pre_scale.contains(c))
            .collect();
        if !unscalable.is_empty() {
            return Err(PipelineError::Schema(format!(
                "scaler expects column(s) the encoder output lacks: {}",
                unscalable.join(", ")
            )));
        }

        let missing: Vec<&str> = self
            .schema
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| !pre_scale.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::Schema(format!(
                "feature schema v{} is not satisfiable, missing: {}",
                self.schema.version,
                missing.join(", ")
            )));
        }
        Ok(())
    }
}

/// Columns the scaler is fitted on for the given encoder
pub fn scaled_columns(settings: &PreprocessingConfig, encoding: &EncodingState) -> Vec<String> {
    let mut columns = settings.scaled_columns.clone();
    if settings.scale_indicators {
        columns.extend(encoding.indicator_columns());
    }
    columns
}

pub fn read_json<T: DeserializeOwned>(path: PathBuf) -> Result<T> {
    let bytes = fs::read(&path).map_err(|e| PipelineError::io(&path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| PipelineError::malformed(&path, e))
}

pub fn write_json<T: Serialize>(path: PathBuf, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let json = serde_json::to_vec_pretty(value).map_err(|e| PipelineError::malformed(&path, e))?;
    fs::write(&path, json).map_err(|e| PipelineError::io(&path, e))
}
