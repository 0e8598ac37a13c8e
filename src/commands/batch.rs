//! Batch stages that turn the raw CSV into model-ready partitions.
//!
//! Each stage reads the previous stage's files, so they can be rerun one at
//! a time. Fitted state goes to the artifacts directory.

use crate::artifacts::{self, PipelineArtifacts, ENCODER_FILE, SCALER_FILE, SCHEMA_FILE};
use crate::config::AppConfig;
use crate::error::Stage;
use crate::frame;
use crate::preprocessing::split::{binary_labels, positive_rate};
use crate::preprocessing::{
    split_dataset, EncodingState, FeatureDeriver, FeatureSchema, ScalingState, SplitDataset,
    LABEL_COLUMN, NON_FEATURE_COLUMNS,
};
use crate::types::transaction::read_transactions;
use anyhow::{Context, Result};
use polars::prelude::{DataFrame, NamedFrom, Series};
use std::path::{Path, PathBuf};
use tracing::info;

/// Split file suffix and the suffix used by the later stages
const PARTITIONS: [(&str, &str); 3] = [("train", "train"), ("val", "valid"), ("test", "test")];

pub fn x_split_path(config: &AppConfig, partition: &str) -> PathBuf {
    config.data.split_dir().join(format!("X_{}.csv", partition))
}

pub fn y_split_path(config: &AppConfig, partition: &str) -> PathBuf {
    config.data.split_dir().join(format!("y_{}.csv", partition))
}

pub fn final_features_path(config: &AppConfig, partition: &str) -> PathBuf {
    config
        .data
        .finefeatures_dir()
        .join(format!("X_{}_finalfeatures.csv", partition))
}

fn ohe_path(config: &AppConfig, partition: &str) -> PathBuf {
    config.data.ohe_dir().join(format!("X_{}_ohe.csv", partition))
}

fn scaled_path(config: &AppConfig, partition: &str) -> PathBuf {
    config.data.scaling_dir().join(format!("X_{}_scaled.csv", partition))
}

fn read_frame(path: &Path) -> Result<DataFrame> {
    frame::read_csv(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    frame::write_csv(df, path).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), rows = df.height(), columns = df.width(), "Wrote frame");
    Ok(())
}

/// Derive features from the raw CSV into the featured dataset
pub fn featurize(config: &AppConfig) -> Result<PathBuf> {
    let raw_path = &config.data.raw_path;
    let transactions = read_transactions(raw_path)
        .with_context(|| format!("Failed to load raw transactions from {}", raw_path.display()))?;
    info!(path = %raw_path.display(), rows = transactions.len(), "Raw transactions loaded");

    let deriver = FeatureDeriver::new();
    let mut featured = deriver
        .derive_batch(&transactions)
        .and_then(|rows| deriver.featured_frame(&rows))
        .map_err(|e| e.in_stage(Stage::Derive))
        .context("Feature derivation failed")?;

    let output = config.data.featured_path();
    write_frame(&mut featured, &output)?;
    Ok(output)
}

/// Stratified split of the featured dataset
pub fn split(config: &AppConfig) -> Result<SplitDataset> {
    let featured = read_frame(&config.data.featured_path())?;
    let dataset = split_dataset(&featured, LABEL_COLUMN, &NON_FEATURE_COLUMNS, &config.split)
        .context("Stratified split failed")?;

    let partitions = [
        (&dataset.x_train, &dataset.y_train),
        (&dataset.x_valid, &dataset.y_valid),
        (&dataset.x_test, &dataset.y_test),
    ];
    for ((name, _), (x, y)) in PARTITIONS.into_iter().zip(partitions) {
        write_frame(&mut x.clone(), &x_split_path(config, name))?;
        let values: Vec<i64> = y.iter().map(|&v| i64::from(v)).collect();
        let mut labels = DataFrame::new(vec![Series::new(LABEL_COLUMN.into(), values).into()])?;
        write_frame(&mut labels, &y_split_path(config, name))?;
        info!(partition = name, positive_rate = positive_rate(y), "Partition written");
    }
    Ok(dataset)
}

/// Fit the encoder on the training split, encode every split
pub fn encode(config: &AppConfig) -> Result<EncodingState> {
    let x_train = read_frame(&x_split_path(config, "train"))?;
    let encoding = EncodingState::fit(&x_train, &config.preprocessing.categorical_columns)
        .map_err(|e| e.in_stage(Stage::Encode))
        .context("Encoder fit failed")?;

    for (split_name, name) in PARTITIONS {
        let df = read_frame(&x_split_path(config, split_name))?;
        let mut encoded = encoding
            .transform(&df)
            .map_err(|e| e.in_stage(Stage::Encode))
            .with_context(|| format!("Encoding the {} split failed", name))?;
        write_frame(&mut encoded, &ohe_path(config, name))?;
    }

    artifacts::write_json(config.artifacts.dir.join(ENCODER_FILE), &encoding)?;
    info!(indicators = ?encoding.indicator_columns(), "Encoder fitted");
    Ok(encoding)
}

/// Fit the scaler on the encoded training split, scale every split
pub fn scale(config: &AppConfig) -> Result<ScalingState> {
    let encoding: EncodingState = artifacts::read_json(config.artifacts.dir.join(ENCODER_FILE))
        .context("Encoder state is missing, run `encode` first")?;
    let columns = artifacts::scaled_columns(&config.preprocessing, &encoding);

    let x_train = read_frame(&ohe_path(config, "train"))?;
    let scaling = ScalingState::fit(&x_train, &columns)
        .map_err(|e| e.in_stage(Stage::Scale))
        .context("Scaler fit failed")?;

    for (_, name) in PARTITIONS {
        let df = read_frame(&ohe_path(config, name))?;
        let mut scaled = scaling
            .transform(&df)
            .map_err(|e| e.in_stage(Stage::Scale))
            .with_context(|| format!("Scaling the {} split failed", name))?;
        write_frame(&mut scaled, &scaled_path(config, name))?;
    }

    artifacts::write_json(config.artifacts.dir.join(SCALER_FILE), &scaling)?;
    info!(columns = columns.len(), "Scaler fitted");
    Ok(scaling)
}

/// Keep the model input columns and persist the feature schema
pub fn select(config: &AppConfig) -> Result<FeatureSchema> {
    let settings = &config.preprocessing;
    let schema = FeatureSchema::new(settings.schema_version, settings.feature_columns.clone())?;

    for (_, name) in PARTITIONS {
        let df = read_frame(&scaled_path(config, name))?;
        let mut selected = schema
            .select(&df)
            .map_err(|e| e.in_stage(Stage::Select))
            .with_context(|| format!("Selecting features of the {} split failed", name))?;
        write_frame(&mut selected, &final_features_path(config, name))?;
    }

    artifacts::write_json(config.artifacts.dir.join(SCHEMA_FILE), &schema)?;

    // the three artifacts must now load and agree with each other
    PipelineArtifacts::load(&config.artifacts.dir)
        .and_then(|loaded| loaded.validate())
        .context("Fitted artifacts are inconsistent")?;
    info!(version = schema.version, columns = ?schema.columns, "Feature schema written");
    Ok(schema)
}

/// Every batch stage, in order
pub fn prepare(config: &AppConfig) -> Result<()> {
    featurize(config)?;
    split(config)?;
    encode(config)?;
    scale(config)?;
    select(config)?;
    info!(artifacts = %config.artifacts.dir.display(), "Preprocessing complete");
    Ok(())
}

/// Labels written by [`split`]
pub fn read_labels(path: &Path) -> Result<Vec<u8>> {
    let df = read_frame(path)?;
    binary_labels(&df, LABEL_COLUMN)
        .with_context(|| format!("Invalid labels in {}", path.display()))
}
