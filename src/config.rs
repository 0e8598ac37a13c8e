//! Configuration management for the fraud detection pipeline
//!
//! Values come from `config/config.toml`, overridden by `FRAUD__SECTION__KEY`
//! environment variables (e.g. `FRAUD__DETECTION__THRESHOLD=0.6`).

use crate::preprocessing::scaler::NUMERIC_COLUMNS;
use crate::preprocessing::selector::{FINAL_FEATURES, SCHEMA_VERSION};
use crate::preprocessing::split::SplitConfig;
use crate::types::alert::RiskLevelThresholds;
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Inference strategy for fraud detection
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStrategy {
    /// Score with the primary model only
    #[default]
    Primary,
    /// Weighted average over every loaded model
    Ensemble,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub artifacts: ArtifactsConfig,
    pub models: ModelsConfig,
    pub detection: DetectionConfig,
    pub split: SplitConfig,
    pub preprocessing: PreprocessingConfig,
    pub server: ServerConfig,
    pub nats: NatsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// On-disk layout of the batch stages
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Raw transaction CSV with the dataset's original headers
    pub raw_path: PathBuf,
    pub interim_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub metrics_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("data/external/fraud_detection.csv"),
            interim_dir: PathBuf::from("data/interim"),
            processed_dir: PathBuf::from("data/processed"),
            metrics_dir: PathBuf::from("metrics"),
        }
    }
}

impl DataConfig {
    pub fn featured_path(&self) -> PathBuf {
        self.interim_dir.join("featured_data.csv")
    }

    pub fn split_dir(&self) -> PathBuf {
        self.processed_dir.join("split")
    }

    pub fn ohe_dir(&self) -> PathBuf {
        self.processed_dir.join("ohe")
    }

    pub fn scaling_dir(&self) -> PathBuf {
        self.processed_dir.join("scaling")
    }

    pub fn finefeatures_dir(&self) -> PathBuf {
        self.processed_dir.join("finefeatures")
    }
}

/// Location of the fitted encoder, scaler and feature schema
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub dir: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

/// ML models configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory containing ONNX model files
    pub models_dir: PathBuf,
    /// Model name to ONNX file name, relative to `models_dir`
    pub files: BTreeMap<String, String>,
    pub strategy: InferenceStrategy,
    /// Model used by the primary strategy
    pub primary_model: String,
    /// Model weights for ensemble scoring
    pub weights: HashMap<String, f64>,
    /// Number of threads for ONNX inference per model
    pub onnx_threads: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        let mut files = BTreeMap::new();
        files.insert("random_forest".to_string(), "random_forest.onnx".to_string());
        files.insert("xgboost".to_string(), "xgboost.onnx".to_string());

        let mut weights = HashMap::new();
        weights.insert("xgboost".to_string(), 0.6);
        weights.insert("random_forest".to_string(), 0.4);

        Self {
            models_dir: PathBuf::from("models"),
            files,
            strategy: InferenceStrategy::Primary,
            primary_model: "xgboost".to_string(),
            weights,
            onnx_threads: 1,
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Probability at or above which a transaction is classified as fraud
    pub threshold: f64,
    /// Risk level classification thresholds
    pub risk_levels: RiskLevelThresholds,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            risk_levels: RiskLevelThresholds::default(),
        }
    }
}

/// Columns the encoder, scaler and selector work on
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub categorical_columns: Vec<String>,
    pub scaled_columns: Vec<String>,
    /// Also min-max the one-hot indicator columns, so the encoder must run first
    pub scale_indicators: bool,
    pub schema_version: u32,
    /// Model input columns, in model order
    pub feature_columns: Vec<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            categorical_columns: vec!["type".to_string()],
            scaled_columns: NUMERIC_COLUMNS.iter().map(|c| c.to_string()).collect(),
            scale_indicators: true,
            schema_version: SCHEMA_VERSION,
            feature_columns: FINAL_FEATURES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// HTTP form server
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for outgoing fraud alerts
    pub alert_subject: String,
    /// Queue group, so several consumers share one subject
    pub queue_group: Option<String>,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            transaction_subject: "transactions".to_string(),
            alert_subject: "fraud.alerts".to_string(),
            queue_group: None,
        }
    }
}

/// Streaming pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of transactions processed concurrently
    pub workers: usize,
    /// Seconds between metrics summaries
    pub report_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            report_interval_secs: 30,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path; a missing file means defaults
    pub fn load() -> Result<Self> {
        Self::build(Path::new(DEFAULT_CONFIG_PATH), false)
    }

    /// Load configuration from a specific path, which must exist
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(path.as_ref(), true)
    }

    fn build(path: &Path, required: bool) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path).required(required))
            .add_source(
                Environment::with_prefix("FRAUD")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no stage could run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.detection.threshold),
            "detection.threshold must be within [0, 1], got {}",
            self.detection.threshold
        );
        ensure!(self.pipeline.workers > 0, "pipeline.workers must be positive");
        ensure!(
            self.split.test_size > 0.0 && self.split.test_size < 1.0,
            "split.test_size must be in (0, 1)"
        );
        ensure!(
            self.split.valid_size > 0.0 && self.split.valid_size < 1.0,
            "split.valid_size must be in (0, 1)"
        );
        ensure!(
            !self.preprocessing.feature_columns.is_empty(),
            "preprocessing.feature_columns must not be empty"
        );
        if self.models.strategy == InferenceStrategy::Primary {
            ensure!(
                self.models.files.contains_key(&self.models.primary_model),
                "primary model '{}' has no entry in models.files",
                self.models.primary_model
            );
        }
        Ok(())
    }
}
