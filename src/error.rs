//! Error types for the fraud detection pipeline

use polars::prelude::PolarsError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used by the library stages
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Derive,
    Encode,
    Scale,
    Select,
    Predict,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Derive => "derive",
            Stage::Encode => "encode",
            Stage::Scale => "scale",
            Stage::Select => "select",
            Stage::Predict => "predict",
        };
        f.write_str(name)
    }
}

/// Coarse error category, so callers can react per kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Schema,
    Config,
    Io,
    Model,
}

/// Main error type for the pipeline stages and artifact handling
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("schema mismatch: {0}")]
    Schema(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data in {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("model error: {0}")]
    Model(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a decode failure with the path it happened on
    pub fn malformed(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        PipelineError::Malformed {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Attach the originating stage. An error already tagged keeps its stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error originated in, if it was raised by the pipeline
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Schema(_) => ErrorKind::Schema,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Io { .. } | PipelineError::Malformed { .. } => ErrorKind::Io,
            PipelineError::Model(_) => ErrorKind::Model,
            PipelineError::Stage { source, .. } => source.kind(),
        }
    }
}

impl From<PolarsError> for PipelineError {
    fn from(e: PolarsError) -> Self {
        match e {
            PolarsError::ColumnNotFound(name) => {
                PipelineError::Schema(format!("missing column {}", name))
            }
            other => PipelineError::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapping_keeps_kind() {
        let err = PipelineError::Schema("missing column: type_TRANSFER".to_string())
            .in_stage(Stage::Select);

        assert_eq!(err.stage(), Some(Stage::Select));
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(
            err.to_string(),
            "select stage failed: schema mismatch: missing column: type_TRANSFER"
        );
    }

    #[test]
    fn test_stage_is_not_rewrapped() {
        let err = PipelineError::Validation("empty name_orig".to_string())
            .in_stage(Stage::Derive)
            .in_stage(Stage::Predict);

        assert_eq!(err.stage(), Some(Stage::Derive));
    }

    #[test]
    fn test_io_error_reports_path() {
        let err = PipelineError::io(
            "models/minmax_scaler.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("models/minmax_scaler.json"));
    }

    #[test]
    fn test_missing_frame_column_is_schema_error() {
        let err = PipelineError::from(PolarsError::ColumnNotFound("type_TRANSFER".into()));
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.to_string().contains("type_TRANSFER"));
    }
}
