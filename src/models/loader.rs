//! ONNX model loader

use crate::error::{PipelineError, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with the given intra-op thread count
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init()
            .commit()
            .map_err(|e| PipelineError::Model(format!("ONNX Runtime init failed: {}", e)))?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(
            model = %name,
            path = %path.display(),
            threads = self.onnx_threads,
            "Loading ONNX model"
        );

        let session = Session::builder()
            .map_err(|e| load_failed(name, path, e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_failed(name, path, e))?
            .with_intra_threads(self.onnx_threads)
            .map_err(|e| load_failed(name, path, e))?
            .commit_from_file(path)
            .map_err(|e| load_failed(name, path, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // skl2onnx exports name the positive-class scores "probabilities"
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }

    /// Load the configured model files from `models_dir`.
    ///
    /// Missing files are skipped with a warning; loading nothing at all is
    /// an error.
    pub fn load_models<P: AsRef<Path>>(
        &self,
        models_dir: P,
        files: &BTreeMap<String, String>,
    ) -> Result<Vec<LoadedModel>> {
        let models_dir = models_dir.as_ref();
        let mut models = Vec::new();

        for (name, path) in resolve_model_files(models_dir, files) {
            if path.exists() {
                models.push(self.load_model(&path, &name)?);
            } else {
                warn!(model = %name, path = %path.display(), "Model file not found, skipping");
            }
        }

        if models.is_empty() {
            return Err(PipelineError::io(
                models_dir,
                io::Error::new(io::ErrorKind::NotFound, "no model files found"),
            ));
        }

        info!(
            count = models.len(),
            dir = %models_dir.display(),
            "Models loaded"
        );

        Ok(models)
    }
}

fn load_failed(name: &str, path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Model(format!(
        "failed to load model '{}' from {}: {}",
        name,
        path.display(),
        e
    ))
}

/// Paths of the configured model files, keyed by model name
pub fn resolve_model_files(
    models_dir: &Path,
    files: &BTreeMap<String, String>,
) -> Vec<(String, PathBuf)> {
    files
        .iter()
        .map(|(name, file)| (name.clone(), models_dir.join(file)))
        .collect()
}
