use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{DEFAULT_MODEL_URI, DEFAULT_SPLIT_SIZE};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tuning for the detector backends. Cascade fields apply to SeetaFace
/// models, `confidence` to ONNX models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: (u32, u32),
    pub confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_face_size: 20,
            score_threshold: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: (4, 4),
            confidence: 0.5,
        }
    }
}

/// Job-level settings, loadable from a JSON file. Missing fields take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Model URI with an optional `#link` name, e.g. `/models/face.bin#face.bin`.
    pub model: String,
    pub workers: usize,
    pub split_size: usize,
    pub cache_dir: Option<PathBuf>,
    pub detector: DetectorConfig,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_URI.to_string(),
            workers: default_workers(),
            split_size: DEFAULT_SPLIT_SIZE,
            cache_dir: None,
            detector: DetectorConfig::default(),
        }
    }
}

impl JobConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model URI must not be empty".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.split_size == 0 {
            return Err(ConfigError::Invalid("split_size must be at least 1".into()));
        }
        let d = &self.detector;
        if d.min_face_size < 20 {
            return Err(ConfigError::Invalid(format!(
                "min_face_size must be at least 20, got {}",
                d.min_face_size
            )));
        }
        if !d.score_threshold.is_finite() {
            return Err(ConfigError::Invalid("score_threshold must be finite".into()));
        }
        if !(d.pyramid_scale_factor > 0.0 && d.pyramid_scale_factor < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "pyramid_scale_factor must be in (0, 1), got {}",
                d.pyramid_scale_factor
            )));
        }
        if d.slide_window_step.0 == 0 || d.slide_window_step.1 == 0 {
            return Err(ConfigError::Invalid(
                "slide_window_step must be positive in both directions".into(),
            ));
        }
        if !(0.0..=1.0).contains(&d.confidence) {
            return Err(ConfigError::Invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                d.confidence
            )));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
