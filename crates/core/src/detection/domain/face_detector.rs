use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::shared::pixel_buffer::PixelBuffer;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },
    #[error("detection failed: {0}")]
    Inference(String),
}

/// Bounding box of a detected face, in buffer pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f64,
}

/// Outcome of one detection call. `face_count` is the number of regions the
/// model kept after its own overlap merging.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub face_count: u32,
    pub regions: Vec<FaceRegion>,
}

impl DetectionResult {
    pub fn from_regions(regions: Vec<FaceRegion>) -> Self {
        Self {
            face_count: u32::try_from(regions.len()).unwrap_or(u32::MAX),
            regions,
        }
    }
}

/// Domain interface for face detection.
///
/// Implementations hold a loaded model that is never mutated by `detect`,
/// hence `&self`. Backends whose primitive needs exclusive access serialize
/// calls internally.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, buffer: &PixelBuffer) -> Result<Vec<FaceRegion>, DetectorError>;
}

/// Worker-local, read-only handle to a loaded detector.
///
/// Built once during worker setup and passed into every record the worker
/// processes. Cloning shares the same model.
#[derive(Clone)]
pub struct DetectorHandle {
    detector: Arc<dyn FaceDetector>,
    description: String,
}

impl DetectorHandle {
    pub fn new(detector: impl FaceDetector + 'static, description: impl Into<String>) -> Self {
        Self {
            detector: Arc::new(detector),
            description: description.into(),
        }
    }

    pub fn detect(&self, buffer: &PixelBuffer) -> Result<DetectionResult, DetectorError> {
        let regions = self.detector.detect(buffer)?;
        Ok(DetectionResult::from_regions(regions))
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorHandle")
            .field("description", &self.description)
            .finish()
    }
}
