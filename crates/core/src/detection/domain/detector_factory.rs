use std::path::Path;

use crate::detection::domain::face_detector::{DetectorError, DetectorHandle};

/// Loads a detector from a model file. Called once per worker before it
/// takes any input.
pub trait DetectorFactory: Send + Sync {
    fn load(&self, model_path: &Path) -> Result<DetectorHandle, DetectorError>;
}
