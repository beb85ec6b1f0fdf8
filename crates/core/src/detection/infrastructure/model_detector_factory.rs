use std::path::Path;

use crate::detection::domain::detector_factory::DetectorFactory;
use crate::detection::domain::face_detector::{DetectorError, DetectorHandle};
use crate::shared::job_config::DetectorConfig;

use super::onnx_blazeface_detector::OnnxBlazefaceDetector;
use super::seeta_cascade_detector::{CascadeParams, SeetaCascadeDetector};

/// Model file formats understood by the factory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    /// SeetaFace funnel-structured cascade (`.bin` and anything unrecognized).
    SeetaCascade,
    /// BlazeFace exported to ONNX (`.onnx`).
    OnnxBlazeface,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Self {
        let is_onnx = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
        if is_onnx {
            ModelFormat::OnnxBlazeface
        } else {
            ModelFormat::SeetaCascade
        }
    }
}

/// Picks a detector backend from the model's file extension.
pub struct ModelDetectorFactory {
    config: DetectorConfig,
}

impl ModelDetectorFactory {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl Default for ModelDetectorFactory {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl DetectorFactory for ModelDetectorFactory {
    fn load(&self, model_path: &Path) -> Result<DetectorHandle, DetectorError> {
        let format = ModelFormat::from_path(model_path);
        log::debug!("Loading {:?} model from {}", format, model_path.display());
        let description = format!("{:?}:{}", format, model_path.display());
        match format {
            ModelFormat::SeetaCascade => {
                let params = CascadeParams::from(&self.config);
                let detector = SeetaCascadeDetector::load(model_path, params)?;
                Ok(DetectorHandle::new(detector, description))
            }
            ModelFormat::OnnxBlazeface => {
                let detector = OnnxBlazefaceDetector::load(model_path, self.config.confidence)?;
                Ok(DetectorHandle::new(detector, description))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("models/seeta_fd_frontal_v1.0.bin", ModelFormat::SeetaCascade)]
    #[case("lbpcascade_frontalface.xml", ModelFormat::SeetaCascade)]
    #[case("face_detection_short_range.onnx", ModelFormat::OnnxBlazeface)]
    #[case("FACE.ONNX", ModelFormat::OnnxBlazeface)]
    #[case("no_extension", ModelFormat::SeetaCascade)]
    fn test_format_from_path(#[case] path: &str, #[case] expected: ModelFormat) {
        assert_eq!(ModelFormat::from_path(Path::new(path)), expected);
    }

    #[test]
    fn test_missing_cascade_model_fails_to_load() {
        let factory = ModelDetectorFactory::default();
        let result = factory.load(Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"));
        assert!(matches!(result, Err(DetectorError::ModelLoad { .. })));
    }
}
