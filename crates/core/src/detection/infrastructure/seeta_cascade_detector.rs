use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::detection::domain::face_detector::{DetectorError, FaceDetector, FaceRegion};
use crate::shared::job_config::DetectorConfig;
use crate::shared::pixel_buffer::PixelBuffer;

/// Multi-scale search parameters for the funnel-structured cascade.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeParams {
    pub min_face_size: u32,
    pub score_threshold: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: (u32, u32),
}

impl Default for CascadeParams {
    fn default() -> Self {
        Self::from(&DetectorConfig::default())
    }
}

impl CascadeParams {
    /// Whether an image this size holds at least one search window.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width.min(height) >= self.min_face_size
    }
}

impl From<&DetectorConfig> for CascadeParams {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            min_face_size: config.min_face_size,
            score_threshold: config.score_threshold,
            pyramid_scale_factor: config.pyramid_scale_factor,
            slide_window_step: config.slide_window_step,
        }
    }
}

/// Cascade classifier face detector backed by the `rustface` SeetaFace engine.
///
/// The parsed model is immutable; each `detect` call builds a fresh engine
/// from a clone of it, so one handle can serve concurrent callers.
pub struct SeetaCascadeDetector {
    model: rustface::Model,
    params: CascadeParams,
}

impl SeetaCascadeDetector {
    /// Parse a SeetaFace model file.
    pub fn load(model_path: &Path, params: CascadeParams) -> Result<Self, DetectorError> {
        let load_error = |reason: String| DetectorError::ModelLoad {
            path: model_path.to_path_buf(),
            reason,
        };
        let file = File::open(model_path).map_err(|e| load_error(e.to_string()))?;
        let model = rustface::read_model(BufReader::new(file))
            .map_err(|e| load_error(format!("not a valid cascade model: {e}")))?;
        log::info!("Loaded cascade model from {}", model_path.display());
        Ok(Self { model, params })
    }
}

impl FaceDetector for SeetaCascadeDetector {
    fn detect(&self, buffer: &PixelBuffer) -> Result<Vec<FaceRegion>, DetectorError> {
        if !self.params.fits(buffer.width(), buffer.height()) {
            return Ok(Vec::new());
        }

        let rgb = buffer.to_rgb_image().ok_or_else(|| {
            DetectorError::Inference("pixel buffer does not match its dimensions".into())
        })?;
        let gray = image::imageops::grayscale(&rgb);

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.params.min_face_size);
        detector.set_score_thresh(self.params.score_threshold);
        detector.set_pyramid_scale_factor(self.params.pyramid_scale_factor);
        let (step_x, step_y) = self.params.slide_window_step;
        detector.set_slide_window_step(step_x, step_y);

        let faces = detector.detect(&rustface::ImageData::new(
            gray.as_raw(),
            gray.width(),
            gray.height(),
        ));

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceRegion {
                    x: bbox.x() as i32,
                    y: bbox.y() as i32,
                    width: bbox.width() as i32,
                    height: bbox.height() as i32,
                    score: face.score(),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::domain::model_distributor::ModelDistributor;
    use crate::distribution::infrastructure::distributed_cache::{default_root, DistributedCache};
    use crate::shared::constants::DEFAULT_MODEL_URI;
    use rstest::rstest;
    use tempfile::TempDir;

    fn load_default_model() -> SeetaCascadeDetector {
        let mut cache = DistributedCache::new(default_root().expect("No cache directory"));
        cache.add_cache_file(DEFAULT_MODEL_URI).unwrap();
        cache.distribute().expect("Failed to stage cascade model");
        let path = cache.resolve().expect("Cascade model not readable");
        SeetaCascadeDetector::load(&path, CascadeParams::default())
            .expect("Failed to load cascade model")
    }

    #[test]
    fn test_default_params() {
        let params = CascadeParams::default();
        assert_eq!(params.min_face_size, 20);
        assert!((params.score_threshold - 2.0).abs() < f64::EPSILON);
        assert!((params.pyramid_scale_factor - 0.8).abs() < f32::EPSILON);
        assert_eq!(params.slide_window_step, (4, 4));
    }

    #[test]
    fn test_params_follow_config() {
        let config = DetectorConfig {
            min_face_size: 48,
            slide_window_step: (2, 3),
            ..DetectorConfig::default()
        };
        let params = CascadeParams::from(&config);
        assert_eq!(params.min_face_size, 48);
        assert_eq!(params.slide_window_step, (2, 3));
    }

    #[test]
    fn test_load_missing_file_is_model_load_error() {
        let result = SeetaCascadeDetector::load(
            Path::new("/nonexistent/seeta_fd_frontal_v1.0.bin"),
            CascadeParams::default(),
        );
        assert!(matches!(result, Err(DetectorError::ModelLoad { .. })));
    }

    #[test]
    fn test_load_empty_file_is_model_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let err = SeetaCascadeDetector::load(&path, CascadeParams::default())
            .err()
            .unwrap();
        match err {
            DetectorError::ModelLoad { path: p, reason } => {
                assert_eq!(p, path);
                assert!(reason.contains("not a valid cascade model"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[rstest]
    #[case(20, 20, true)]
    #[case(640, 480, true)]
    #[case(19, 200, false)]
    #[case(200, 19, false)]
    #[case(2, 2, false)]
    fn test_fits_needs_min_face_size_on_both_sides(
        #[case] width: u32,
        #[case] height: u32,
        #[case] fits: bool,
    ) {
        assert_eq!(CascadeParams::default().fits(width, height), fits);
    }

    #[test]
    #[ignore] // Requires the SeetaFace cascade model
    fn test_detect_below_min_face_size_finds_nothing() {
        let detector = load_default_model();
        let buffer = PixelBuffer::new(vec![255; 10 * 10 * 3], 10, 10);
        assert!(detector.detect(&buffer).unwrap().is_empty());
    }

    #[test]
    #[ignore] // Requires the SeetaFace cascade model
    fn test_detect_blank_image_finds_nothing() {
        let detector = load_default_model();
        let buffer = PixelBuffer::new(vec![128; 64 * 48 * 3], 64, 48);
        assert!(detector.detect(&buffer).unwrap().is_empty());
    }
}
