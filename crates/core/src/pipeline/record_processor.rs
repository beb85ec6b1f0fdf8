use thiserror::Error;

use crate::conversion::pixel_buffer_converter::{self, MalformedRecord};
use crate::detection::domain::detector_factory::DetectorFactory;
use crate::detection::domain::face_detector::{DetectorError, DetectorHandle};
use crate::distribution::domain::model_distributor::{ModelDistributor, ModelUnavailable};
use crate::shared::constants::FACE_COUNT_KEY;
use crate::shared::image_record::ImageRecord;

/// Map-stage output for one accepted image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartialCount {
    pub key: u32,
    pub value: u32,
}

impl PartialCount {
    pub fn new(face_count: u32) -> Self {
        Self {
            key: FACE_COUNT_KEY,
            value: face_count,
        }
    }
}

/// What the map stage did with one record. Only `Emitted` contributes to
/// the aggregate.
#[derive(Clone, Debug, PartialEq)]
pub enum RecordOutcome {
    Emitted(PartialCount),
    Absent,
    Degenerate { width: u32, height: u32 },
    Malformed(MalformedRecord),
}

/// Worker startup failed. The worker takes no input.
#[derive(Error, Debug)]
pub enum WorkerSetupError {
    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailable),
    #[error(transparent)]
    ModelLoad(#[from] DetectorError),
}

/// Map stage: converts a record to an 8-bit buffer and counts its faces.
pub struct RecordProcessor {
    detector: DetectorHandle,
}

impl RecordProcessor {
    /// Resolves the worker-local model and loads the detector once.
    pub fn setup(
        distributor: &dyn ModelDistributor,
        factory: &dyn DetectorFactory,
    ) -> Result<Self, WorkerSetupError> {
        let model_path = distributor.resolve()?;
        let detector = factory.load(&model_path)?;
        log::debug!("Worker loaded {}", detector.description());
        Ok(Self::new(detector))
    }

    pub fn new(detector: DetectorHandle) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &DetectorHandle {
        &self.detector
    }

    pub fn process(&self, record: Option<&ImageRecord>) -> Result<RecordOutcome, DetectorError> {
        let record = match record {
            Some(record) => record,
            None => return Ok(RecordOutcome::Absent),
        };
        if record.is_degenerate() {
            return Ok(RecordOutcome::Degenerate {
                width: record.width(),
                height: record.height(),
            });
        }

        let buffer = match pixel_buffer_converter::convert(record) {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!(
                    "Skipping malformed record {}: {e}",
                    record.source().unwrap_or("<unnamed>")
                );
                return Ok(RecordOutcome::Malformed(e));
            }
        };

        let detection = self.detector.detect(&buffer)?;
        log::debug!(
            "{}: {} faces",
            record.source().unwrap_or("<unnamed>"),
            detection.face_count
        );
        Ok(RecordOutcome::Emitted(PartialCount::new(detection.face_count)))
    }
}
