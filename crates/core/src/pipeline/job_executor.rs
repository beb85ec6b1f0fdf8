use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::detector_factory::DetectorFactory;
use crate::detection::domain::face_detector::DetectorError;
use crate::distribution::domain::model_distributor::ModelDistributor;
use crate::input::domain::record_reader::{ReadError, RecordReader};
use crate::output::domain::result_sink::SinkError;
use crate::pipeline::count_aggregator::AggregateResult;
use crate::pipeline::job_counters::JobCounters;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::record_processor::WorkerSetupError;

/// Configuration for one job run.
#[derive(Clone, Debug, Default)]
pub struct ExecutionConfig {
    /// Records expected across all readers, for progress. 0 when unknown.
    pub total_records: usize,
    pub cancelled: Arc<AtomicBool>,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("worker {worker} failed to start: {source}")]
    WorkerSetup {
        worker: usize,
        #[source]
        source: WorkerSetupError,
    },
    #[error("reading {split} failed: {source}")]
    Read {
        split: String,
        #[source]
        source: ReadError,
    },
    #[error("detection failed in {split}: {source}")]
    Detection {
        split: String,
        #[source]
        source: DetectorError,
    },
    #[error("worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("job cancelled")]
    Cancelled,
    #[error("model distribution failed: {0}")]
    Distribution(Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Input(#[from] ReadError),
}

/// Everything a finished job produced: one aggregate per key plus counters.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JobReport {
    pub results: Vec<(u32, AggregateResult)>,
    pub counters: JobCounters,
}

impl JobReport {
    pub fn result_for(&self, key: u32) -> Option<&AggregateResult> {
        self.results
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, result)| result)
    }
}

/// Runs map tasks over the readers, shuffles partial counts by key and
/// reduces each group.
///
/// This is a port (application-layer interface). Infrastructure provides
/// the concrete scheduling.
pub trait JobExecutor: Send {
    fn execute(
        &self,
        readers: Vec<Box<dyn RecordReader>>,
        distributor: Arc<dyn ModelDistributor>,
        factory: Arc<dyn DetectorFactory>,
        logger: &mut dyn PipelineLogger,
        config: ExecutionConfig,
    ) -> Result<JobReport, JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::constants::FACE_COUNT_KEY;

    #[test]
    fn test_result_for_finds_key() {
        let report = JobReport {
            results: vec![(
                FACE_COUNT_KEY,
                AggregateResult {
                    images_processed: 3,
                    total_faces: 3,
                },
            )],
            counters: JobCounters::default(),
        };
        assert_eq!(report.result_for(FACE_COUNT_KEY).unwrap().total_faces, 3);
        assert!(report.result_for(FACE_COUNT_KEY + 1).is_none());
    }

    #[test]
    fn test_error_messages_name_the_split() {
        let err = JobError::Detection {
            split: "split-00002".into(),
            source: DetectorError::Inference("boom".into()),
        };
        assert_eq!(
            err.to_string(),
            "detection failed in split-00002: detection failed: boom"
        );
    }
}
