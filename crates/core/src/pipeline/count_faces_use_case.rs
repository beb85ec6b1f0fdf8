use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::detection::domain::detector_factory::DetectorFactory;
use crate::distribution::domain::model_distributor::ModelDistributor;
use crate::input::domain::record_reader::RecordReader;
use crate::input::infrastructure::image_bundle::ImageBundle;
use crate::input::infrastructure::image_file_reader::ImageFileReader;
use crate::output::domain::result_sink::ResultSink;
use crate::pipeline::job_executor::{ExecutionConfig, JobError, JobExecutor, JobReport};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::constants::{DEFAULT_SPLIT_SIZE, FACE_COUNT_KEY};

/// Orchestrates a face counting job: stage the model, plan splits over the
/// input bundle, run the map/reduce job and hand the aggregate to the sink.
pub struct CountFacesUseCase {
    executor: Box<dyn JobExecutor>,
    distributor: Arc<dyn ModelDistributor>,
    factory: Arc<dyn DetectorFactory>,
    logger: Box<dyn PipelineLogger>,
    split_size: usize,
    cancelled: Arc<AtomicBool>,
}

impl CountFacesUseCase {
    pub fn new(
        executor: Box<dyn JobExecutor>,
        distributor: Arc<dyn ModelDistributor>,
        factory: Arc<dyn DetectorFactory>,
        logger: Box<dyn PipelineLogger>,
    ) -> Self {
        Self {
            executor,
            distributor,
            factory,
            logger,
            split_size: DEFAULT_SPLIT_SIZE,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_split_size(mut self, split_size: usize) -> Self {
        self.split_size = split_size;
        self
    }

    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn execute(
        &mut self,
        input: &Path,
        sink: &mut dyn ResultSink,
    ) -> Result<JobReport, JobError> {
        self.distributor
            .distribute()
            .map_err(JobError::Distribution)?;

        let bundle = ImageBundle::open(input)?;
        let splits = bundle.splits(self.split_size)?;
        self.logger.info(&format!(
            "Counting faces in {} images from {} ({} splits)",
            bundle.len(),
            bundle.root().display(),
            splits.len()
        ));

        let readers: Vec<Box<dyn RecordReader>> = splits
            .into_iter()
            .map(|split| Box::new(ImageFileReader::new(split)) as Box<dyn RecordReader>)
            .collect();

        let config = ExecutionConfig {
            total_records: bundle.len(),
            cancelled: self.cancelled.clone(),
        };
        let report = self.executor.execute(
            readers,
            self.distributor.clone(),
            self.factory.clone(),
            self.logger.as_mut(),
            config,
        )?;

        for (key, result) in &report.results {
            log::debug!("Key {key}: {result:?}");
        }
        let result = report
            .result_for(FACE_COUNT_KEY)
            .copied()
            .unwrap_or_default();
        sink.write(&result)?;
        sink.commit()?;

        let (images, summary) = result.output_row();
        self.logger.info(&format!("{images}\t{summary}"));
        self.logger.counters(&report.counters);
        self.logger.summary();

        Ok(report)
    }
}
