use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::detection::domain::detector_factory::DetectorFactory;
use crate::distribution::domain::model_distributor::ModelDistributor;
use crate::input::domain::record_reader::RecordReader;
use crate::pipeline::count_aggregator::{AggregateResult, CountAggregator};
use crate::pipeline::job_counters::JobCounters;
use crate::pipeline::job_executor::{ExecutionConfig, JobError, JobExecutor, JobReport};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::record_processor::{PartialCount, RecordOutcome, RecordProcessor};
use crate::shared::constants::FACE_COUNT_KEY;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

enum WorkerEvent {
    Record {
        elapsed_ms: f64,
    },
    /// A split finished cleanly; its partials become visible to the reducer.
    Committed {
        partials: Vec<PartialCount>,
        counters: JobCounters,
    },
}

/// What workers check between records: the caller's cancel flag and an
/// abort flag local to one job run. Only a failing worker raises the abort.
#[derive(Clone)]
struct StopSignal {
    cancelled: Arc<AtomicBool>,
    aborted: Arc<AtomicBool>,
}

impl StopSignal {
    fn new(cancelled: Arc<AtomicBool>) -> Self {
        Self {
            cancelled,
            aborted: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_set(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || self.aborted.load(Ordering::Relaxed)
    }

    fn abort(&self) {
        self.aborted.store(true, Ordering::Relaxed);
    }
}

struct SplitOutput {
    partials: Vec<PartialCount>,
    counters: JobCounters,
}

/// Executes the map/reduce job with a pool of worker threads.
///
/// Layout: `split queue → workers [setup, map] → coordinator [shuffle] → reduce`
///
/// Each worker loads its own detector before taking a split. Partial counts
/// from a split are only committed once the whole split has been read, so a
/// failed split never leaks into the aggregate.
pub struct ThreadedJobExecutor {
    workers: usize,
    channel_capacity: usize,
}

impl ThreadedJobExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Default for ThreadedJobExecutor {
    fn default() -> Self {
        Self::new(
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        )
    }
}

impl JobExecutor for ThreadedJobExecutor {
    fn execute(
        &self,
        readers: Vec<Box<dyn RecordReader>>,
        distributor: Arc<dyn ModelDistributor>,
        factory: Arc<dyn DetectorFactory>,
        logger: &mut dyn PipelineLogger,
        config: ExecutionConfig,
    ) -> Result<JobReport, JobError> {
        let worker_count = self.workers.min(readers.len()).max(1);
        logger.info(&format!(
            "Running {} splits on {worker_count} workers",
            readers.len()
        ));
        logger.metric("workers", worker_count as f64);

        let (split_tx, split_rx) = crossbeam_channel::bounded(readers.len().max(1));
        for reader in readers {
            if split_tx.send(reader).is_err() {
                break;
            }
        }
        drop(split_tx);

        let stop = StopSignal::new(config.cancelled.clone());
        let (event_tx, event_rx) = crossbeam_channel::bounded(self.channel_capacity);
        let handles: Vec<_> = (0..worker_count)
            .map(|worker| {
                spawn_worker(
                    worker,
                    split_rx.clone(),
                    event_tx.clone(),
                    distributor.clone(),
                    factory.clone(),
                    stop.clone(),
                )
            })
            .collect();
        drop(event_tx);

        let (groups, counters) = run_shuffle(event_rx, logger, config.total_records);

        join_workers(handles)?;
        if config.cancelled.load(Ordering::Relaxed) {
            return Err(JobError::Cancelled);
        }

        let reduce_start = Instant::now();
        let results = reduce(groups);
        logger.timing("reduce", reduce_start.elapsed().as_secs_f64() * 1000.0);

        Ok(JobReport { results, counters })
    }
}

fn spawn_worker(
    worker: usize,
    split_rx: Receiver<Box<dyn RecordReader>>,
    event_tx: Sender<WorkerEvent>,
    distributor: Arc<dyn ModelDistributor>,
    factory: Arc<dyn DetectorFactory>,
    stop: StopSignal,
) -> JoinHandle<Result<(), JobError>> {
    std::thread::spawn(move || {
        let result = run_worker(
            worker,
            &split_rx,
            &event_tx,
            distributor.as_ref(),
            factory.as_ref(),
            &stop,
        );
        if let Err(e) = &result {
            log::error!("Worker {worker} stopped: {e}");
            stop.abort();
        }
        result
    })
}

fn run_worker(
    worker: usize,
    split_rx: &Receiver<Box<dyn RecordReader>>,
    event_tx: &Sender<WorkerEvent>,
    distributor: &dyn ModelDistributor,
    factory: &dyn DetectorFactory,
    stop: &StopSignal,
) -> Result<(), JobError> {
    let processor = RecordProcessor::setup(distributor, factory)
        .map_err(|source| JobError::WorkerSetup { worker, source })?;

    for mut reader in split_rx.iter() {
        if stop.is_set() {
            reader.close();
            break;
        }
        let output = map_split(&processor, reader.as_mut(), event_tx, stop);
        reader.close();

        let Some(output) = output? else {
            break;
        };
        let committed = WorkerEvent::Committed {
            partials: output.partials,
            counters: output.counters,
        };
        if event_tx.send(committed).is_err() {
            break;
        }
    }
    Ok(())
}

/// Maps every record of one split. Returns `None` if the job was stopped
/// before the split finished.
fn map_split(
    processor: &RecordProcessor,
    reader: &mut dyn RecordReader,
    event_tx: &Sender<WorkerEvent>,
    stop: &StopSignal,
) -> Result<Option<SplitOutput>, JobError> {
    let split = reader.name().to_string();
    let mut output = SplitOutput {
        partials: Vec::new(),
        counters: JobCounters::default(),
    };

    for item in reader.records() {
        if stop.is_set() {
            return Ok(None);
        }
        let start = Instant::now();
        let record = item.map_err(|source| JobError::Read {
            split: split.clone(),
            source,
        })?;
        let outcome = processor
            .process(record.as_ref())
            .map_err(|source| JobError::Detection {
                split: split.clone(),
                source,
            })?;

        output.counters.record(&outcome);
        if let RecordOutcome::Emitted(partial) = outcome {
            output.partials.push(partial);
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        if event_tx.send(WorkerEvent::Record { elapsed_ms }).is_err() {
            return Ok(None);
        }
    }

    log::debug!(
        "{split}: {} partial counts, {}",
        output.partials.len(),
        output.counters
    );
    Ok(Some(output))
}

/// Drains worker events until every worker has hung up, grouping committed
/// values by key.
fn run_shuffle(
    event_rx: Receiver<WorkerEvent>,
    logger: &mut dyn PipelineLogger,
    total_records: usize,
) -> (BTreeMap<u32, Vec<u32>>, JobCounters) {
    let mut groups: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    let mut counters = JobCounters::default();
    let mut records_done = 0usize;

    for event in event_rx {
        match event {
            WorkerEvent::Record { elapsed_ms } => {
                records_done += 1;
                logger.timing("map", elapsed_ms);
                logger.progress(records_done, total_records);
            }
            WorkerEvent::Committed {
                partials,
                counters: split_counters,
            } => {
                counters.merge(&split_counters);
                for partial in partials {
                    groups.entry(partial.key).or_default().push(partial.value);
                }
            }
        }
    }
    (groups, counters)
}

/// Runs the reducer once per key. With no input the face-count key still
/// reduces over an empty group.
fn reduce(mut groups: BTreeMap<u32, Vec<u32>>) -> Vec<(u32, AggregateResult)> {
    groups.entry(FACE_COUNT_KEY).or_default();
    groups
        .into_iter()
        .map(|(key, values)| (key, CountAggregator::aggregate(values)))
        .collect()
}

/// Joins every worker and keeps the first error encountered.
fn join_workers(handles: Vec<JoinHandle<Result<(), JobError>>>) -> Result<(), JobError> {
    fn set_if_none(slot: &mut Option<JobError>, err: JobError) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    let mut first_error = None;
    for (worker, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => set_if_none(&mut first_error, e),
            Err(_) => set_if_none(&mut first_error, JobError::WorkerPanicked(worker)),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
