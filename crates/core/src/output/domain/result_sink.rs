use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::count_aggregator::AggregateResult;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("output directory {0} already exists")]
    OutputExists(PathBuf),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Destination of the job's final records.
///
/// Rows are buffered by `write`; nothing becomes visible until `commit`.
pub trait ResultSink: Send {
    fn write(&mut self, result: &AggregateResult) -> Result<(), SinkError>;

    fn commit(&mut self) -> Result<(), SinkError>;
}
