use std::path::PathBuf;

use thiserror::Error;

use crate::shared::image_record::ImageRecord;

/// Upstream I/O failure while reading input. Never retried here.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("input path not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("split size must be at least 1")]
    InvalidSplitSize,
}

/// One item from a reader: `Ok(None)` is a record the container could not
/// decode, which the map stage skips.
pub type RecordResult = Result<Option<ImageRecord>, ReadError>;

/// Reads the image records of one input split.
///
/// Implementations own the decoding details; the pipeline only sees
/// [`ImageRecord`]s.
pub trait RecordReader: Send {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Returns an iterator over the split's records in storage order.
    fn records(&mut self) -> Box<dyn Iterator<Item = RecordResult> + '_>;

    /// Releases any resources held by the reader.
    fn close(&mut self);
}
