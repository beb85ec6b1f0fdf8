use std::fs;
use std::path::{Path, PathBuf};

use crate::output::domain::result_sink::{ResultSink, SinkError};
use crate::pipeline::count_aggregator::AggregateResult;
use crate::shared::constants::{OUTPUT_PART_FILE, SUCCESS_MARKER};

/// Writes tab-separated result rows into `<dir>/part-r-00000` and marks the
/// directory complete with an empty `_SUCCESS` file.
///
/// The directory must not exist beforehand, so a finished job's output is
/// never overwritten.
pub struct TextOutputWriter {
    dir: PathBuf,
    rows: Vec<String>,
}

impl TextOutputWriter {
    pub fn create(dir: &Path) -> Result<Self, SinkError> {
        if dir.exists() {
            return Err(SinkError::OutputExists(dir.to_path_buf()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            rows: Vec::new(),
        })
    }

    pub fn part_file(&self) -> PathBuf {
        self.dir.join(OUTPUT_PART_FILE)
    }
}

impl ResultSink for TextOutputWriter {
    fn write(&mut self, result: &AggregateResult) -> Result<(), SinkError> {
        let (images, summary) = result.output_row();
        self.rows.push(format!("{images}\t{summary}\n"));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SinkError> {
        let write_error = |path: &Path, e: std::io::Error| SinkError::Write {
            path: path.to_path_buf(),
            source: e,
        };
        fs::create_dir_all(&self.dir).map_err(|e| write_error(&self.dir, e))?;

        let part = self.part_file();
        fs::write(&part, self.rows.concat()).map_err(|e| write_error(&part, e))?;

        let marker = self.dir.join(SUCCESS_MARKER);
        fs::write(&marker, b"").map_err(|e| write_error(&marker, e))?;

        log::debug!("Committed {} rows to {}", self.rows.len(), part.display());
        Ok(())
    }
}
