use std::fmt;

use crate::pipeline::record_processor::RecordOutcome;

/// Per-job diagnostic counters, kept per worker and merged at the end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JobCounters {
    pub records_read: u64,
    pub records_absent: u64,
    pub records_degenerate: u64,
    pub records_malformed: u64,
    pub images_processed: u64,
    pub faces_detected: u64,
}

impl JobCounters {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        self.records_read += 1;
        match outcome {
            RecordOutcome::Emitted(partial) => {
                self.images_processed += 1;
                self.faces_detected += u64::from(partial.value);
            }
            RecordOutcome::Absent => self.records_absent += 1,
            RecordOutcome::Degenerate { .. } => self.records_degenerate += 1,
            RecordOutcome::Malformed(_) => self.records_malformed += 1,
        }
    }

    pub fn merge(&mut self, other: &JobCounters) {
        self.records_read += other.records_read;
        self.records_absent += other.records_absent;
        self.records_degenerate += other.records_degenerate;
        self.records_malformed += other.records_malformed;
        self.images_processed += other.images_processed;
        self.faces_detected += other.faces_detected;
    }

    pub fn records_skipped(&self) -> u64 {
        self.records_absent + self.records_degenerate + self.records_malformed
    }
}

impl fmt::Display for JobCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "read={} processed={} faces={} skipped={} (absent={} degenerate={} malformed={})",
            self.records_read,
            self.images_processed,
            self.faces_detected,
            self.records_skipped(),
            self.records_absent,
            self.records_degenerate,
            self.records_malformed
        )
    }
}
