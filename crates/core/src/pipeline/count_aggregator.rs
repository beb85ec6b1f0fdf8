use crate::shared::constants::RESULT_LABEL;

/// Final job artifact: how many images were counted and how many faces
/// they held in total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AggregateResult {
    pub images_processed: u64,
    pub total_faces: u64,
}

impl AggregateResult {
    /// Combines two partial aggregates. Commutative and associative, so
    /// partial sums can be merged in any grouping.
    pub fn merge(self, other: AggregateResult) -> AggregateResult {
        AggregateResult {
            images_processed: self.images_processed + other.images_processed,
            total_faces: self.total_faces + other.total_faces,
        }
    }

    /// The output record: `(images_processed, "Total face detected: N")`.
    pub fn output_row(&self) -> (u64, String) {
        (
            self.images_processed,
            format!("{RESULT_LABEL}: {}", self.total_faces),
        )
    }
}

/// Reduce stage: a single-pass fold over the face counts of one key group.
#[derive(Debug, Default)]
pub struct CountAggregator {
    acc: AggregateResult,
}

impl CountAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, face_count: u32) {
        self.acc.images_processed += 1;
        self.acc.total_faces += u64::from(face_count);
    }

    pub fn finish(self) -> AggregateResult {
        self.acc
    }

    /// Consumes `values` exactly once.
    pub fn aggregate<I>(values: I) -> AggregateResult
    where
        I: IntoIterator<Item = u32>,
    {
        let mut aggregator = Self::new();
        for value in values {
            aggregator.push(value);
        }
        aggregator.finish()
    }
}
