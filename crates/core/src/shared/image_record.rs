/// A decoded image as handed over by the container reader: interleaved
/// float samples in raster order, nominally in `[0.0, 1.0]`.
///
/// No invariant is enforced on construction. A record whose sample buffer
/// disagrees with its declared dimensions is a legitimate input that the
/// converter rejects as malformed.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<f32>,
    source: Option<String>,
}

impl ImageRecord {
    pub fn new(width: u32, height: u32, channels: u8, samples: Vec<f32>) -> Self {
        Self {
            width,
            height,
            channels,
            samples,
            source: None,
        }
    }

    /// Attaches a label (usually the file the record was decoded from) for log lines.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Sample count implied by the declared dimensions, `None` on overflow.
    pub fn expected_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.channels as usize)
    }

    /// Too small for detection: a single row or column.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 1 || self.height <= 1
    }
}
