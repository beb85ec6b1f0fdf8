use std::path::PathBuf;

/// A contiguous run of image files handled by a single map task.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputSplit {
    index: usize,
    paths: Vec<PathBuf>,
}

impl InputSplit {
    pub fn new(index: usize, paths: Vec<PathBuf>) -> Self {
        Self { index, paths }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn name(&self) -> String {
        format!("split-{:05}", self.index)
    }
}
