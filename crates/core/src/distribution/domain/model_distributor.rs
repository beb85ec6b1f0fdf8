use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// The model could not be made available to a worker. Fatal for that worker.
#[derive(Error, Debug)]
pub enum ModelUnavailable {
    #[error("no model file registered for distribution")]
    NotRegistered,
    #[error("model {path} is not readable on this worker: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ships the model file to every worker and tells each worker where its
/// local copy lives.
///
/// `distribute` runs once per job before any worker starts; `resolve` runs
/// once per worker during setup.
pub trait ModelDistributor: Send + Sync {
    fn distribute(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Ok(())
    }

    fn resolve(&self) -> Result<PathBuf, ModelUnavailable>;
}

/// A model already present at a fixed path on every worker.
pub struct LocalModel {
    path: PathBuf,
}

impl LocalModel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ModelDistributor for LocalModel {
    fn resolve(&self) -> Result<PathBuf, ModelUnavailable> {
        ensure_readable(&self.path)?;
        Ok(self.path.clone())
    }
}

/// Opens the file to prove it is readable, without reading it.
pub(crate) fn ensure_readable(path: &Path) -> Result<(), ModelUnavailable> {
    File::open(path)
        .map(drop)
        .map_err(|e| ModelUnavailable::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })
}
