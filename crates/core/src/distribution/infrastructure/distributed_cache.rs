use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::distribution::domain::model_distributor::{
    ensure_readable, ModelDistributor, ModelUnavailable,
};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to copy {from} into the cache: {source}")]
    Copy {
        from: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("invalid cache file URI '{0}'")]
    InvalidUri(String),
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// One file registered with the cache: where it comes from and the name it
/// is linked under in every worker's cache directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheFile {
    pub uri: String,
    pub link: String,
}

impl CacheFile {
    /// Parses `<uri>[#<link>]`. Without a fragment the link is the last path
    /// segment of the URI.
    pub fn parse(entry: &str) -> Result<Self, CacheError> {
        let invalid = || CacheError::InvalidUri(entry.to_string());
        let (uri, link) = match entry.rsplit_once('#') {
            Some((uri, link)) => (uri, link.to_string()),
            None => {
                let segment = entry.rsplit('/').next().unwrap_or("");
                (entry, segment.to_string())
            }
        };
        if uri.is_empty() || link.is_empty() || link == "." || link == ".." {
            return Err(invalid());
        }
        if link.contains('/') || link.contains('\\') {
            return Err(invalid());
        }
        Ok(Self {
            uri: uri.to_string(),
            link,
        })
    }

    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }

    fn local_source(&self) -> &Path {
        Path::new(self.uri.strip_prefix("file://").unwrap_or(&self.uri))
    }
}

/// Single-machine stand-in for a distributed cache.
///
/// Registered files are staged once per job into `root/<link>`; workers then
/// resolve the model by link name. Local sources are copied on every job.
/// `http(s)` sources are downloaded, and a `<link>.uri` file next to the
/// download records which URI it came from. A download is reused only while
/// that record matches the registered URI.
pub struct DistributedCache {
    root: PathBuf,
    files: Vec<CacheFile>,
    progress: Option<ProgressFn>,
}

impl DistributedCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: Vec::new(),
            progress: None,
        }
    }

    pub fn with_default_root() -> Result<Self, CacheError> {
        Ok(Self::new(default_root()?))
    }

    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn add_cache_file(&mut self, entry: &str) -> Result<&CacheFile, CacheError> {
        let file = CacheFile::parse(entry)?;
        log::debug!("Registered cache file {} as {}", file.uri, file.link);
        self.files.push(file);
        Ok(&self.files[self.files.len() - 1])
    }

    pub fn local_path(&self, file: &CacheFile) -> PathBuf {
        self.root.join(&file.link)
    }

    fn origin_path(&self, file: &CacheFile) -> PathBuf {
        self.root.join(format!("{}.uri", file.link))
    }

    fn is_cached_download(&self, file: &CacheFile) -> bool {
        self.local_path(file).exists()
            && fs::read_to_string(self.origin_path(file)).is_ok_and(|uri| uri == file.uri)
    }

    /// Stages every registered file into the cache directory.
    pub fn localize(&self) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).map_err(|e| CacheError::CacheDir {
            path: self.root.clone(),
            source: e,
        })?;

        for file in &self.files {
            let dest = self.local_path(file);
            let origin = self.origin_path(file);
            let write_error = |e: std::io::Error| CacheError::Write {
                path: origin.clone(),
                source: e,
            };

            if !file.is_remote() {
                log::info!("Staging {} into {}", file.uri, dest.display());
                copy_into(file.local_source(), &dest)?;
                if origin.exists() {
                    fs::remove_file(&origin).map_err(write_error)?;
                }
            } else if self.is_cached_download(file) {
                log::debug!("Cache hit for {} at {}", file.uri, dest.display());
            } else {
                log::info!("Downloading {} into {}", file.uri, dest.display());
                download(&file.uri, &dest, self.progress.as_ref())?;
                fs::write(&origin, &file.uri).map_err(write_error)?;
            }
        }
        Ok(())
    }
}

impl ModelDistributor for DistributedCache {
    fn distribute(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.localize()?;
        Ok(())
    }

    fn resolve(&self) -> Result<PathBuf, ModelUnavailable> {
        let file = self.files.first().ok_or(ModelUnavailable::NotRegistered)?;
        let path = self.local_path(file);
        ensure_readable(&path)?;
        Ok(path)
    }
}

/// Platform cache directory for staged models.
///
/// - Linux: `$XDG_CACHE_HOME/facecount/cache/` or `~/.cache/facecount/cache/`
/// - macOS: `~/Library/Caches/facecount/cache/`
/// - Windows: `%LOCALAPPDATA%/facecount/cache/`
pub fn default_root() -> Result<PathBuf, CacheError> {
    dirs::cache_dir()
        .map(|d| d.join("facecount").join("cache"))
        .ok_or(CacheError::NoCacheDir)
}

fn copy_into(source: &Path, dest: &Path) -> Result<(), CacheError> {
    let temp_path = dest.with_extension("part");
    fs::copy(source, &temp_path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        CacheError::Copy {
            from: source.to_path_buf(),
            source: e,
        }
    })?;
    fs::rename(&temp_path, dest).map_err(|e| CacheError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

fn download(url: &str, dest: &Path, progress: Option<&ProgressFn>) -> Result<(), CacheError> {
    let download_error = |e: reqwest::Error| CacheError::Download {
        url: url.to_string(),
        source: e,
    };
    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_error)?;

    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(download_error)?;

    // Write to a temp file first, then rename so workers never see a partial model
    let temp_path = dest.with_extension("part");
    let write_error = |e: std::io::Error| CacheError::Write {
        path: temp_path.clone(),
        source: e,
    };
    let mut file = fs::File::create(&temp_path).map_err(write_error)?;

    let mut downloaded: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        file.write_all(chunk).map_err(write_error)?;
        downloaded += chunk.len() as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_error)?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(|e| CacheError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
