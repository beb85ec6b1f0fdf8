use std::fs;
use std::path::{Path, PathBuf};

use crate::input::domain::input_split::InputSplit;
use crate::input::domain::record_reader::ReadError;
use crate::shared::constants::IMAGE_EXTENSIONS;

/// A collection of image files treated as one sharded container.
///
/// The input path may be a single image or a directory, scanned recursively.
/// Files are sorted so split planning is identical across runs.
#[derive(Debug)]
pub struct ImageBundle {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl ImageBundle {
    pub fn open(path: &Path) -> Result<Self, ReadError> {
        if !path.exists() {
            return Err(ReadError::NotFound(path.to_path_buf()));
        }
        let mut files = Vec::new();
        if path.is_dir() {
            collect_images(path, &mut files)?;
            files.sort();
        } else {
            files.push(path.to_path_buf());
        }
        log::debug!("Bundle {} holds {} images", path.display(), files.len());
        Ok(Self {
            root: path.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Groups the files into splits of at most `split_size` images.
    pub fn splits(&self, split_size: usize) -> Result<Vec<InputSplit>, ReadError> {
        if split_size == 0 {
            return Err(ReadError::InvalidSplitSize);
        }
        Ok(self
            .files
            .chunks(split_size)
            .enumerate()
            .map(|(index, chunk)| InputSplit::new(index, chunk.to_vec()))
            .collect())
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let io_error = |e: std::io::Error| ReadError::Io {
        path: dir.to_path_buf(),
        source: e,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if is_image(&path) {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[rstest]
    #[case("a.jpg", true)]
    #[case("a.JPEG", true)]
    #[case("a.png", true)]
    #[case("a.webp", true)]
    #[case("a.txt", false)]
    #[case("_SUCCESS", false)]
    fn test_is_image(#[case] name: &str, #[case] expected: bool) {
        assert_eq!(is_image(Path::new(name)), expected);
    }

    #[test]
    fn test_open_missing_path_is_not_found() {
        let result = ImageBundle::open(Path::new("/nonexistent/bundle"));
        assert!(matches!(result, Err(ReadError::NotFound(_))));
    }

    #[test]
    fn test_open_single_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("only.png");
        touch(&path);

        let bundle = ImageBundle::open(&path).unwrap();
        assert_eq!(bundle.files(), &[path]);
    }

    #[test]
    fn test_open_directory_recurses_sorts_and_filters() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("shard-1/b.png"));
        touch(&tmp.path().join("shard-0/c.jpg"));
        touch(&tmp.path().join("a.png"));
        touch(&tmp.path().join("notes.txt"));

        let bundle = ImageBundle::open(tmp.path()).unwrap();
        let names: Vec<_> = bundle
            .files()
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.png"),
                PathBuf::from("shard-0/c.jpg"),
                PathBuf::from("shard-1/b.png"),
            ]
        );
    }

    #[test]
    fn test_splits_chunk_files() {
        let tmp = TempDir::new().unwrap();
        for i in 0..5 {
            touch(&tmp.path().join(format!("{i}.png")));
        }
        let bundle = ImageBundle::open(tmp.path()).unwrap();

        let splits = bundle.splits(2).unwrap();
        let sizes: Vec<_> = splits.iter().map(InputSplit::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(splits[2].index(), 2);
    }

    #[test]
    fn test_splits_are_deterministic() {
        let tmp = TempDir::new().unwrap();
        for i in 0..7 {
            touch(&tmp.path().join(format!("img-{i}.png")));
        }
        let first = ImageBundle::open(tmp.path()).unwrap().splits(3).unwrap();
        let second = ImageBundle::open(tmp.path()).unwrap().splits(3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_zero_split_size_rejected() {
        let tmp = TempDir::new().unwrap();
        let bundle = ImageBundle::open(tmp.path()).unwrap();
        assert!(bundle.is_empty());
        assert!(matches!(bundle.splits(0), Err(ReadError::InvalidSplitSize)));
    }
}
