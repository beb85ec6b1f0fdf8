use std::fs;
use std::path::Path;

use crate::input::domain::input_split::InputSplit;
use crate::input::domain::record_reader::{ReadError, RecordReader, RecordResult};
use crate::shared::image_record::ImageRecord;

/// Decodes the image files of one split into float RGB records.
///
/// Mirrors a container reader's contract: a file that cannot be read is an
/// upstream I/O error, while a file that reads but does not decode becomes an
/// absent record.
pub struct ImageFileReader {
    split: InputSplit,
    name: String,
    closed: bool,
}

impl ImageFileReader {
    pub fn new(split: InputSplit) -> Self {
        let name = split.name();
        Self {
            split,
            name,
            closed: false,
        }
    }
}

impl RecordReader for ImageFileReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn records(&mut self) -> Box<dyn Iterator<Item = RecordResult> + '_> {
        if self.closed {
            return Box::new(std::iter::empty());
        }
        Box::new(self.split.paths().iter().map(|path| read_record(path)))
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

fn read_record(path: &Path) -> RecordResult {
    let bytes = fs::read(path).map_err(|e| ReadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let decoded = match image::load_from_memory(&bytes) {
        Ok(img) => img,
        Err(e) => {
            log::warn!("Skipping undecodable image {}: {e}", path.display());
            return Ok(None);
        }
    };

    let rgb = decoded.to_rgb32f();
    let (width, height) = rgb.dimensions();
    Ok(Some(
        ImageRecord::new(width, height, 3, rgb.into_raw()).with_source(path.display().to_string()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([51, 102, 255]);
        }
        img.save(&path).unwrap();
        path
    }

    fn reader_for(paths: Vec<PathBuf>) -> ImageFileReader {
        ImageFileReader::new(InputSplit::new(3, paths))
    }

    #[test]
    fn test_name_comes_from_split() {
        assert_eq!(reader_for(Vec::new()).name(), "split-00003");
    }

    #[test]
    fn test_decodes_rgb_float_record() {
        let tmp = TempDir::new().unwrap();
        let path = write_test_image(tmp.path(), "a.png", 8, 6);
        let mut reader = reader_for(vec![path.clone()]);

        let record = reader.records().next().unwrap().unwrap().unwrap();
        assert_eq!(record.width(), 8);
        assert_eq!(record.height(), 6);
        assert_eq!(record.channels(), 3);
        assert_eq!(record.samples().len(), 8 * 6 * 3);
        assert_relative_eq!(record.samples()[0], 0.2, epsilon = 1e-6);
        assert_relative_eq!(record.samples()[1], 0.4, epsilon = 1e-6);
        assert_relative_eq!(record.samples()[2], 1.0, epsilon = 1e-6);
        assert_eq!(record.source(), Some(path.display().to_string().as_str()));
    }

    #[test]
    fn test_undecodable_file_is_absent_record() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        fs::write(&path, b"not an image").unwrap();
        let mut reader = reader_for(vec![path]);

        let item = reader.records().next().unwrap();
        assert!(matches!(item, Ok(None)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut reader = reader_for(vec![PathBuf::from("/nonexistent/a.png")]);
        let item = reader.records().next().unwrap();
        assert!(matches!(item, Err(ReadError::Io { .. })));
    }

    #[test]
    fn test_yields_one_item_per_file_in_order() {
        let tmp = TempDir::new().unwrap();
        let a = write_test_image(tmp.path(), "a.png", 4, 4);
        let b = write_test_image(tmp.path(), "b.png", 5, 3);
        let mut reader = reader_for(vec![a, b]);

        let widths: Vec<_> = reader
            .records()
            .map(|r| r.unwrap().unwrap().width())
            .collect();
        assert_eq!(widths, vec![4, 5]);
    }

    #[test]
    fn test_closed_reader_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let path = write_test_image(tmp.path(), "a.png", 4, 4);
        let mut reader = reader_for(vec![path]);
        reader.close();
        reader.close();
        assert_eq!(reader.records().count(), 0);
    }
}
