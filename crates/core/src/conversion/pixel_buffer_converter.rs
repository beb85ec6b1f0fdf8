use thiserror::Error;

use crate::shared::image_record::ImageRecord;
use crate::shared::pixel_buffer::{PixelBuffer, RGB_CHANNELS};

/// A record whose declared shape disagrees with its sample buffer.
///
/// Recoverable: the map stage counts it and moves on to the next record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedRecord {
    #[error("expected {expected} samples for {width}x{height}x{channels}, found {actual}")]
    LengthMismatch {
        width: u32,
        height: u32,
        channels: u8,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported channel count {0}, expected 3")]
    UnsupportedChannels(u8),
    #[error("dimensions {width}x{height} overflow the addressable sample count")]
    DimensionOverflow { width: u32, height: u32 },
}

/// Converts float samples to interleaved 8-bit RGB in raster order.
///
/// Pure: the same record always yields a byte-identical buffer. Channel
/// order is kept as stored; no resizing or colour correction is applied.
pub fn convert(record: &ImageRecord) -> Result<PixelBuffer, MalformedRecord> {
    if record.channels() as usize != RGB_CHANNELS {
        return Err(MalformedRecord::UnsupportedChannels(record.channels()));
    }
    let expected = record
        .expected_len()
        .ok_or(MalformedRecord::DimensionOverflow {
            width: record.width(),
            height: record.height(),
        })?;
    let samples = record.samples();
    if samples.len() != expected {
        return Err(MalformedRecord::LengthMismatch {
            width: record.width(),
            height: record.height(),
            channels: record.channels(),
            expected,
            actual: samples.len(),
        });
    }

    let width = record.width() as usize;
    let height = record.height() as usize;
    let mut pixels = Vec::with_capacity(expected);

    for row in 0..height {
        for col in 0..width {
            let base = (row * width + col) * RGB_CHANNELS;
            for channel in 0..RGB_CHANNELS {
                pixels.push(sample_to_byte(samples[base + channel]));
            }
        }
    }

    Ok(PixelBuffer::new(pixels, record.width(), record.height()))
}

/// `round(clamp(sample * 255, 0, 255))`, computed in `f64`. NaN maps to 0.
pub fn sample_to_byte(sample: f32) -> u8 {
    let scaled = f64::from(sample) * 255.0;
    scaled.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn gradient_record(width: u32, height: u32) -> ImageRecord {
        let len = (width * height * 3) as usize;
        let samples = (0..len).map(|i| i as f32 / len as f32).collect();
        ImageRecord::new(width, height, 3, samples)
    }

    #[rstest]
    #[case(0.0, 0)]
    #[case(1.0, 255)]
    #[case(0.2, 51)]
    #[case(0.5, 128)]
    #[case(-0.25, 0)]
    #[case(1.75, 255)]
    #[case(f32::NAN, 0)]
    #[case(f32::INFINITY, 255)]
    fn test_sample_to_byte(#[case] sample: f32, #[case] expected: u8) {
        assert_eq!(sample_to_byte(sample), expected);
    }

    #[test]
    fn test_output_dimensions_match_input() {
        let buffer = convert(&gradient_record(5, 4)).unwrap();
        assert_eq!(buffer.width(), 5);
        assert_eq!(buffer.height(), 4);
        assert_eq!(buffer.stride_bytes(), 15);
        assert_eq!(buffer.pixels().len(), 60);
    }

    #[test]
    fn test_every_byte_matches_its_sample() {
        let record = gradient_record(7, 3);
        let buffer = convert(&record).unwrap();
        for (sample, byte) in record.samples().iter().zip(buffer.pixels()) {
            let expected = (f64::from(*sample) * 255.0).round().clamp(0.0, 255.0) as u8;
            assert_eq!(*byte, expected);
        }
    }

    #[test]
    fn test_raster_order_and_channel_order_preserved() {
        // 2x2: top-left red, top-right green, bottom-left blue, bottom-right white
        let samples = vec![
            1.0, 0.0, 0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, 1.0, 1.0, 1.0,
        ];
        let buffer = convert(&ImageRecord::new(2, 2, 3, samples)).unwrap();
        let arr = buffer.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 255);
        assert_eq!(arr[[0, 1, 1]], 255);
        assert_eq!(arr[[1, 0, 2]], 255);
        assert_eq!(buffer.row(1), &[0, 0, 255, 255, 255, 255]);
    }

    #[test]
    fn test_conversion_is_deterministic() {
        let record = gradient_record(16, 9);
        assert_eq!(convert(&record).unwrap(), convert(&record).unwrap());
    }

    #[test]
    fn test_truncated_buffer_is_malformed() {
        let mut samples = vec![0.5; 4 * 3 * 3];
        samples.pop();
        let result = convert(&ImageRecord::new(4, 3, 3, samples));
        assert_eq!(
            result,
            Err(MalformedRecord::LengthMismatch {
                width: 4,
                height: 3,
                channels: 3,
                expected: 36,
                actual: 35,
            })
        );
    }

    #[test]
    fn test_oversized_buffer_is_malformed() {
        let result = convert(&ImageRecord::new(2, 2, 3, vec![0.0; 13]));
        assert!(matches!(result, Err(MalformedRecord::LengthMismatch { .. })));
    }

    #[rstest]
    #[case(1)]
    #[case(4)]
    fn test_non_rgb_channel_count_is_malformed(#[case] channels: u8) {
        let samples = vec![0.0; 2 * 2 * channels as usize];
        let result = convert(&ImageRecord::new(2, 2, channels, samples));
        assert_eq!(result, Err(MalformedRecord::UnsupportedChannels(channels)));
    }
}
