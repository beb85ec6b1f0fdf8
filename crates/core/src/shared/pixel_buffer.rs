use ndarray::ArrayView3;

pub const RGB_CHANNELS: usize = 3;

/// Detector-ready image: interleaved 8-bit RGB, rows packed back to back.
///
/// Produced by the converter from an [`ImageRecord`](super::image_record::ImageRecord)
/// and consumed by a single detection call.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    stride_bytes: usize,
}

impl PixelBuffer {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        let stride_bytes = width as usize * RGB_CHANNELS;
        debug_assert_eq!(
            pixels.len(),
            height as usize * stride_bytes,
            "pixel length must equal height * stride_bytes"
        );
        Self {
            pixels,
            width,
            height,
            stride_bytes,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride_bytes(&self) -> usize {
        self.stride_bytes
    }

    pub fn row(&self, row: usize) -> &[u8] {
        let start = row * self.stride_bytes;
        &self.pixels[start..start + self.stride_bytes]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, RGB_CHANNELS),
            &self.pixels,
        )
        .expect("PixelBuffer data length must match dimensions")
    }

    /// Copies the buffer into an `image` RGB image, `None` if the dimensions disagree.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}
