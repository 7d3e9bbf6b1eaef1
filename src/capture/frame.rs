//! Frame type representing a sampled video image with metadata.

use image::codecs::jpeg::JpegEncoder;
use image::error::{ParameterError, ParameterErrorKind};
use image::{ColorType, ImageError, ImageResult};
use std::io::Cursor;
use std::time::Instant;

/// Pixel layout of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One luma byte per pixel.
    Gray8,
    /// Three bytes per pixel, red first.
    Rgb8,
}

impl PixelFormat {
    /// Bytes used by a single pixel.
    #[inline]
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 => 3,
        }
    }

    fn color_type(self) -> ColorType {
        match self {
            PixelFormat::Gray8 => ColorType::L8,
            PixelFormat::Rgb8 => ColorType::Rgb8,
        }
    }
}

/// A single frame sampled from a live video stream.
#[derive(Clone)]
pub struct Frame {
    /// Raw pixel data laid out per `format`.
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    /// Sampling time.
    timestamp: Instant,
    /// Monotonic sequence number within the stream.
    sequence: u64,
}

impl Frame {
    /// Creates a frame from raw pixels.
    pub fn new(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Self {
        Self {
            pixels,
            width,
            height,
            format,
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Creates a grayscale frame.
    pub fn gray(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::new(pixels, width, height, PixelFormat::Gray8, sequence)
    }

    /// Creates an RGB frame.
    pub fn rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self::new(pixels, width, height, PixelFormat::Rgb8, sequence)
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Validates that the pixel buffer size matches dimensions and format.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.pixel_count() * self.format.bytes_per_pixel()
    }

    /// Luma value at `(x, y)`. RGB pixels use the Rec. 601 weights.
    pub fn luma_at(&self, x: usize, y: usize) -> u8 {
        let idx = y * self.width as usize + x;
        match self.format {
            PixelFormat::Gray8 => self.pixels[idx],
            PixelFormat::Rgb8 => {
                let p = &self.pixels[idx * 3..idx * 3 + 3];
                ((p[0] as u32 * 299 + p[1] as u32 * 587 + p[2] as u32 * 114) / 1000) as u8
            }
        }
    }

    /// Encodes the frame as a baseline JPEG still.
    pub fn encode_jpeg(&self, quality: u8) -> ImageResult<Vec<u8>> {
        if !self.is_valid() {
            return Err(ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            )));
        }
        let mut out = Cursor::new(Vec::new());
        let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode(
            &self.pixels,
            self.width,
            self.height,
            self.format.color_type().into(),
        )?;
        Ok(out.into_inner())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::gray(vec![0u8; 64 * 48], 64, 48, 1);

        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.sequence(), 1);
        assert!(frame.is_valid());
    }

    #[test]
    fn test_frame_invalid_size() {
        let frame = Frame::rgb(vec![0u8; 64 * 48], 64, 48, 1);
        assert!(!frame.is_valid());
    }

    #[test]
    fn test_luma_from_rgb() {
        let frame = Frame::rgb(vec![255, 255, 255, 0, 0, 0], 2, 1, 1);
        assert_eq!(frame.luma_at(0, 0), 255);
        assert_eq!(frame.luma_at(1, 0), 0);
    }

    #[test]
    fn test_jpeg_encoding_is_deterministic() {
        let pixels: Vec<u8> = (0..32 * 32).map(|i| (i % 251) as u8).collect();
        let frame = Frame::gray(pixels, 32, 32, 7);

        let first = frame.encode_jpeg(85).unwrap();
        let second = frame.encode_jpeg(85).unwrap();
        assert_eq!(&first[..2], &[0xFF, 0xD8]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_jpeg_encoding_rejects_short_buffer() {
        let frame = Frame::rgb(vec![0u8; 4], 2, 2, 0);
        assert!(matches!(frame.encode_jpeg(85), Err(ImageError::Parameter(_))));
    }
}
