//! Decoded, channel-interleaved 8-bit pixel data.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelError {
    #[error("unsupported channel count {0} (expected 1 to 4)")]
    Channels(u8),

    #[error("image has zero area ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    Size { expected: usize, actual: usize },
}

/// Row-major, unpadded, channel-interleaved pixels as they come out of the
/// decoder.
///
/// 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Result<Self, PixelError> {
        if !(1..=4).contains(&channels) {
            return Err(PixelError::Channels(channels));
        }
        if width == 0 || height == 0 {
            return Err(PixelError::Empty { width, height });
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(PixelError::Size {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// True when the first channel is already luminance.
    pub fn is_gray(&self) -> bool {
        self.channels < 3
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Bytes of one input row.
    pub fn row_stride(&self) -> usize {
        self.width as usize * self.channels as usize
    }

    /// Channel values of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * c;
        &self.data[idx..idx + c]
    }
}
