//! Image decoding

use anyhow::{Context, Result};
use imageproc::image::{load_from_memory, DynamicImage, GenericImageView};

use std::path::Path;

use crate::pixels::PixelBuffer;

/// Decode image from memory
///
/// The format is sniffed from the content, file extensions are never
/// consulted.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    load_from_memory(data).map_err(Into::into)
}

/// Read and decode a file into interleaved 8-bit pixels.
pub fn open(path: &Path) -> Result<PixelBuffer> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let img = decode(&data).with_context(|| format!("Failed to decode {}", path.display()))?;
    into_pixels(img)
}

/// Keep the native channel count; anything wider than 8 bits per channel
/// is narrowed.
pub fn into_pixels(img: DynamicImage) -> Result<PixelBuffer> {
    let (width, height) = img.dimensions();

    let (channels, data) = match img {
        DynamicImage::ImageLuma8(buf) => (1, buf.into_raw()),
        DynamicImage::ImageLumaA8(buf) => (2, buf.into_raw()),
        DynamicImage::ImageRgb8(buf) => (3, buf.into_raw()),
        DynamicImage::ImageRgba8(buf) => (4, buf.into_raw()),
        other => match other.color().channel_count() {
            1 => (1, other.into_luma8().into_raw()),
            2 => (2, other.into_luma_alpha8().into_raw()),
            3 => (3, other.into_rgb8().into_raw()),
            _ => (4, other.into_rgba8().into_raw()),
        },
    };

    PixelBuffer::new(width, height, channels, data).map_err(Into::into)
}
