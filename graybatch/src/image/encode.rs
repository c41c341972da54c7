//! Image encoding: JPEG, PNG, WebP

use anyhow::{Context, Result};
use imageproc::image::{DynamicImage, ExtendedColorType, GrayImage};
use webp::WebPMemory;

use std::path::Path;

use super::ImageFormat;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum PngCompression {
    Fast,
    Default,
    Best,
}

/// Compress a grayscale image to JPEG format with the specified quality
pub fn compress_to_jpeg<W>(img: &GrayImage, writer: &mut W, quality: u8) -> Result<()>
where
    W: std::io::Write,
{
    let mut encoder =
        imageproc::image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality);

    encoder
        .encode_image(img)
        .with_context(|| "Failed to compress image to JPEG")?;

    Ok(())
}

/// Compress a grayscale image to PNG format with the specified compression level
pub fn compress_to_png<W>(img: &GrayImage, writer: &mut W, compression: PngCompression) -> Result<()>
where
    W: std::io::Write,
{
    use imageproc::image::codecs::png::{CompressionType, FilterType, PngEncoder};
    use imageproc::image::ImageEncoder;

    let compression_type = match compression {
        PngCompression::Fast => CompressionType::Fast,
        PngCompression::Default => CompressionType::Default,
        PngCompression::Best => CompressionType::Best,
    };

    // single channel output compresses best unfiltered
    let encoder = PngEncoder::new_with_quality(writer, compression_type, FilterType::NoFilter);

    encoder
        .write_image(img.as_raw(), img.width(), img.height(), ExtendedColorType::L8)
        .with_context(|| "Failed to compress image to PNG")?;

    Ok(())
}

/// Compress a grayscale image to WebP format with the specified quality
///
/// libwebp has no luma-only mode, so the gray value is replicated to RGB.
pub fn compress_to_webp(img: &GrayImage, quality: u8) -> Result<WebPMemory> {
    let img = DynamicImage::from(DynamicImage::ImageLuma8(img.clone()).to_rgb8());
    let encoder = webp::Encoder::from_image(&img)
        .map_err(|e| anyhow::anyhow!("Failed to create WebP encoder: {}", e))?;
    let webp_data = encoder.encode(quality as f32);
    Ok(webp_data)
}

/// Encode into an in-memory buffer
pub fn encode(img: &GrayImage, format: ImageFormat) -> Result<Vec<u8>> {
    let (width, height) = img.dimensions();
    let mut buffer = Vec::with_capacity((width * height) as usize);

    match format {
        ImageFormat::Jpeg { quality } => compress_to_jpeg(img, &mut buffer, quality)?,
        ImageFormat::Png { compression } => compress_to_png(img, &mut buffer, compression)?,
        ImageFormat::WebP { quality } => {
            let webp_data = compress_to_webp(img, quality)?;
            buffer.extend_from_slice(&webp_data);
        }
    }

    Ok(buffer)
}

/// Encode and write to `path`, replacing any existing file
pub fn save(img: &GrayImage, path: &Path, format: ImageFormat) -> Result<()> {
    let bytes = encode(img, format)?;
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    log::trace!("Encoded image: {}", path.display());
    Ok(())
}
