//! Image decode and encode at the edges of the conversion pipeline

pub mod decode;
pub mod encode;

pub use encode::{compress_to_jpeg, compress_to_png, compress_to_webp, PngCompression};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum ImageFormat {
    Jpeg { quality: u8 },
    Png { compression: PngCompression },
    WebP { quality: u8 },
}

impl Default for ImageFormat {
    fn default() -> Self {
        ImageFormat::Png {
            compression: PngCompression::Default,
        }
    }
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg { .. } => "jpg",
            ImageFormat::Png { .. } => "png",
            ImageFormat::WebP { .. } => "webp",
        }
    }
}
