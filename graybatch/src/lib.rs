pub mod batch;
pub mod config;
pub mod convert;
pub mod image;
pub mod luminance;
pub mod pixels;

// Re-export commonly used types
pub use batch::{BatchReport, FileOutcome, FileReport};
pub use config::{BatchConfig, OutputNaming};
pub use convert::{Backend, ConvertError, Converter};
pub use image::{ImageFormat, PngCompression};
pub use pixels::PixelBuffer;
