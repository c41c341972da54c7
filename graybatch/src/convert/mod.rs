//! Grayscale conversion backends.
//!
//! A [`Converter`] turns one decoded [`PixelBuffer`] into a single channel
//! image of the same dimensions. Two implementations exist: a wgpu compute
//! kernel and a rayon CPU loop. Both share [`crate::luminance::luma_u8`].

pub mod cpu;
pub mod gpu;

use imageproc::image::GrayImage;
use thiserror::Error;

use crate::pixels::PixelBuffer;

pub use cpu::CpuConverter;
pub use gpu::GpuConverter;

/// Which converter to build for a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GPU when an adapter can be acquired, CPU otherwise.
    #[default]
    Auto,
    Gpu,
    Cpu,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Auto => "auto",
            Backend::Gpu => "gpu",
            Backend::Cpu => "cpu",
        }
    }

    /// Build the converter for this backend.
    ///
    /// Only `Gpu` can fail; `Auto` degrades to the CPU path with a warning.
    pub fn converter(self) -> Result<Box<dyn Converter>, ConvertError> {
        match self {
            Backend::Cpu => Ok(Box::new(CpuConverter::new())),
            Backend::Gpu => Ok(Box::new(GpuConverter::new()?)),
            Backend::Auto => match GpuConverter::new() {
                Ok(gpu) => Ok(Box::new(gpu)),
                Err(e) => {
                    log::warn!("GPU unavailable ({e}), falling back to CPU");
                    Ok(Box::new(CpuConverter::new()))
                }
            },
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Converter {
    /// Short human readable name, e.g. the adapter in use.
    fn name(&self) -> &str;

    fn convert(&self, pixels: &PixelBuffer) -> Result<GrayImage, ConvertError>;
}

/// Every failure aborts the current image only.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("no GPU adapter found")]
    NoAdapter,

    #[error("device request failed: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    #[error("kernel compilation failed: {0}")]
    Shader(String),

    #[error("buffer allocation failed: {0}")]
    Buffer(String),

    #[error("kernel execution failed: {0}")]
    Dispatch(String),

    #[error("reading output buffer failed: {0}")]
    Readback(String),

    #[error("image too large for device: {what} is {actual}, limit {limit}")]
    TooLarge {
        what: &'static str,
        actual: u64,
        limit: u64,
    },

    /// The converter itself could not be built; carried for every image.
    #[error("converter unavailable: {0}")]
    Unavailable(String),
}
