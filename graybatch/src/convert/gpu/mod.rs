//! wgpu compute backend.
//!
//! The device and compiled pipeline are created once per batch. Everything
//! an image needs (input, output, staging and uniform buffers, bind group)
//! is created per call and released by drop when the call returns, on the
//! error paths included.
//!
//! Per image:
//!   upload → dispatch `rgb_to_gray` → copy to staging → map → narrow
//!
//! Each phase runs inside a validation + out-of-memory error scope, so a
//! failing step surfaces as a `ConvertError` for that image instead of the
//! default wgpu panic.

pub mod device;

use imageproc::image::GrayImage;
use wgpu::util::DeviceExt;

pub use device::{AdapterInfo, GpuContext, WorkgroupSize};

use super::{ConvertError, Converter};
use crate::pixels::PixelBuffer;

// ---------------------------------------------------------------------------
// Kernel params uniform (must match WGSL struct layout exactly)
// ---------------------------------------------------------------------------

/// Layout must match `Params` in `grayscale.wgsl`:
///   offset  0: width    (u32)
///   offset  4: height   (u32)
///   offset  8: channels (u32)
///   offset 12: _pad     (u32)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    width: u32,
    height: u32,
    channels: u32,
    _pad: u32,
}

// ---------------------------------------------------------------------------
// GpuConverter
// ---------------------------------------------------------------------------

pub struct GpuConverter {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
    // last, so the pipeline is dropped before the device
    gpu: GpuContext,
}

impl GpuConverter {
    /// Acquire a device and compile the kernel.
    pub fn new() -> Result<Self, ConvertError> {
        Self::with_context(GpuContext::new()?)
    }

    /// Compile the kernel on an existing context.
    pub fn with_context(gpu: GpuContext) -> Result<Self, ConvertError> {
        // naga rejects override expressions in @workgroup_size, so the
        // dimensions are substituted into the source text
        let shader_src = include_str!("../../shaders/grayscale.wgsl")
            .replace("{{WG_X}}", &gpu.workgroup_size.x.to_string())
            .replace("{{WG_Y}}", &gpu.workgroup_size.y.to_string());

        push_scopes(&gpu.device);

        let shader = gpu
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("grayscale.wgsl"),
                source: wgpu::ShaderSource::Wgsl(shader_src.into()),
            });

        let bgl = gpu
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("grayscale BGL"),
                entries: &[
                    // Binding 0: packed input bytes
                    storage_entry(0, true),
                    // Binding 1: one u32 per output pixel
                    storage_entry(1, false),
                    // Binding 2: Params
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = gpu
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("grayscale pipeline layout"),
                bind_group_layouts: &[&bgl],
                push_constant_ranges: &[],
            });

        let pipeline = gpu
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("rgb_to_gray"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "rgb_to_gray",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        pop_scopes(&gpu.device, ConvertError::Shader)?;

        Ok(GpuConverter { pipeline, bgl, gpu })
    }

    fn check_limits(
        &self,
        pixels: &PixelBuffer,
        input_size: u64,
        output_size: u64,
    ) -> Result<(), ConvertError> {
        let limits = &self.gpu.limits;
        let max_binding =
            (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);

        for (what, size) in [("input buffer", input_size), ("output buffer", output_size)] {
            if size > max_binding {
                return Err(ConvertError::TooLarge {
                    what,
                    actual: size,
                    limit: max_binding,
                });
            }
        }

        let (gx, gy) = self
            .gpu
            .workgroup_size
            .groups_for(pixels.width(), pixels.height());
        let max_groups = limits.max_compute_workgroups_per_dimension as u64;
        for (what, groups) in [("workgroups along x", gx), ("workgroups along y", gy)] {
            if groups as u64 > max_groups {
                return Err(ConvertError::TooLarge {
                    what,
                    actual: groups as u64,
                    limit: max_groups,
                });
            }
        }

        Ok(())
    }
}

impl Converter for GpuConverter {
    fn name(&self) -> &str {
        &self.gpu.adapter_info.name
    }

    fn convert(&self, pixels: &PixelBuffer) -> Result<GrayImage, ConvertError> {
        let (width, height) = pixels.dimensions();
        let device = &self.gpu.device;

        let input_words = pack_words(pixels.as_bytes());
        let input_size = (input_words.len() * 4) as u64;
        let output_size = pixels.len_pixels() as u64 * 4;
        self.check_limits(pixels, input_size, output_size)?;

        // --- Buffers ---
        push_scopes(device);

        let input_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grayscale::input"),
            contents: bytemuck::cast_slice(&input_words),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let output_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grayscale::output"),
            size: output_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grayscale::staging"),
            size: output_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params = Params {
            width,
            height,
            channels: pixels.channels() as u32,
            _pad: 0,
        };
        let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grayscale::params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grayscale bind group"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buf.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buf.as_entire_binding(),
                },
            ],
        });

        pop_scopes(device, ConvertError::Buffer)?;

        // --- Dispatch ---
        push_scopes(device);

        let (gx, gy) = self.gpu.workgroup_size.groups_for(width, height);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grayscale::convert"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("rgb_to_gray"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(gx, gy, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buf, 0, &staging_buf, 0, output_size);
        self.gpu.queue.submit(std::iter::once(encoder.finish()));

        pop_scopes(device, ConvertError::Dispatch)?;

        // --- Readback ---
        let buf_slice = staging_buf.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buf_slice.map_async(wgpu::MapMode::Read, move |r| {
            // receiver only goes away if convert already returned
            let _ = tx.send(r);
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| ConvertError::Readback("map callback never fired".into()))?
            .map_err(|e| ConvertError::Readback(e.to_string()))?;

        let out = {
            let mapped = buf_slice.get_mapped_range();
            unpack_luma(&mapped)
        };
        staging_buf.unmap();

        log::trace!("GPU converted {width}x{height} ({gx}x{gy} workgroups)");

        GrayImage::from_raw(width, height, out)
            .ok_or_else(|| ConvertError::Readback("output buffer size mismatch".into()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Scopes are a stack: out-of-memory below, validation on top.
fn push_scopes(device: &wgpu::Device) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
}

fn pop_scopes(device: &wgpu::Device, wrap: fn(String) -> ConvertError) -> Result<(), ConvertError> {
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match validation.or(oom) {
        Some(e) => Err(wrap(e.to_string())),
        None => Ok(()),
    }
}

/// Pack bytes four to a word in memory order, zero padding the tail.
fn pack_words(bytes: &[u8]) -> Vec<u32> {
    let mut words = vec![0u32; bytes.len().div_ceil(4)];
    bytemuck::cast_slice_mut::<u32, u8>(&mut words)[..bytes.len()].copy_from_slice(bytes);
    words
}

/// The kernel writes one little-endian u32 per pixel with the value in 0..=255.
fn unpack_luma(mapped: &[u8]) -> Vec<u8> {
    mapped
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]).min(255) as u8)
        .collect()
}
