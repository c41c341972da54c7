//! wgpu adapter and device acquisition.
//!
//! `request_adapter` power preference heuristics happily pick a software
//! rasterizer over a real card on some setups, so adapters are enumerated
//! explicitly and real hardware is preferred. A software adapter is still
//! accepted as a last resort: the kernel is tiny and correctness does not
//! depend on the device type.

use std::fmt;

use crate::convert::ConvertError;

/// Workgroup dimensions baked into the kernel source.
///
/// 16×8 = 128 invocations: four 32-wide warps or two 64-wide wavefronts,
/// and well under the 256 invocation floor every wgpu adapter guarantees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
    pub y: u32,
}

impl WorkgroupSize {
    pub const DEFAULT: WorkgroupSize = WorkgroupSize { x: 16, y: 8 };

    pub fn total(&self) -> u32 {
        self.x * self.y
    }

    /// Number of workgroups needed to cover `width` × `height` invocations.
    pub fn groups_for(&self, width: u32, height: u32) -> (u32, u32) {
        (width.div_ceil(self.x), height.div_ceil(self.y))
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}×{} ({} invocations)", self.x, self.y, self.total())
    }
}

/// Cached adapter information for logging.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({:?}, {:?})",
            self.name, self.backend, self.device_type
        )
    }
}

impl From<wgpu::AdapterInfo> for AdapterInfo {
    fn from(info: wgpu::AdapterInfo) -> Self {
        AdapterInfo {
            name: info.name,
            device_type: info.device_type,
            backend: info.backend,
        }
    }
}

/// Instance, device and queue for the lifetime of a batch.
///
/// Fields drop top to bottom; `_instance` is last so the instance outlives
/// the device and queue created from it.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub limits: wgpu::Limits,
    pub workgroup_size: WorkgroupSize,
    _instance: wgpu::Instance,
}

impl GpuContext {
    /// Acquire the best available adapter on the primary backends.
    ///
    /// # Errors
    /// `NoAdapter` when nothing is enumerated, `DeviceRequest` when the
    /// driver refuses the device.
    pub fn new() -> Result<Self, ConvertError> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> Result<Self, ConvertError> {
        let flags = if cfg!(debug_assertions) {
            wgpu::InstanceFlags::VALIDATION
        } else {
            wgpu::InstanceFlags::empty()
        };

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags,
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);
        for a in &adapters {
            let info = a.get_info();
            log::debug!(
                "GPU adapter: {} ({:?}, {:?})",
                info.name,
                info.backend,
                info.device_type
            );
        }

        let adapter = select_adapter(adapters).ok_or(ConvertError::NoAdapter)?;
        let adapter_info = AdapterInfo::from(adapter.get_info());

        // default limits are what every WebGPU implementation guarantees;
        // ask for the adapter's real storage buffer ceiling so large images fit
        let adapter_limits = adapter.limits();
        let limits = wgpu::Limits {
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            max_buffer_size: adapter_limits.max_buffer_size,
            ..wgpu::Limits::downlevel_defaults()
        };

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("graybatch"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        // errors are caught with error scopes; anything that escapes them
        // must not take the whole batch down
        device.on_uncaptured_error(Box::new(|e| {
            log::error!("Uncaptured GPU error: {e}");
        }));

        let workgroup_size = WorkgroupSize::DEFAULT;
        log::info!("Using GPU {adapter_info}, workgroup {workgroup_size}");

        Ok(GpuContext {
            device,
            queue,
            adapter_info,
            limits,
            workgroup_size,
            _instance: instance,
        })
    }
}

/// Real hardware first, then anything that was enumerated.
fn select_adapter(adapters: Vec<wgpu::Adapter>) -> Option<wgpu::Adapter> {
    let mut fallback = None;
    for adapter in adapters {
        if is_hardware(adapter.get_info().device_type) {
            return Some(adapter);
        }
        if fallback.is_none() {
            fallback = Some(adapter);
        }
    }
    if let Some(a) = &fallback {
        log::warn!(
            "No hardware GPU found, using software adapter {}",
            a.get_info().name
        );
    }
    fallback
}

fn is_hardware(device_type: wgpu::DeviceType) -> bool {
    matches!(
        device_type,
        wgpu::DeviceType::DiscreteGpu
            | wgpu::DeviceType::IntegratedGpu
            | wgpu::DeviceType::VirtualGpu
            | wgpu::DeviceType::Other
    )
}
