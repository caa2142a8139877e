// SPDX-License-Identifier: GPL-3.0-only

//! GPU initialization utilities for compute pipelines.
//!
//! The engine owns a dedicated wgpu device; nothing here is shared with a
//! presentation surface.

use crate::config::{GpuConfig, PowerPreference};
use crate::errors::InitError;
use std::sync::Arc;
use tracing::{debug, info};

pub use ::wgpu;

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    /// Adapter class (discrete, integrated, CPU, ...)
    pub device_type: wgpu::DeviceType,
    /// Largest 2D texture side the device accepts
    pub max_texture_dimension: u32,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(pref: PowerPreference) -> Self {
        match pref {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}

/// Create a wgpu device and queue for compute work.
///
/// Backends can be narrowed with the `WGPU_BACKEND` environment variable.
/// Every failure here is fatal for the engine.
pub async fn create_compute_device(
    label: &str,
    config: &GpuConfig,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo), InitError> {
    info!(label = label, "Creating GPU device for compute");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::from_env().unwrap_or(wgpu::Backends::PRIMARY),
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: config.power_preference.into(),
            compatible_surface: None,
            force_fallback_adapter: config.force_fallback_adapter,
        })
        .await
        .map_err(|e| InitError::NoAdapter(e.to_string()))?;

    let adapter_info = adapter.get_info();
    let adapter_limits = adapter.limits();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        device_type = ?adapter_info.device_type,
        "GPU adapter selected for compute"
    );

    let downlevel = adapter.get_downlevel_capabilities();
    if !downlevel
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
    {
        return Err(InitError::Limits(format!(
            "adapter '{}' does not support compute shaders",
            adapter_info.name
        )));
    }
    if adapter_limits.max_storage_textures_per_shader_stage < 1 {
        return Err(InitError::Limits(format!(
            "adapter '{}' exposes no storage textures to compute shaders",
            adapter_info.name
        )));
    }

    debug!(
        max_texture_dimension = adapter_limits.max_texture_dimension_2d,
        "Requesting device with adapter limits"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter_limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| InitError::DeviceRequest(e.to_string()))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        device_type: adapter_info.device_type,
        max_texture_dimension: device.limits().max_texture_dimension_2d,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_compute_device() {
        // This test requires a GPU, so it may be skipped in CI
        match pollster::block_on(create_compute_device("test_device", &GpuConfig::default())) {
            Ok((device, queue, info)) => {
                println!("Created device: {:?}", info);
                assert!(info.max_texture_dimension >= 1);
                drop(queue);
                drop(device);
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
