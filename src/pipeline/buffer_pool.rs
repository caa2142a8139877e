// SPDX-License-Identifier: GPL-3.0-only

//! Ping-pong surface pair
//!
//! The pool only owns and sizes the two surfaces. Which one is read and which
//! one is written on a given pass is decided by the stage order.

use crate::gpu::wgpu;
use crate::shaders::CachedDimensions;
use std::sync::Arc;
use tracing::debug;

/// Format shared by every working surface; contents are sRGB-encoded
pub const SURFACE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Usage shared by every working surface: sampled, written by compute, copyable
pub const SURFACE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::STORAGE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// A GPU surface with its default view
pub struct Surface {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Surface {
    pub fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SURFACE_FORMAT,
            usage: SURFACE_USAGE,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Two equally sized surfaces used alternately as read source and write target
pub struct BufferPool {
    device: Arc<wgpu::Device>,
    label: &'static str,
    dims: CachedDimensions,
    a: Surface,
    b: Surface,
}

impl BufferPool {
    /// Allocate both surfaces at `width` x `height` (at least 1x1)
    pub fn new(device: Arc<wgpu::Device>, label: &'static str, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let (a, b) = Self::allocate(&device, label, width, height);
        Self {
            device,
            label,
            dims: CachedDimensions::new(width, height),
            a,
            b,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
    ) -> (Surface, Surface) {
        debug!(label, width, height, "Allocating ping-pong surfaces");
        (
            Surface::new(device, &format!("{}_a", label), width, height),
            Surface::new(device, &format!("{}_b", label), width, height),
        )
    }

    /// Reallocate both surfaces if the size changed
    ///
    /// Contents are not preserved across a reallocation. Returns whether
    /// anything was reallocated.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let (width, height) = (width.max(1), height.max(1));
        if !self.dims.needs_update(width, height) {
            return false;
        }

        let (a, b) = Self::allocate(&self.device, self.label, width, height);
        self.a = a;
        self.b = b;
        self.dims.update(width, height);
        true
    }

    pub fn a(&self) -> &Surface {
        &self.a
    }

    pub fn b(&self) -> &Surface {
        &self.b
    }

    /// Current surface size
    pub fn size(&self) -> (u32, u32) {
        (self.dims.width, self.dims.height)
    }
}
