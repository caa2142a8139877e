// SPDX-License-Identifier: GPL-3.0-only

//! GPU-resident stage pipeline
//!
//! Each frame runs Input → Lens → Effects → Composite over the ping-pong
//! pool:
//!
//! ```text
//! source ──Input──▶ A ──Lens──▶ B ──Effects──▶ A ──Composite(source, A)──▶ output
//! ```
//!
//! Working surfaces store sRGB-encoded values so 8 bits keep shadow detail;
//! every stage decodes to linear light after sampling and encodes on store.
//! With the tone curve on, Input stores `linear / TONE_MAP_HEADROOM` so
//! highlights above 1.0 reach Effects. The pipeline is not temporally
//! recursive, so a pool reallocation between frames loses nothing.

mod buffer_pool;
pub mod reference;
pub mod stages;

pub use buffer_pool::{BufferPool, SURFACE_FORMAT, Surface};
pub use reference::{ReferenceFrame, ReferencePipeline, RgbImage};
pub use stages::{StageDims, StageKind, StageUniforms, contain_rect};

use crate::config::EngineConfig;
use crate::constants::gpu::WORKGROUP_SIZE;
use crate::errors::{EngineError, EngineResult, InitError};
use crate::frame::{FrameSource, fit_within, validate_source};
use crate::gpu::{self, GpuDeviceInfo, wgpu};
use crate::histogram::HistogramView;
use crate::params::{ParameterSet, PreviewMode, UpscaleStyle};
use crate::resolution::{Resolution, ResolutionGovernor};
use crate::saliency::SubjectContext;
use crate::shaders::common::{
    CompositeParams, EffectsParams, InputParams, LensParams, ResampleParams,
};
use crate::shaders::{CachedDimensions, StageShader, compute_dispatch_size, read_texture_rgba};
use image::imageops::{self, FilterType};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// What one `render` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Ping-pong surface size used for this frame
    pub processing: Resolution,
    /// Composited output size
    pub output: Resolution,
    /// Whether the pool was reallocated for this frame
    pub resized: bool,
    /// Noise seed the frame was rendered with
    pub frame_index: u32,
}

/// Full-pipeline render at an explicit size, read back to the CPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// Tightly packed sRGB RGBA8
    pub rgba: Vec<u8>,
}

/// Uniform buffers, one per stage
struct StageBuffers {
    input: wgpu::Buffer,
    lens: wgpu::Buffer,
    effects: wgpu::Buffer,
    composite: wgpu::Buffer,
    resample: wgpu::Buffer,
}

/// The four-stage pipeline plus its histogram resample pass
pub struct Pipeline {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    info: GpuDeviceInfo,
    governor: ResolutionGovernor,

    single_input_layout: wgpu::BindGroupLayout,
    composite_layout: wgpu::BindGroupLayout,
    input_pipeline: wgpu::ComputePipeline,
    lens_pipeline: wgpu::ComputePipeline,
    effects_pipeline: wgpu::ComputePipeline,
    composite_pipeline: wgpu::ComputePipeline,
    resample_pipeline: wgpu::ComputePipeline,
    linear_sampler: wgpu::Sampler,
    nearest_sampler: wgpu::Sampler,
    uniforms: StageBuffers,

    pool: BufferPool,
    // Source texture and the (generation, address) of the pixels it holds
    source: Option<Surface>,
    source_dims: CachedDimensions,
    source_key: Option<(u64, usize)>,
    output: Option<Surface>,
    output_dims: CachedDimensions,
    sample: Option<Surface>,
    sample_dims: CachedDimensions,
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: SURFACE_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn create_sampler(device: &wgpu::Device, label: &str, filter: wgpu::FilterMode) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        ..Default::default()
    })
}

fn create_uniform_buffer<T>(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_stage_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shader: StageShader,
) -> wgpu::ComputePipeline {
    let label = shader.label();
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(shader.source())),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

fn dispatch(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::ComputePipeline,
    bind_group: &wgpu::BindGroup,
    width: u32,
    height: u32,
) {
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(label),
        timestamp_writes: None,
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, Some(bind_group), &[]);
    pass.dispatch_workgroups(
        compute_dispatch_size(width, WORKGROUP_SIZE),
        compute_dispatch_size(height, WORKGROUP_SIZE),
        1,
    );
}

impl Pipeline {
    /// Create the device and every stage; all failures here are fatal
    pub async fn new(config: &EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let (device, queue, info) = gpu::create_compute_device("opticlab_pipeline", &config.gpu).await?;
        Self::with_device(device, queue, info, config).await
    }

    /// Build the stages on an existing device
    pub async fn with_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        info: GpuDeviceInfo,
        config: &EngineConfig,
    ) -> EngineResult<Self> {
        info!(
            adapter_name = %info.adapter_name,
            adapter_backend = ?info.backend,
            max_texture_dimension = info.max_texture_dimension,
            "Initializing stage pipeline"
        );

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let single_input_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("single_input_layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                storage_entry(2),
                uniform_entry(3),
            ],
        });

        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite_layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                sampler_entry(2),
                storage_entry(3),
                uniform_entry(4),
            ],
        });

        let input_pipeline = create_stage_pipeline(&device, &single_input_layout, StageShader::Input);
        let lens_pipeline = create_stage_pipeline(&device, &single_input_layout, StageShader::Lens);
        let effects_pipeline =
            create_stage_pipeline(&device, &single_input_layout, StageShader::Effects);
        let composite_pipeline =
            create_stage_pipeline(&device, &composite_layout, StageShader::Composite);
        let resample_pipeline =
            create_stage_pipeline(&device, &single_input_layout, StageShader::Resample);

        if let Some(err) = device.pop_error_scope().await {
            return Err(InitError::ShaderCompile(err.to_string()).into());
        }

        let uniforms = StageBuffers {
            input: create_uniform_buffer::<InputParams>(&device, "input_uniforms"),
            lens: create_uniform_buffer::<LensParams>(&device, "lens_uniforms"),
            effects: create_uniform_buffer::<EffectsParams>(&device, "effects_uniforms"),
            composite: create_uniform_buffer::<CompositeParams>(&device, "composite_uniforms"),
            resample: create_uniform_buffer::<ResampleParams>(&device, "resample_uniforms"),
        };

        let governor = ResolutionGovernor::new(info.max_texture_dimension, &config.governor);
        let pool = BufferPool::new(Arc::clone(&device), "ping_pong", 1, 1);

        Ok(Self {
            linear_sampler: create_sampler(&device, "linear_sampler", wgpu::FilterMode::Linear),
            nearest_sampler: create_sampler(&device, "nearest_sampler", wgpu::FilterMode::Nearest),
            device,
            queue,
            info,
            governor,
            single_input_layout,
            composite_layout,
            input_pipeline,
            lens_pipeline,
            effects_pipeline,
            composite_pipeline,
            resample_pipeline,
            uniforms,
            pool,
            source: None,
            source_dims: CachedDimensions::default(),
            source_key: None,
            output: None,
            output_dims: CachedDimensions::default(),
            sample: None,
            sample_dims: CachedDimensions::default(),
        })
    }

    pub fn device_info(&self) -> &GpuDeviceInfo {
        &self.info
    }

    pub fn governor(&self) -> &ResolutionGovernor {
        &self.governor
    }

    /// Current ping-pong surface size
    pub fn processing_resolution(&self) -> Resolution {
        let (width, height) = self.pool.size();
        Resolution::new(width, height)
    }

    /// Force the next frame to re-upload the source pixels
    pub fn invalidate_source(&mut self) {
        self.source_key = None;
    }

    /// Upload the source if its pixels changed since the last upload
    ///
    /// Sources larger than the device texture limit are downscaled first.
    fn upload_source(&mut self, source: &dyn FrameSource) -> EngineResult<()> {
        validate_source(source)?;

        let key = (source.generation(), source.pixels().as_ptr() as usize);
        let limit = self.info.max_texture_dimension;
        let (width, height) = fit_within(source.width(), source.height(), limit);

        if self.source.is_none() || self.source_dims.needs_update(width, height) {
            debug!(width, height, "Allocating source texture");
            self.source = Some(Surface::new(&self.device, "source_texture", width, height));
            self.source_dims.update(width, height);
            self.source_key = None;
        }

        if self.source_key == Some(key) {
            return Ok(());
        }

        let scaled;
        let pixels = if (width, height) == (source.width(), source.height()) {
            source.pixels()
        } else {
            debug!(
                source_width = source.width(),
                source_height = source.height(),
                width,
                height,
                "Source exceeds the texture limit, downscaling before upload"
            );
            let image =
                image::RgbaImage::from_raw(source.width(), source.height(), source.pixels().to_vec())
                    .ok_or_else(|| EngineError::InvalidFrame("source buffer too small".into()))?;
            scaled = imageops::resize(&image, width, height, FilterType::Triangle).into_raw();
            &scaled[..]
        };

        let texture = &self
            .source
            .as_ref()
            .ok_or_else(|| EngineError::InvalidFrame("source texture not allocated".into()))?
            .texture;

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.source_key = Some(key);
        Ok(())
    }

    fn ensure_output(&mut self, size: Resolution) {
        if self.output.is_some() && !self.output_dims.needs_update(size.width, size.height) {
            return;
        }
        debug!(width = size.width, height = size.height, "Allocating output surface");
        self.output = Some(Surface::new(
            &self.device,
            "output_surface",
            size.width,
            size.height,
        ));
        self.output_dims.update(size.width, size.height);
    }

    fn single_input_bind_group(
        &self,
        label: &str,
        input: &wgpu::TextureView,
        sampler: &wgpu::Sampler,
        output: &wgpu::TextureView,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.single_input_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(input),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(output),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }

    /// Record all four stages over `pool` into a command buffer
    fn encode_frame(
        &self,
        pool: &BufferPool,
        source: &Surface,
        output: &Surface,
        uniforms: &StageUniforms,
        style: UpscaleStyle,
    ) -> wgpu::CommandBuffer {
        self.queue
            .write_buffer(&self.uniforms.input, 0, bytemuck::bytes_of(&uniforms.input));
        self.queue
            .write_buffer(&self.uniforms.lens, 0, bytemuck::bytes_of(&uniforms.lens));
        self.queue
            .write_buffer(&self.uniforms.effects, 0, bytemuck::bytes_of(&uniforms.effects));
        self.queue.write_buffer(
            &self.uniforms.composite,
            0,
            bytemuck::bytes_of(&uniforms.composite),
        );

        let input_sampler = match style {
            UpscaleStyle::Smooth => &self.linear_sampler,
            UpscaleStyle::Crisp => &self.nearest_sampler,
        };

        let input_group = self.single_input_bind_group(
            "input_bind_group",
            &source.view,
            input_sampler,
            &pool.a().view,
            &self.uniforms.input,
        );
        let lens_group = self.single_input_bind_group(
            "lens_bind_group",
            &pool.a().view,
            &self.linear_sampler,
            &pool.b().view,
            &self.uniforms.lens,
        );
        let effects_group = self.single_input_bind_group(
            "effects_bind_group",
            &pool.b().view,
            &self.linear_sampler,
            &pool.a().view,
            &self.uniforms.effects,
        );
        let composite_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &self.composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&pool.a().view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.uniforms.composite.as_entire_binding(),
                },
            ],
        });

        let (width, height) = pool.size();
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        for stage in StageKind::ORDER {
            match stage {
                StageKind::Input => dispatch(
                    &mut encoder,
                    "input_pass",
                    &self.input_pipeline,
                    &input_group,
                    width,
                    height,
                ),
                StageKind::Lens => dispatch(
                    &mut encoder,
                    "lens_pass",
                    &self.lens_pipeline,
                    &lens_group,
                    width,
                    height,
                ),
                StageKind::Effects => dispatch(
                    &mut encoder,
                    "effects_pass",
                    &self.effects_pipeline,
                    &effects_group,
                    width,
                    height,
                ),
                StageKind::Composite => dispatch(
                    &mut encoder,
                    "composite_pass",
                    &self.composite_pipeline,
                    &composite_group,
                    uniforms.composite.out_width,
                    uniforms.composite.out_height,
                ),
            }
        }

        encoder.finish()
    }

    /// Run every stage for one frame into a viewport-sized output surface
    ///
    /// Only a malformed source is reported; everything else is absorbed.
    pub fn render(
        &mut self,
        source: &dyn FrameSource,
        params: &ParameterSet,
        subject: &SubjectContext,
        viewport: Resolution,
        frame_index: u32,
    ) -> EngineResult<FrameStats> {
        let start = std::time::Instant::now();
        self.upload_source(source)?;

        let processing = self.governor.compute(
            source.width(),
            source.height(),
            params.upscale_factor,
            params.preview_scale,
        );
        let resized = self.pool.resize(processing.width, processing.height);
        if resized {
            debug!(
                width = processing.width,
                height = processing.height,
                "Processing resolution changed"
            );
        }

        let output_size = self.governor.fit(viewport);
        self.ensure_output(output_size);

        let uniforms = StageUniforms::derive(
            params,
            subject,
            StageDims {
                processing,
                output: output_size,
            },
            frame_index,
        );

        let (Some(source_surface), Some(output_surface)) = (&self.source, &self.output) else {
            return Err(EngineError::InvalidFrame("surfaces not allocated".into()));
        };
        let commands = self.encode_frame(
            &self.pool,
            source_surface,
            output_surface,
            &uniforms,
            params.upscale_style,
        );
        self.queue.submit(std::iter::once(commands));

        trace!(
            frame_index,
            elapsed_us = start.elapsed().as_micros() as u64,
            "Frame submitted"
        );

        Ok(FrameStats {
            processing,
            output: output_size,
            resized,
            frame_index,
        })
    }

    /// Read the composited output back as tightly packed RGBA8
    pub fn read_output(&self) -> EngineResult<Vec<u8>> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| EngineError::Readback("no frame has been rendered".into()))?;
        pollster::block_on(read_texture_rgba(
            &self.device,
            &self.queue,
            &output.texture,
            self.output_dims.width,
            self.output_dims.height,
        ))
    }

    /// Resample a view of the last frame into a `size` x `size` RGBA8 buffer
    pub fn sample_view(&mut self, view: HistogramView, size: u32) -> EngineResult<Vec<u8>> {
        let size = size.max(1);
        if self.sample.is_none() || self.sample_dims.needs_update(size, size) {
            self.sample = Some(Surface::new(&self.device, "histogram_sample", size, size));
            self.sample_dims.update(size, size);
        }

        let input = match view {
            HistogramView::Original => self.source.as_ref(),
            HistogramView::Processed => Some(self.pool.a()),
            HistogramView::Composite => self.output.as_ref(),
        };
        let (Some(input), Some(sample)) = (input, self.sample.as_ref()) else {
            return Err(EngineError::Readback("no frame has been rendered".into()));
        };

        let params = ResampleParams {
            width: size,
            height: size,
            ..Default::default()
        };
        self.queue
            .write_buffer(&self.uniforms.resample, 0, bytemuck::bytes_of(&params));

        let bind_group = self.single_input_bind_group(
            "resample_bind_group",
            &input.view,
            &self.linear_sampler,
            &sample.view,
            &self.uniforms.resample,
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("resample_encoder"),
            });
        dispatch(
            &mut encoder,
            "resample_pass",
            &self.resample_pipeline,
            &bind_group,
            size,
            size,
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        pollster::block_on(read_texture_rgba(
            &self.device,
            &self.queue,
            &sample.texture,
            size,
            size,
        ))
    }

    /// Render the processed image at `target` (aspect preserved) and read it back
    ///
    /// Uses its own surfaces, so the live preview state is untouched apart
    /// from the source upload.
    pub fn export_snapshot(
        &mut self,
        source: &dyn FrameSource,
        params: &ParameterSet,
        subject: &SubjectContext,
        target: Resolution,
        frame_index: u32,
    ) -> EngineResult<Snapshot> {
        self.upload_source(source)?;

        let native = Resolution::new(source.width(), source.height());
        let size = self.governor.fit(native.contain_within(target));
        info!(%target, %size, "Exporting snapshot");

        let pool = BufferPool::new(Arc::clone(&self.device), "snapshot", size.width, size.height);
        let output = Surface::new(&self.device, "snapshot_output", size.width, size.height);
        let export_params = ParameterSet {
            preview_mode: PreviewMode::Processed,
            ..*params
        };
        let uniforms = StageUniforms::derive(
            &export_params,
            subject,
            StageDims {
                processing: size,
                output: size,
            },
            frame_index,
        );

        let source_surface = self
            .source
            .as_ref()
            .ok_or_else(|| EngineError::InvalidFrame("source texture not allocated".into()))?;
        let commands =
            self.encode_frame(&pool, source_surface, &output, &uniforms, params.upscale_style);
        self.queue.submit(std::iter::once(commands));

        let rgba = pollster::block_on(read_texture_rgba(
            &self.device,
            &self.queue,
            &output.texture,
            size.width,
            size.height,
        ))?;

        Ok(Snapshot {
            width: size.width,
            height: size.height,
            rgba,
        })
    }
}
