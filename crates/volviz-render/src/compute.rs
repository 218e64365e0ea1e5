//! The GPU compute backend.
//!
//! Three compute stages per frame, in order:
//!
//! 1. ray march: walks the volume front to back per pixel and fills the
//!    seven intermediate targets,
//! 2. ambient occlusion: screen-space occlusion from first-hit depth and
//!    accumulated opacity,
//! 3. composite: shades the accumulated buffers into the shared output
//!    surface.
//!
//! Each stage submits its own command buffer; the later stages read what the
//! earlier ones wrote through texture bindings. The composite stage runs
//! only while the output surface is held exclusively.

use glam::{Mat4, Vec3};
use pollster::FutureExt;
use rand::Rng;
use wgpu::util::DeviceExt;

use volviz_core::{ControlPoint, TransferFunctionTable, VolumeDataset, TF_RESOLUTION};

use crate::error::{RenderError, RenderResult};
use crate::renderer::{RenderStyle, RendererState, VolumeRenderer};
use crate::surface::SharedOutputSurface;
use crate::targets::{self, FrameTargets};

/// Workgroup edge for all three stages; dispatches are ceil(extent / 8).
const WORKGROUP_SIZE: u32 = 8;

/// GPU representation of ray-march uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct RayMarchUniforms {
    pub inv_view_projection: [[f32; 4]; 4],
    pub volume_size: [f32; 3],
    pub step_size: f32,
    pub eye: [f32; 3],
    pub max_steps: u32,
    pub screen_width: f32,
    pub screen_height: f32,
    pub opacity_threshold: f32,
    pub density_scale: f32,
    pub spacing: [f32; 3],
    pub _pad0: f32,
    pub value_min: f32,
    pub value_max: f32,
    pub _pad1: [f32; 2],
}

impl Default for RayMarchUniforms {
    fn default() -> Self {
        Self {
            inv_view_projection: Mat4::IDENTITY.to_cols_array_2d(),
            volume_size: [1.0; 3],
            step_size: 0.005,
            eye: [0.0, 0.0, 3.0],
            max_steps: 1024,
            screen_width: 1280.0,
            screen_height: 720.0,
            opacity_threshold: 0.99,
            density_scale: 1.0,
            spacing: [1.0; 3],
            _pad0: 0.0,
            value_min: 0.0,
            value_max: 1.0,
            _pad1: [0.0; 2],
        }
    }
}

/// GPU representation of ambient-occlusion uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OcclusionUniforms {
    pub radius: f32,
    pub bias: f32,
    pub intensity: f32,
    pub sample_count: u32,
}

impl Default for OcclusionUniforms {
    fn default() -> Self {
        Self {
            radius: 0.02,
            bias: 0.002,
            intensity: 1.0,
            sample_count: 16,
        }
    }
}

/// GPU representation of composite uniforms.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
#[allow(clippy::pub_underscore_fields)]
pub struct CompositeUniforms {
    pub light_dir: [f32; 3],
    pub ambient: f32,
    pub style: u32,
    pub occlusion_strength: f32,
    pub _pad: [f32; 2],
}

impl Default for CompositeUniforms {
    fn default() -> Self {
        Self {
            light_dir: [0.4, 0.6, 0.7],
            ambient: 0.2,
            style: 0,
            occlusion_strength: 1.0,
            _pad: [0.0; 2],
        }
    }
}

struct StagePipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

/// The wgpu-backed volume renderer.
pub struct ComputeVolumeRenderer {
    state: RendererState,
    device: wgpu::Device,
    queue: wgpu::Queue,

    raymarch: StagePipeline,
    occlusion: StagePipeline,
    composite: StagePipeline,

    volume_sampler: wgpu::Sampler,
    tf_sampler: wgpu::Sampler,
    noise_view: wgpu::TextureView,

    targets: Option<FrameTargets>,
    output: Option<SharedOutputSurface>,
    volume_view: Option<wgpu::TextureView>,
    volume_uniforms: RayMarchUniforms,
    tf_view: Option<wgpu::TextureView>,
}

impl ComputeVolumeRenderer {
    /// Builds the renderer on an existing device and queue.
    #[must_use]
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let raymarch = create_raymarch_pipeline(&device);
        let occlusion = create_occlusion_pipeline(&device);
        let composite = create_composite_pipeline(&device);

        let volume_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Volume Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let tf_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Transfer Function Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });
        let noise_view = create_noise_texture(&device, &queue);

        Self {
            state: RendererState::default(),
            device,
            queue,
            raymarch,
            occlusion,
            composite,
            volume_sampler,
            tf_sampler,
            noise_view,
            targets: None,
            output: None,
            volume_view: None,
            volume_uniforms: RayMarchUniforms::default(),
            tf_view: None,
        }
    }

    /// Creates a renderer on its own headless device.
    ///
    /// The ray-march stage writes six storage textures, above the default
    /// per-stage limit of four, so the device is requested with a raised
    /// limit.
    pub async fn new_headless() -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("volviz device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits {
                    max_storage_textures_per_shader_stage: 8,
                    ..wgpu::Limits::default()
                },
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        Ok(Self::from_device(device, queue))
    }

    /// The shared output surface, once a viewport has been set.
    #[must_use]
    pub fn output_surface(&self) -> Option<&SharedOutputSurface> {
        self.output.as_ref()
    }

    /// Adjusts ray-march quality parameters.
    pub fn set_march_params(&mut self, step_size: f32, max_steps: u32, opacity_threshold: f32) {
        self.volume_uniforms.step_size = step_size;
        self.volume_uniforms.max_steps = max_steps;
        self.volume_uniforms.opacity_threshold = opacity_threshold;
        self.state.request_update();
    }

    fn submit_stage(
        &self,
        label: &str,
        pipeline: &wgpu::ComputePipeline,
        bind_group: &wgpu::BindGroup,
        width: u32,
        height: u32,
    ) -> RenderResult<()> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        for _ in 0..2 {
            if let Some(error) = self.device.pop_error_scope().block_on() {
                log::error!("{label} failed: {error}");
                return Err(RenderError::from_device_error(&error));
            }
        }
        Ok(())
    }

    fn run_raymarch(&self, targets: &FrameTargets) -> RenderResult<()> {
        // Guard chain ensures these are bound before a frame runs.
        let (Some(volume_view), Some(tf_view)) = (&self.volume_view, &self.tf_view) else {
            return Ok(());
        };
        let (width, height) = targets.extent();

        let uniforms = RayMarchUniforms {
            inv_view_projection: self.state.inv_view_projection.to_cols_array_2d(),
            eye: self.state.eye.to_array(),
            screen_width: width as f32,
            screen_height: height as f32,
            ..self.volume_uniforms
        };
        self.queue.write_buffer(
            &self.raymarch.uniform_buffer,
            0,
            bytemuck::cast_slice(&[uniforms]),
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Ray March Bind Group"),
            layout: &self.raymarch.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.raymarch.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(volume_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.volume_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(tf_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.tf_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&targets.depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&targets.opacity.view),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::TextureView(&targets.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::TextureView(&targets.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 9,
                    resource: wgpu::BindingResource::TextureView(&targets.density.view),
                },
                wgpu::BindGroupEntry {
                    binding: 10,
                    resource: wgpu::BindingResource::TextureView(&targets.position.view),
                },
            ],
        });

        self.submit_stage(
            "Ray March Pass",
            &self.raymarch.pipeline,
            &bind_group,
            width,
            height,
        )
    }

    fn run_occlusion(&self, targets: &FrameTargets) -> RenderResult<()> {
        let (width, height) = targets.extent();
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Occlusion Bind Group"),
            layout: &self.occlusion.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.occlusion.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&targets.opacity.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&self.noise_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&targets.occlusion.view),
                },
            ],
        });

        self.submit_stage(
            "Occlusion Pass",
            &self.occlusion.pipeline,
            &bind_group,
            width,
            height,
        )
    }

    fn run_composite(&self, targets: &FrameTargets) -> RenderResult<()> {
        let Some(tf_view) = &self.tf_view else {
            return Ok(());
        };
        let output = self.output.as_ref().ok_or(RenderError::NoOutputSurface)?;
        let guard = output.acquire_write()?;
        let (width, height) = targets.extent();

        let uniforms = CompositeUniforms {
            style: self.state.style.as_u32(),
            ..CompositeUniforms::default()
        };
        self.queue.write_buffer(
            &self.composite.uniform_buffer,
            0,
            bytemuck::cast_slice(&[uniforms]),
        );

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout: &self.composite.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.composite.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&targets.opacity.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&targets.color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&targets.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&targets.density.view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(&targets.position.view),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: wgpu::BindingResource::TextureView(&targets.occlusion.view),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: wgpu::BindingResource::TextureView(tf_view),
                },
                wgpu::BindGroupEntry {
                    binding: 9,
                    resource: wgpu::BindingResource::Sampler(&self.tf_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 10,
                    resource: wgpu::BindingResource::TextureView(guard.view()),
                },
            ],
        });

        let result = self.submit_stage(
            "Composite Pass",
            &self.composite.pipeline,
            &bind_group,
            width,
            height,
        );
        drop(guard);
        result
    }
}

impl VolumeRenderer for ComputeVolumeRenderer {
    fn init(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn cleanup(&mut self) {
        self.targets = None;
        self.output = None;
        self.volume_view = None;
        self.tf_view = None;
    }

    fn render(&mut self) -> RenderResult<()> {
        if let Some(skip) = self.state.frame_guard() {
            log::trace!("skipping frame: {skip:?}");
            return Ok(());
        }
        let Some(targets) = &self.targets else {
            return Ok(());
        };

        self.run_raymarch(targets)?;
        self.run_occlusion(targets)?;
        self.run_composite(targets)?;

        // Only a fully completed frame clears the dirty flag; a failed
        // stage leaves it set so the next call retries.
        self.state.update_requested = false;
        Ok(())
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> RenderResult<()> {
        self.state.set_viewport(x, y, width, height);
        if width == 0 || height == 0 {
            return Ok(());
        }
        match &mut self.targets {
            Some(targets) => targets.resize(&self.device, width, height),
            None => self.targets = Some(FrameTargets::new(&self.device, width, height)),
        }
        self.output = Some(SharedOutputSurface::new(&self.device, width, height)?);
        Ok(())
    }

    fn set_volume(&mut self, dataset: Option<&VolumeDataset>) -> RenderResult<()> {
        let Some(dataset) = dataset else {
            return Ok(());
        };
        let dims = dataset.dimensions();
        log::info!("uploading volume {dims}");

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Volume Texture"),
            size: wgpu::Extent3d {
                width: dims.x,
                height: dims.y,
                depth_or_array_layers: dims.z,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            dataset.samples(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(dims.x),
                rows_per_image: Some(dims.y),
            },
            wgpu::Extent3d {
                width: dims.x,
                height: dims.y,
                depth_or_array_layers: dims.z,
            },
        );
        self.volume_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));

        let spacing = dataset.spacing();
        let physical = Vec3::new(
            dims.x as f32 * spacing.x,
            dims.y as f32 * spacing.y,
            dims.z as f32 * spacing.z,
        );
        // Normalize so the longest edge spans one unit in world space.
        let longest = physical.max_element().max(f32::EPSILON);
        self.volume_uniforms.volume_size = (physical / longest).to_array();
        self.volume_uniforms.spacing = spacing.to_array();
        if let Some(stats) = dataset.stats() {
            self.volume_uniforms.value_min = stats.min / 255.0;
            self.volume_uniforms.value_max = stats.max / 255.0;
        } else {
            self.volume_uniforms.value_min = 0.0;
            self.volume_uniforms.value_max = 1.0;
        }

        self.state.volume_bound = true;
        self.state.request_update();
        Ok(())
    }

    fn set_transfer_function(&mut self, points: &[ControlPoint]) -> RenderResult<()> {
        self.state.control_point_count = points.len();
        self.state.request_update();
        let table = match TransferFunctionTable::from_control_points(points) {
            Ok(table) => table,
            Err(e) => {
                // Invalid edits refuse to render rather than erroring; the
                // last uploaded table stays bound until a valid one
                // replaces it.
                log::warn!("transfer function not applied: {e}");
                self.state.control_point_count = 0;
                return Ok(());
            }
        };
        let packed = table.packed_rgba16();

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Transfer Function Texture"),
            size: wgpu::Extent3d {
                width: TF_RESOLUTION as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D1,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&packed),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(TF_RESOLUTION as u32 * 8),
                rows_per_image: None,
            },
            wgpu::Extent3d {
                width: TF_RESOLUTION as u32,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.tf_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        Ok(())
    }

    fn set_camera(&mut self, view: Mat4, projection: Mat4) {
        self.state.set_matrices(view, projection);
    }

    fn set_eye_position(&mut self, eye: Vec3) {
        self.state.set_eye(eye);
    }

    fn set_rendering_enabled(&mut self, enabled: bool) {
        self.state.rendering_enabled = enabled;
    }

    fn set_render_style(&mut self, style: RenderStyle) {
        self.state.style = style;
        self.state.request_update();
    }

    fn request_update(&mut self) {
        self.state.request_update();
    }

    fn state(&self) -> &RendererState {
        &self.state
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

fn sampled_entry(
    binding: u32,
    view_dimension: wgpu::TextureViewDimension,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension,
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

fn storage_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

fn create_stage(
    device: &wgpu::Device,
    name: &str,
    source: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
    uniform_bytes: &[u8],
) -> StagePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(name),
        entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(name),
        bind_group_layouts: &[&bind_group_layout],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(name),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });

    let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(name),
        contents: uniform_bytes,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    StagePipeline {
        pipeline,
        bind_group_layout,
        uniform_buffer,
    }
}

fn create_raymarch_pipeline(device: &wgpu::Device) -> StagePipeline {
    create_stage(
        device,
        "Ray March Pipeline",
        include_str!("shaders/raymarch.wgsl"),
        &[
            uniform_entry(0),
            sampled_entry(1, wgpu::TextureViewDimension::D3, true),
            sampler_entry(2),
            sampled_entry(3, wgpu::TextureViewDimension::D1, true),
            sampler_entry(4),
            storage_entry(5, targets::DEPTH_FORMAT),
            storage_entry(6, targets::OPACITY_FORMAT),
            storage_entry(7, targets::COLOR_FORMAT),
            storage_entry(8, targets::NORMAL_FORMAT),
            storage_entry(9, targets::DENSITY_FORMAT),
            storage_entry(10, targets::POSITION_FORMAT),
        ],
        bytemuck::cast_slice(&[RayMarchUniforms::default()]),
    )
}

fn create_occlusion_pipeline(device: &wgpu::Device) -> StagePipeline {
    create_stage(
        device,
        "Occlusion Pipeline",
        include_str!("shaders/occlusion.wgsl"),
        &[
            uniform_entry(0),
            sampled_entry(1, wgpu::TextureViewDimension::D2, false),
            sampled_entry(2, wgpu::TextureViewDimension::D2, false),
            sampled_entry(3, wgpu::TextureViewDimension::D2, false),
            storage_entry(4, targets::OCCLUSION_FORMAT),
        ],
        bytemuck::cast_slice(&[OcclusionUniforms::default()]),
    )
}

fn create_composite_pipeline(device: &wgpu::Device) -> StagePipeline {
    create_stage(
        device,
        "Composite Pipeline",
        include_str!("shaders/composite.wgsl"),
        &[
            uniform_entry(0),
            sampled_entry(1, wgpu::TextureViewDimension::D2, false),
            sampled_entry(2, wgpu::TextureViewDimension::D2, false),
            sampled_entry(3, wgpu::TextureViewDimension::D2, false),
            sampled_entry(4, wgpu::TextureViewDimension::D2, false),
            sampled_entry(5, wgpu::TextureViewDimension::D2, false),
            sampled_entry(6, wgpu::TextureViewDimension::D2, false),
            sampled_entry(7, wgpu::TextureViewDimension::D2, false),
            sampled_entry(8, wgpu::TextureViewDimension::D1, true),
            sampler_entry(9),
            storage_entry(10, crate::surface::OUTPUT_FORMAT),
        ],
        bytemuck::cast_slice(&[CompositeUniforms::default()]),
    )
}

/// A tiled 4x4 random rotation texture for the occlusion kernel.
fn create_noise_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let mut rng = rand::thread_rng();
    let mut noise_data = [0_u8; 4 * 4 * 4];
    for pixel in noise_data.chunks_exact_mut(4) {
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        pixel[0] = ((angle.cos() * 0.5 + 0.5) * 255.0) as u8;
        pixel[1] = ((angle.sin() * 0.5 + 0.5) * 255.0) as u8;
        pixel[2] = 0;
        pixel[3] = 255;
    }

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Occlusion Noise Texture"),
        size: wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &noise_data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * 4),
            rows_per_image: Some(4),
        },
        wgpu::Extent3d {
            width: 4,
            height: 4,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem;

    #[test]
    fn test_raymarch_uniforms_layout() {
        assert_eq!(mem::size_of::<RayMarchUniforms>(), 144);
        assert_eq!(mem::size_of::<RayMarchUniforms>() % 16, 0);
    }

    #[test]
    fn test_occlusion_uniforms_layout() {
        assert_eq!(mem::size_of::<OcclusionUniforms>(), 16);
    }

    #[test]
    fn test_composite_uniforms_layout() {
        assert_eq!(mem::size_of::<CompositeUniforms>(), 32);
        assert_eq!(mem::size_of::<CompositeUniforms>() % 16, 0);
    }

    #[test]
    fn test_dispatch_covers_viewport() {
        assert_eq!(641_u32.div_ceil(WORKGROUP_SIZE), 81);
        assert_eq!(480_u32.div_ceil(WORKGROUP_SIZE), 60);
        assert_eq!(8_u32.div_ceil(WORKGROUP_SIZE), 1);
    }
}
