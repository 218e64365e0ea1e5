//! Per-frame intermediate render targets.
//!
//! The ray-march stage writes seven screen-sized images that the later
//! stages consume: first-hit depth, accumulated opacity, accumulated color,
//! accumulated normal, accumulated density, first-hit position, and ambient
//! occlusion. All are storage textures so compute stages can write them
//! directly; they are also bindable as sampled textures for the stages that
//! only read.

/// Texture formats for each intermediate target.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const OPACITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DENSITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;
pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const OCCLUSION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// One intermediate target and its default view.
pub struct Target {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl Target {
    fn new(device: &wgpu::Device, label: &str, format: wgpu::TextureFormat, w: u32, h: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: w,
                height: h,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// The full set of intermediate targets for one viewport size.
pub struct FrameTargets {
    pub depth: Target,
    pub opacity: Target,
    pub color: Target,
    pub normal: Target,
    pub density: Target,
    pub position: Target,
    pub occlusion: Target,
    width: u32,
    height: u32,
}

impl FrameTargets {
    /// Allocates all seven targets at `width x height`.
    #[must_use]
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        log::debug!("allocating frame targets at {width}x{height}");
        Self {
            depth: Target::new(device, "Depth Target", DEPTH_FORMAT, width, height),
            opacity: Target::new(device, "Opacity Target", OPACITY_FORMAT, width, height),
            color: Target::new(device, "Color Target", COLOR_FORMAT, width, height),
            normal: Target::new(device, "Normal Target", NORMAL_FORMAT, width, height),
            density: Target::new(device, "Density Target", DENSITY_FORMAT, width, height),
            position: Target::new(device, "Position Target", POSITION_FORMAT, width, height),
            occlusion: Target::new(device, "Occlusion Target", OCCLUSION_FORMAT, width, height),
            width,
            height,
        }
    }

    /// Drops and reallocates every target at the new size. A no-op if the
    /// size is unchanged.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        *self = Self::new(device, width, height);
    }

    /// Current target extent.
    #[must_use]
    pub fn extent(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
