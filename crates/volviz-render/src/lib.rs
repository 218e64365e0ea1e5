//! Rendering backend for volviz-rs.
//!
//! This crate provides the wgpu-based volume renderer, including:
//! - the three-stage compute pipeline (ray march, ambient occlusion,
//!   composite)
//! - per-frame intermediate targets and the shared output surface
//! - camera and view management
//! - redraw scheduling for the hosting event loop

pub mod camera;
pub mod compute;
pub mod error;
pub mod renderer;
pub mod scheduler;
pub mod surface;
pub mod targets;

pub use camera::Camera;
pub use compute::{ComputeVolumeRenderer, CompositeUniforms, OcclusionUniforms, RayMarchUniforms};
pub use error::{RenderError, RenderResult};
pub use renderer::{
    FrameSkip, HeadlessVolumeRenderer, PipelineStage, RenderStyle, RendererState, Viewport,
    VolumeRenderer,
};
pub use scheduler::{RedrawScheduler, DEFAULT_REDRAW_INTERVAL};
pub use surface::{ExclusiveFlag, SharedOutputSurface, SurfaceWriteGuard};
pub use targets::FrameTargets;
