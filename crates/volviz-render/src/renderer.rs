//! The renderer contract and its frame state machine.
//!
//! [`VolumeRenderer`] is the capability interface the hosting view talks to;
//! [`RendererState`] carries the host-visible state every backend shares
//! (camera matrices, viewport, dirty flag, guard inputs). The GPU compute
//! backend lives in [`crate::compute`]; [`HeadlessVolumeRenderer`] is the
//! alternate backend that records stage dispatches without touching a device.

use glam::{Mat4, Vec3};

use volviz_core::{ControlPoint, VolumeDataset};

use crate::error::RenderResult;

/// How the composite stage shades the final image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderStyle {
    /// Directional lighting from the accumulated normal, occlusion-modulated.
    #[default]
    Shaded,
    /// Accumulated color without lighting.
    Unshaded,
    /// Accumulated opacity as grayscale.
    Opacity,
    /// First-hit depth mapped through the transfer function.
    Depth,
}

impl RenderStyle {
    /// Encodes the style for the composite shader's uniform.
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            RenderStyle::Shaded => 0,
            RenderStyle::Unshaded => 1,
            RenderStyle::Opacity => 2,
            RenderStyle::Depth => 3,
        }
    }
}

/// Viewport rectangle in window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Whether the viewport covers any pixels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Why a `render()` call skipped the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSkip {
    /// Rendering is disabled (e.g. no volume loaded yet).
    RenderingDisabled,
    /// Nothing changed since the last completed frame.
    NoPendingUpdate,
    /// No volume is bound.
    NoVolume,
    /// Fewer than two transfer-function control points.
    NotEnoughControlPoints,
    /// The viewport has zero area.
    EmptyViewport,
}

/// Host-visible renderer state shared by every backend.
#[derive(Debug, Clone)]
pub struct RendererState {
    /// View matrix.
    pub view: Mat4,
    /// Projection matrix.
    pub projection: Mat4,
    /// Inverse of `projection * view`, recomputed whenever either is set.
    pub inv_view_projection: Mat4,
    /// Eye position for lighting.
    pub eye: Vec3,
    /// Current viewport.
    pub viewport: Viewport,
    /// Dirty flag: a completed frame clears it, any input change sets it.
    pub update_requested: bool,
    /// Gates whether `render()` does any work at all.
    pub rendering_enabled: bool,
    /// Whether a volume has been uploaded.
    pub volume_bound: bool,
    /// Number of transfer-function control points currently applied.
    pub control_point_count: usize,
    /// Composite shading style.
    pub style: RenderStyle,
}

impl Default for RendererState {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            inv_view_projection: Mat4::IDENTITY,
            eye: Vec3::new(0.0, 0.0, 3.0),
            viewport: Viewport::default(),
            update_requested: false,
            rendering_enabled: true,
            volume_bound: false,
            control_point_count: 0,
            style: RenderStyle::default(),
        }
    }
}

impl RendererState {
    /// Stores both matrices and recomputes their combined inverse.
    pub fn set_matrices(&mut self, view: Mat4, projection: Mat4) {
        self.view = view;
        self.projection = projection;
        self.inv_view_projection = (projection * view).inverse();
        self.update_requested = true;
    }

    /// Stores the eye position.
    pub fn set_eye(&mut self, eye: Vec3) {
        self.eye = eye;
        self.update_requested = true;
    }

    /// Stores the viewport rectangle.
    pub fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = Viewport {
            x,
            y,
            width,
            height,
        };
        self.update_requested = true;
    }

    /// Marks cached output stale.
    pub fn request_update(&mut self) {
        self.update_requested = true;
    }

    /// Checks the frame guards in order; `None` means the frame should run.
    #[must_use]
    pub fn frame_guard(&self) -> Option<FrameSkip> {
        if !self.rendering_enabled {
            return Some(FrameSkip::RenderingDisabled);
        }
        if !self.update_requested {
            return Some(FrameSkip::NoPendingUpdate);
        }
        if !self.volume_bound {
            return Some(FrameSkip::NoVolume);
        }
        if self.control_point_count < 2 {
            return Some(FrameSkip::NotEnoughControlPoints);
        }
        if self.viewport.is_empty() {
            return Some(FrameSkip::EmptyViewport);
        }
        None
    }
}

/// The renderer capability interface.
///
/// All operations mutate internal (possibly GPU-resident) state; none return
/// values. Configuration problems are absorbed as skipped frames; only
/// device-level failures surface as errors.
pub trait VolumeRenderer {
    /// One-time backend setup after construction.
    fn init(&mut self) -> RenderResult<()>;

    /// Releases backend resources.
    fn cleanup(&mut self);

    /// Runs the three-stage pipeline if all frame guards pass.
    ///
    /// On success the dirty flag clears; on a device failure the frame is
    /// abandoned and the dirty flag stays set so the next call retries.
    fn render(&mut self) -> RenderResult<()>;

    /// Resizes every intermediate target to `(width, height)`.
    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> RenderResult<()>;

    /// Uploads a volume. `None` is rejected as a no-op (the previous volume,
    /// if any, stays bound).
    fn set_volume(&mut self, dataset: Option<&VolumeDataset>) -> RenderResult<()>;

    /// Rebuilds and uploads the transfer-function table. Fewer than two
    /// points (or otherwise invalid points) refuse to render rather than
    /// erroring.
    fn set_transfer_function(&mut self, points: &[ControlPoint]) -> RenderResult<()>;

    /// Stores view/projection matrices and their combined inverse.
    fn set_camera(&mut self, view: Mat4, projection: Mat4);

    /// Stores the eye position used for lighting.
    fn set_eye_position(&mut self, eye: Vec3);

    /// Gates whether `render()` does any work.
    fn set_rendering_enabled(&mut self, enabled: bool);

    /// Selects the composite shading style.
    fn set_render_style(&mut self, style: RenderStyle);

    /// Marks cached output stale without changing any other input.
    fn request_update(&mut self);

    /// Shared state access.
    fn state(&self) -> &RendererState;
}

/// One pipeline stage, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    RayMarch,
    AmbientOcclusion,
    Composite,
}

/// A backend that runs the frame state machine without a GPU.
///
/// Records every stage dispatch and the intermediate-target extent so hosts
/// (and tests) can observe exactly what a frame would have executed.
#[derive(Debug, Default)]
pub struct HeadlessVolumeRenderer {
    state: RendererState,
    dispatched: Vec<PipelineStage>,
    target_extent: Option<(u32, u32)>,
    target_reallocations: u32,
    frames_completed: u32,
}

impl HeadlessVolumeRenderer {
    /// Creates a headless renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stage dispatched so far, in order.
    #[must_use]
    pub fn dispatched(&self) -> &[PipelineStage] {
        &self.dispatched
    }

    /// Number of fully completed frames.
    #[must_use]
    pub fn frames_completed(&self) -> u32 {
        self.frames_completed
    }

    /// Current intermediate-target extent, if allocated.
    #[must_use]
    pub fn target_extent(&self) -> Option<(u32, u32)> {
        self.target_extent
    }

    /// How many times the targets were (re)allocated.
    #[must_use]
    pub fn target_reallocations(&self) -> u32 {
        self.target_reallocations
    }
}

impl VolumeRenderer for HeadlessVolumeRenderer {
    fn init(&mut self) -> RenderResult<()> {
        Ok(())
    }

    fn cleanup(&mut self) {
        self.target_extent = None;
    }

    fn render(&mut self) -> RenderResult<()> {
        if let Some(skip) = self.state.frame_guard() {
            log::debug!("skipping frame: {skip:?}");
            return Ok(());
        }
        self.dispatched.push(PipelineStage::RayMarch);
        self.dispatched.push(PipelineStage::AmbientOcclusion);
        self.dispatched.push(PipelineStage::Composite);
        self.frames_completed += 1;
        self.state.update_requested = false;
        Ok(())
    }

    fn set_viewport(&mut self, x: i32, y: i32, width: u32, height: u32) -> RenderResult<()> {
        self.state.set_viewport(x, y, width, height);
        if width > 0 && height > 0 {
            self.target_extent = Some((width, height));
            self.target_reallocations += 1;
        }
        Ok(())
    }

    fn set_volume(&mut self, dataset: Option<&VolumeDataset>) -> RenderResult<()> {
        let Some(dataset) = dataset else {
            return Ok(());
        };
        log::debug!("bound volume {}", dataset.dimensions());
        self.state.volume_bound = true;
        // Rebinding a dataset must not leave a stale frame on screen.
        self.state.update_requested = true;
        Ok(())
    }

    fn set_transfer_function(&mut self, points: &[ControlPoint]) -> RenderResult<()> {
        self.state.control_point_count = points.len();
        self.state.update_requested = true;
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
        self.state.update_requested = true;
    }

    fn request_update(&mut self) {
        self.state.request_update();
    }

    fn state(&self) -> &RendererState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use volviz_core::UVec3;

    fn two_points() -> Vec<ControlPoint> {
        vec![
            ControlPoint::new(0.0, 0.0, Vec3::ZERO),
            ControlPoint::new(1.0, 1.0, Vec3::ONE),
        ]
    }

    fn ready_renderer() -> HeadlessVolumeRenderer {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut r = HeadlessVolumeRenderer::new();
        let volume = VolumeDataset::new(UVec3::splat(8), Vec3::ONE).unwrap();
        r.set_viewport(0, 0, 640, 480).unwrap();
        r.set_volume(Some(&volume)).unwrap();
        r.set_transfer_function(&two_points()).unwrap();
        r
    }

    #[test]
    fn test_full_frame_dispatches_all_three_stages_in_order() {
        let mut r = ready_renderer();
        r.render().unwrap();
        assert_eq!(
            r.dispatched(),
            &[
                PipelineStage::RayMarch,
                PipelineStage::AmbientOcclusion,
                PipelineStage::Composite
            ]
        );
        assert_eq!(r.frames_completed(), 1);
    }

    #[test]
    fn test_render_is_idempotent_until_next_change() {
        let mut r = ready_renderer();
        r.render().unwrap();
        assert!(!r.state().update_requested);

        // Nothing changed: second call must not re-dispatch any stage.
        r.render().unwrap();
        assert_eq!(r.dispatched().len(), 3);

        r.request_update();
        r.render().unwrap();
        assert_eq!(r.dispatched().len(), 6);
    }

    #[test]
    fn test_noop_when_rendering_disabled() {
        let mut r = ready_renderer();
        r.set_rendering_enabled(false);
        r.render().unwrap();
        assert!(r.dispatched().is_empty());
        // The pending update is preserved for when rendering is re-enabled.
        assert!(r.state().update_requested);
    }

    #[test]
    fn test_noop_without_volume() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut r = HeadlessVolumeRenderer::new();
        r.set_viewport(0, 0, 640, 480).unwrap();
        r.set_transfer_function(&two_points()).unwrap();
        r.render().unwrap();
        assert!(r.dispatched().is_empty());
    }

    #[test]
    fn test_noop_with_too_few_control_points() {
        let mut r = ready_renderer();
        r.set_transfer_function(&[ControlPoint::new(0.5, 0.5, Vec3::ONE)])
            .unwrap();
        r.render().unwrap();
        assert!(r.dispatched().is_empty());
    }

    #[test]
    fn test_noop_with_empty_viewport() {
        let mut r = ready_renderer();
        r.state.viewport = Viewport::default();
        r.state.request_update();
        r.render().unwrap();
        assert!(r.dispatched().is_empty());
    }

    #[test]
    fn test_resize_reallocates_targets_and_forces_full_frame() {
        let mut r = ready_renderer();
        r.render().unwrap();
        assert_eq!(r.target_extent(), Some((640, 480)));

        r.set_viewport(0, 0, 800, 600).unwrap();
        assert_eq!(r.target_extent(), Some((800, 600)));
        assert_eq!(r.target_reallocations(), 2);
        assert!(r.state().update_requested);

        r.render().unwrap();
        assert_eq!(r.frames_completed(), 2);
    }

    #[test]
    fn test_volume_swap_sets_dirty_flag() {
        let mut r = ready_renderer();
        r.render().unwrap();
        assert!(!r.state().update_requested);

        let other = VolumeDataset::new(UVec3::splat(4), Vec3::ONE).unwrap();
        r.set_volume(Some(&other)).unwrap();
        assert!(r.state().update_requested);
    }

    #[test]
    fn test_null_volume_is_rejected_as_noop() {
        let mut r = ready_renderer();
        r.render().unwrap();
        r.set_volume(None).unwrap();
        assert!(r.state().volume_bound);
        assert!(!r.state().update_requested);
    }

    #[test]
    fn test_guard_order_matches_contract() {
        let mut state = RendererState::default();
        state.rendering_enabled = false;
        assert_eq!(state.frame_guard(), Some(FrameSkip::RenderingDisabled));

        state.rendering_enabled = true;
        assert_eq!(state.frame_guard(), Some(FrameSkip::NoPendingUpdate));

        state.update_requested = true;
        assert_eq!(state.frame_guard(), Some(FrameSkip::NoVolume));

        state.volume_bound = true;
        assert_eq!(state.frame_guard(), Some(FrameSkip::NotEnoughControlPoints));

        state.control_point_count = 2;
        assert_eq!(state.frame_guard(), Some(FrameSkip::EmptyViewport));

        state.viewport = Viewport {
            x: 0,
            y: 0,
            width: 64,
            height: 64,
        };
        assert_eq!(state.frame_guard(), None);
    }

    #[test]
    fn test_set_matrices_recomputes_inverse() {
        let mut state = RendererState::default();
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        state.set_matrices(view, proj);

        let round_trip = state.inv_view_projection * (proj * view);
        for (a, b) in round_trip
            .to_cols_array()
            .iter()
            .zip(Mat4::IDENTITY.to_cols_array().iter())
        {
            assert!((a - b).abs() < 1e-4);
        }
    }
}
