//! Camera and view management.
//!
//! The windowing collaborator translates pointer drags and wheel input into
//! [`Camera::orbit`] / [`Camera::zoom`] calls and pushes the resulting
//! matrices to the renderer via `set_camera`.

use glam::{Mat4, Vec3};

/// A turntable camera orbiting a target point.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: Vec3,
    /// Point the camera is looking at.
    pub target: Vec3,
    /// Up vector.
    pub up: Vec3,
    /// Field of view in radians.
    pub fov: f32,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Closest allowed distance to the target when zooming.
    pub min_distance: f32,
}

impl Camera {
    /// Creates a new camera with default settings.
    #[must_use]
    pub fn new(aspect_ratio: f32) -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: std::f32::consts::FRAC_PI_4,
            aspect_ratio,
            near: 0.01,
            far: 10000.0,
            min_distance: 0.1,
        }
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Returns the view matrix.
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Returns the projection matrix.
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect_ratio, self.near, self.far)
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }

    /// Orbits the camera around the target, with pitch clamped away from the
    /// poles so the up vector never degenerates.
    pub fn orbit(&mut self, delta_x: f32, delta_y: f32) {
        let radius = (self.position - self.target).length();
        let mut theta = (self.position.x - self.target.x).atan2(self.position.z - self.target.z);
        let mut phi = ((self.position.y - self.target.y) / radius).acos();

        theta -= delta_x;
        phi = (phi - delta_y).clamp(0.01, std::f32::consts::PI - 0.01);

        self.position = self.target
            + Vec3::new(
                radius * phi.sin() * theta.sin(),
                radius * phi.cos(),
                radius * phi.sin() * theta.cos(),
            );
    }

    /// Zooms toward/away from the target, clamped to `min_distance`.
    pub fn zoom(&mut self, delta: f32) {
        let direction = self.forward();
        let distance = (self.position - self.target).length();
        let new_distance = (distance - delta).max(self.min_distance);
        self.position = self.target - direction * new_distance;
    }

    /// Frames the given bounding box: targets its center and pulls the camera
    /// back far enough to see all of it.
    pub fn look_at_box(&mut self, min: Vec3, max: Vec3) {
        let center = (min + max) * 0.5;
        let size = (max - min).length();

        self.target = center;
        self.position = center + Vec3::new(0.0, 0.0, size * 1.5);
        self.near = (size * 0.001).max(0.001);
        self.far = size * 100.0;
        self.min_distance = size * 0.05;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_eq!(camera.up, Vec3::Y);
        assert!(camera.near < camera.far);
    }

    #[test]
    fn test_zoom_decreases_distance() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.target = Vec3::ZERO;

        let initial = camera.position.distance(camera.target);
        camera.zoom(1.0);
        assert!(camera.position.distance(camera.target) < initial);
    }

    #[test]
    fn test_zoom_clamps_to_min_distance() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 1.0);
        camera.zoom(100.0);
        let d = camera.position.distance(camera.target);
        assert!((d - camera.min_distance).abs() < 1e-5);
    }

    #[test]
    fn test_orbit_preserves_radius() {
        let mut camera = Camera::new(1.0);
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.target = Vec3::ZERO;

        camera.orbit(0.3, 0.2);
        let d = camera.position.distance(camera.target);
        assert!((d - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_look_at_box_targets_center() {
        let mut camera = Camera::new(1.0);
        camera.look_at_box(Vec3::ZERO, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(camera.target, Vec3::new(1.0, 2.0, 3.0));
        assert!(camera.position.z > 3.0);
    }

    proptest::proptest! {
        #[test]
        fn prop_orbit_preserves_radius(dx in -3.0_f32..3.0, dy in -3.0_f32..3.0) {
            let mut camera = Camera::new(1.0);
            camera.position = Vec3::new(1.0, 2.0, 4.0);
            camera.target = Vec3::new(0.5, 0.0, 1.0);
            let before = camera.position.distance(camera.target);
            camera.orbit(dx, dy);
            let after = camera.position.distance(camera.target);
            proptest::prop_assert!((before - after).abs() < 1e-3);
        }
    }
}
