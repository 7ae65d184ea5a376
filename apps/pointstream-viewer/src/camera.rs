//! Viewer camera: pose from the scene bounds, optional orbit.

use glam::{Mat3, Mat4, Vec3};
use pointstream_core::Aabb;

/// Orbit speed of the benchmark camera, degrees per second.
const ORBIT_SPEED_DEG: f32 = 10.0;

/// Camera for rendering; Z-up, right-handed.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    /// Initial pose for a scene: above and in front of the box, looking at
    /// its center, with clip planes scaled to the box diagonal.
    pub fn frame_scene(scene: &Aabb, aspect: f32) -> Self {
        let center = scene.center();
        let diag = scene.diagonal();
        Self {
            position: center + Vec3::new(0.5, 0.7, 1.0) * diag,
            target: center,
            up: Vec3::Z,
            fov: std::f32::consts::FRAC_PI_4,
            aspect,
            z_near: (diag * 0.001).max(0.01),
            z_far: diag * 4.0,
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect, self.z_near, self.z_far)
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Rotate the position around the target about the scene Z axis.
    pub fn orbit(&mut self, dt: f32) {
        let rot = Mat3::from_rotation_z(ORBIT_SPEED_DEG.to_radians() * dt);
        let offset = self.position - self.target;
        self.position = self.target + rot * offset;
    }
}
