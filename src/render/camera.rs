use glam::{Mat4, Vec3};

use crate::scene::Aabb;

/// Perspective camera shared by the display and pick passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(3.0, 1.2, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 50f32.to_radians(),
            aspect: 1.0,
            near: 0.01,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    /// wgpu clip space (depth 0..1).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(1e-6), self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }
}

/// Orbit camera around a pivot, driven by yaw/pitch.
#[derive(Debug, Clone, Copy)]
pub struct CameraController {
    pub position: Vec3,
    pub pivot: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    /// Scene radius used to derive clip planes.
    pub radius: f32,
}

const PITCH_LIMIT: f32 = std::f32::consts::FRAC_PI_2 - 0.01;
const MIN_DISTANCE: f32 = 0.05;

impl CameraController {
    pub fn new(position: Vec3, pivot: Vec3) -> Self {
        let (yaw, pitch) = forward_to_yaw_pitch(pivot - position);
        Self {
            position,
            pivot,
            yaw,
            pitch,
            radius: position.distance(pivot).max(MIN_DISTANCE),
        }
    }

    pub fn from_bounds(bounds: &Aabb) -> Self {
        let center = bounds.center();
        let radius = bounds.extent().max_element();
        let distance = if radius > 0.0 { radius * 3.0 } else { 3.0 };
        let position = center + Vec3::new(distance, distance * 0.4, distance);
        let mut controller = Self::new(position, center);
        controller.radius = radius.max(MIN_DISTANCE);
        controller
    }

    /// Re-centers on `bounds` at a framing distance without changing the view direction.
    pub fn frame_bounds_preserve_orientation(&mut self, bounds: &Aabb) {
        let center = bounds.center();
        let radius = bounds.extent().max_element();
        let distance = if radius > 0.0 { radius * 3.0 } else { 3.0 };
        self.pivot = center;
        self.radius = radius.max(MIN_DISTANCE);
        self.position = center - self.forward() * distance;
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.pivot)
    }

    pub fn forward(&self) -> Vec3 {
        camera_basis(self.yaw, self.pitch).0
    }

    pub fn orbit(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = wrap_angle(self.yaw + yaw_delta);
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        let distance = self.distance().max(MIN_DISTANCE);
        self.position = self.pivot - self.forward() * distance;
    }

    /// Slower zoom close to the pivot so small parts stay reachable.
    pub fn zoom_speed(&self) -> f32 {
        let distance = self.distance();
        if distance > 10.0 {
            1.0
        } else {
            distance / 200.0
        }
    }

    /// Dollies toward the pivot; positive `steps` zoom in.
    pub fn zoom(&mut self, steps: f32) {
        let distance = self.distance();
        let scale = 0.95f32.powf(steps * self.zoom_speed());
        let next = (distance * scale).max(MIN_DISTANCE);
        self.position = self.pivot - self.forward() * next;
    }

    pub fn apply(&self, camera: &mut Camera) {
        let (forward, _right, up) = camera_basis(self.yaw, self.pitch);
        camera.eye = self.position;
        camera.target = self.position + forward;
        camera.up = up;
        let reach = self.distance() + self.radius * 2.0;
        camera.far = reach.max(1.0) * 2.0;
        camera.near = (camera.far / 100_000.0).max(1e-4);
    }
}

fn forward_to_yaw_pitch(forward: Vec3) -> (f32, f32) {
    let n = forward.normalize_or_zero();
    if n == Vec3::ZERO {
        return (0.0, 0.0);
    }
    (n.z.atan2(n.x), n.y.clamp(-1.0, 1.0).asin())
}

fn camera_basis(yaw: f32, pitch: f32) -> (Vec3, Vec3, Vec3) {
    let cos_pitch = pitch.cos();
    let forward = Vec3::new(yaw.cos() * cos_pitch, pitch.sin(), yaw.sin() * cos_pitch);
    let right = Vec3::new(-yaw.sin(), 0.0, yaw.cos());
    let up = right.cross(forward).normalize_or_zero();
    (forward, right, up)
}

fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if angle.is_finite() {
        (angle + PI).rem_euclid(TAU) - PI
    } else {
        angle
    }
}
