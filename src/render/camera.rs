use glam::{Mat4, Vec3};
use std::f32::consts::{PI, TAU};

const POLAR_EPSILON: f32 = 1e-6;
const ZOOM_STEP: f32 = 0.95;

/// Damped orbit camera around a target point.
///
/// Input accumulates deltas; [`OrbitControls::update`] applies a fraction of
/// them every frame so motion eases out after the pointer is released.
#[derive(Debug, Clone, Copy)]
pub struct OrbitControls {
    pub target: Vec3,
    position: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub damping_factor: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    theta_delta: f32,
    phi_delta: f32,
    pan_offset: Vec3,
    scale: f32,
}

impl OrbitControls {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            target,
            position,
            fov_y_degrees: 45.0,
            near: 0.1,
            far: 1000.0,
            damping_factor: 0.02,
            min_distance: 0.0,
            max_distance: 9.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI / 2.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            pan_offset: Vec3::ZERO,
            scale: 1.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            aspect.max(1e-4),
            self.near,
            self.far,
        )
    }

    /// Drag by a pixel delta; a full viewport height turns by one revolution.
    pub fn rotate(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        self.theta_delta -= TAU * dx / height;
        self.phi_delta -= TAU * dy / height;
    }

    /// Positive steps move closer.
    pub fn zoom(&mut self, steps: f32) {
        self.scale *= ZOOM_STEP.powf(steps);
    }

    /// Screen-space pan by a pixel delta.
    pub fn pan(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        let height = viewport_height.max(1.0);
        let distance =
            (self.position - self.target).length() * (self.fov_y_degrees.to_radians() * 0.5).tan();
        let camera = self.view_matrix().inverse();
        let right = camera.x_axis.truncate();
        let up = camera.y_axis.truncate();
        self.pan_offset -= right * (2.0 * dx * distance / height);
        self.pan_offset += up * (2.0 * dy * distance / height);
    }

    /// Apply pending input. Returns whether the camera moved noticeably.
    pub fn update(&mut self) -> bool {
        let previous = self.position;
        let previous_target = self.target;
        let offset = self.position - self.target;

        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (offset.x.atan2(offset.z), (offset.y / radius).clamp(-1.0, 1.0).acos())
        } else {
            (0.0, 0.0)
        };

        theta += self.theta_delta * self.damping_factor;
        phi += self.phi_delta * self.damping_factor;
        phi = phi
            .clamp(self.min_polar_angle, self.max_polar_angle.max(self.min_polar_angle))
            .clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        self.target += self.pan_offset * self.damping_factor;

        let sin_phi = phi.sin();
        let offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        self.position = self.target + offset;

        let decay = 1.0 - self.damping_factor;
        self.theta_delta *= decay;
        self.phi_delta *= decay;
        self.pan_offset *= decay;
        self.scale = 1.0;

        previous.distance_squared(self.position) > 1e-12
            || previous_target.distance_squared(self.target) > 1e-12
    }
}
