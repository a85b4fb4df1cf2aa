use cgmath::*;

use super::camera_utils::{convert_matrix4_to_array, Camera, CameraUniform};
use crate::config::CameraSettings;

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Free-look camera steered by two aim angles.
///
/// With both angles at their defaults (horizontal π, vertical 0) the camera
/// looks down the negative Z axis.
#[derive(Debug, Clone, Copy)]
pub struct FlyCamera {
    pub position: Vector3<f32>,
    pub horizontal_angle: f32,
    pub vertical_angle: f32,
    direction: Vector3<f32>,
    right: Vector3<f32>,
    up: Vector3<f32>,
    view: Matrix4<f32>,
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
    pub uniform: CameraUniform,
}

impl Camera for FlyCamera {
    fn build_view_projection_matrix(&self) -> Matrix4<f32> {
        self.projection() * self.view
    }
}

impl Default for FlyCamera {
    fn default() -> Self {
        let mut camera = Self {
            position: Vector3::zero(),
            horizontal_angle: std::f32::consts::PI,
            vertical_angle: 0.0,
            direction: Vector3::zero(),
            right: Vector3::zero(),
            up: Vector3::unit_y(),
            view: Matrix4::identity(),
            aspect: 1.0,
            fovy: Deg(45.0).into(),
            znear: 0.1,
            zfar: 10000.0,
            uniform: CameraUniform::default(),
        };
        camera.aim(0.0, 0.0);
        camera.update();
        camera
    }
}

impl FlyCamera {
    /// Camera raised to `settings.height` and pulled back by `settings.distance`.
    pub fn from_settings(settings: &CameraSettings) -> Self {
        let mut camera = Self {
            fovy: Deg(settings.fov_y_degrees).into(),
            znear: settings.near,
            zfar: settings.far,
            ..Self::default()
        };
        camera.position.y = settings.height;
        camera.move_backward(settings.distance);
        camera.update();
        camera
    }

    /// Turns the camera by the given angle deltas in radians.
    pub fn aim(&mut self, horizontal: f32, vertical: f32) {
        self.horizontal_angle += horizontal;
        self.vertical_angle += vertical;

        let (h, v) = (self.horizontal_angle, self.vertical_angle);
        self.direction = Vector3::new(v.cos() * h.sin(), v.sin(), v.cos() * h.cos());
        let side = h - std::f32::consts::FRAC_PI_2;
        self.right = Vector3::new(side.sin(), 0.0, side.cos());
        self.up = self.right.cross(self.direction);
    }

    pub fn move_forward(&mut self, amount: f32) {
        self.position += self.direction * amount;
    }

    pub fn move_backward(&mut self, amount: f32) {
        self.move_forward(-amount);
    }

    pub fn move_right(&mut self, amount: f32) {
        self.position += self.right * amount;
    }

    pub fn move_left(&mut self, amount: f32) {
        self.move_right(-amount);
    }

    pub fn raise(&mut self, amount: f32) {
        self.position.y += amount;
    }

    /// Recomputes the view matrix after moving or aiming.
    pub fn update(&mut self) {
        let eye = Point3::from_vec(self.position);
        self.view = Matrix4::look_at_rh(eye, eye + self.direction, self.up);
    }

    pub fn resize_projection(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.direction
    }

    pub fn right(&self) -> Vector3<f32> {
        self.right
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn view(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn projection(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }

    pub fn update_view_proj(&mut self) {
        self.uniform.view_position = [self.position.x, self.position.y, self.position.z, 1.0];
        self.uniform.view = convert_matrix4_to_array(self.view);
        self.uniform.projection = convert_matrix4_to_array(self.projection());
        self.uniform.view_proj = convert_matrix4_to_array(self.build_view_projection_matrix());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = FlyCamera::default();
        assert_relative_eq!(camera.direction().z, -1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.direction().x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(camera.right().x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.up().y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_initial_pose_from_settings() {
        let camera = FlyCamera::from_settings(&CameraSettings::default());
        assert_relative_eq!(camera.position.y, 4.0, epsilon = 1e-5);
        assert_relative_eq!(camera.position.z, 28.0, epsilon = 1e-4);

        // the origin is straight ahead
        let origin = camera.view() * Vector4::new(0.0, 4.0, 0.0, 1.0);
        assert_relative_eq!(origin.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(origin.z, -28.0, epsilon = 1e-4);
    }

    #[test]
    fn test_aim_turns_around_vertical_axis() {
        let mut camera = FlyCamera::default();
        camera.aim(std::f32::consts::FRAC_PI_2, 0.0);
        assert_relative_eq!(camera.direction().x, -1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.direction().z, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_movement_follows_direction() {
        let mut camera = FlyCamera::default();
        camera.move_forward(2.0);
        camera.raise(1.0);
        assert_relative_eq!(camera.position.z, -2.0, epsilon = 1e-6);
        assert_relative_eq!(camera.position.y, 1.0);
        camera.move_right(1.0);
        assert_relative_eq!(camera.position.x, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_uniform_holds_matrices() {
        let mut camera = FlyCamera::from_settings(&CameraSettings::default());
        camera.resize_projection(1200, 800);
        camera.update_view_proj();
        assert_relative_eq!(camera.aspect, 1.5);
        assert_eq!(camera.uniform.view, convert_matrix4_to_array(camera.view()));
        assert_eq!(camera.uniform.view_position[1], camera.position.y);
    }
}
