use winit::keyboard::KeyCode;

use super::fly_camera::FlyCamera;
use crate::config::CameraSettings;

/// Keyboard steering for a [`FlyCamera`].
///
/// | Key        | Action                      |
/// |------------|-----------------------------|
/// | Up / Down  | move forward / backward     |
/// | Left/Right | turn left / right           |
/// | W / S      | raise / lower               |
pub struct CameraController {
    pub move_step: f32,
    pub aim_step: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::from_settings(&CameraSettings::default())
    }
}

impl CameraController {
    pub fn new(move_step: f32, aim_step: f32) -> Self {
        Self {
            move_step,
            aim_step,
        }
    }

    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(settings.move_step, settings.aim_step)
    }

    /// Applies one key press. Returns `true` if the key moved the camera.
    pub fn process_key(&self, key_code: KeyCode, camera: &mut FlyCamera) -> bool {
        match key_code {
            KeyCode::ArrowUp => camera.move_forward(self.move_step),
            KeyCode::ArrowDown => camera.move_backward(self.move_step),
            KeyCode::ArrowLeft => camera.aim(self.aim_step, 0.0),
            KeyCode::ArrowRight => camera.aim(-self.aim_step, 0.0),
            KeyCode::KeyW => camera.raise(self.move_step),
            KeyCode::KeyS => camera.raise(-self.move_step),
            _ => return false,
        }
        camera.update();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_key_map() {
        let controller = CameraController::default();
        let mut camera = FlyCamera::default();

        assert!(controller.process_key(KeyCode::KeyW, &mut camera));
        assert_relative_eq!(camera.position.y, 1.0);
        assert!(controller.process_key(KeyCode::ArrowUp, &mut camera));
        assert_relative_eq!(camera.position.z, -1.0, epsilon = 1e-6);

        let angle = camera.horizontal_angle;
        assert!(controller.process_key(KeyCode::ArrowLeft, &mut camera));
        assert_relative_eq!(camera.horizontal_angle, angle + 0.1);

        assert!(!controller.process_key(KeyCode::KeyZ, &mut camera));
    }
}
