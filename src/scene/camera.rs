//! First-person camera

use glam::{EulerRot, Mat4, Vec3};

use crate::backend::{BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsDevice};
use crate::input::{DirectionsInput, MouseRelativeMovement};
use crate::renderer::constants::CbChangeOnCameraMovement;

const DEFAULT_FORWARD: Vec3 = Vec3::Z;
const DEFAULT_RIGHT: Vec3 = Vec3::X;

/// Camera start position and speeds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    /// World units per second
    pub travel_speed: f32,
    /// Radians per mouse unit per second
    pub rotation_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 3.0, -6.0),
            travel_speed: 10.0,
            rotation_speed: 1.0,
        }
    }
}

/// Free-fly camera driven by directional keys and mouse deltas
#[derive(Debug, Clone)]
pub struct Camera {
    /// Current yaw angle (horizontal rotation) in radians
    yaw: f32,
    /// Current pitch angle (vertical rotation) in radians
    pitch: f32,
    move_left_right: f32,
    move_back_forward: f32,
    move_up_down: f32,
    travel_speed: f32,
    rotation_speed: f32,
    eye: Vec3,
    at: Vec3,
    up: Vec3,
    view: Mat4,
    constant_buffer: Option<BufferHandle>,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

impl Camera {
    /// Clamp keeping the view from flipping over the poles
    pub const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

    pub fn new(config: CameraConfig) -> Self {
        let eye = config.position;
        let at = eye + DEFAULT_FORWARD;
        let up = Vec3::Y;
        Self {
            yaw: 0.0,
            pitch: 0.0,
            move_left_right: 0.0,
            move_back_forward: 0.0,
            move_up_down: 0.0,
            travel_speed: config.travel_speed,
            rotation_speed: config.rotation_speed,
            eye,
            at,
            up,
            view: Mat4::look_at_lh(eye, at, up),
            constant_buffer: None,
        }
    }

    /// Create the camera's constant buffer
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        let constants = self.constants();
        let buffer = device.create_buffer(
            &BufferDescriptor::new(
                "Camera Constant Buffer",
                std::mem::size_of::<CbChangeOnCameraMovement>() as u64,
                BufferUsage::CONSTANT,
            ),
            Some(bytemuck::bytes_of(&constants)),
        )?;
        self.constant_buffer = Some(buffer);
        Ok(())
    }

    /// Accumulate movement and rotation for the next [`update`](Self::update)
    pub fn handle_input(
        &mut self,
        directions: &DirectionsInput,
        mouse: &MouseRelativeMovement,
        delta_time: f32,
    ) {
        let step = self.travel_speed * delta_time;
        if directions.front {
            self.move_back_forward += step;
        }
        if directions.back {
            self.move_back_forward -= step;
        }
        if directions.left {
            self.move_left_right -= step;
        }
        if directions.right {
            self.move_left_right += step;
        }
        if directions.up {
            self.move_up_down += step;
        }
        if directions.down {
            self.move_up_down -= step;
        }

        if !mouse.is_zero() {
            let turn = self.rotation_speed * delta_time;
            self.yaw += mouse.x as f32 * turn;
            self.pitch = (self.pitch + mouse.y as f32 * turn).clamp(-Self::MAX_PITCH, Self::MAX_PITCH);
            self.yaw %= std::f32::consts::TAU;
        }
    }

    /// Apply accumulated movement and rebuild the view matrix
    pub fn update(&mut self, _delta_time: f32) {
        let rotation = Mat4::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0);
        let look = rotation.transform_vector3(DEFAULT_FORWARD).normalize();

        let yaw_only = Mat4::from_rotation_y(self.yaw);
        let right = yaw_only.transform_vector3(DEFAULT_RIGHT);
        let forward = yaw_only.transform_vector3(DEFAULT_FORWARD);

        self.eye += right * self.move_left_right
            + forward * self.move_back_forward
            + Vec3::Y * self.move_up_down;
        self.move_left_right = 0.0;
        self.move_back_forward = 0.0;
        self.move_up_down = 0.0;

        self.at = self.eye + look;
        self.up = rotation.transform_vector3(Vec3::Y).normalize();
        self.view = Mat4::look_at_lh(self.eye, self.at, self.up);
    }

    pub fn constants(&self) -> CbChangeOnCameraMovement {
        CbChangeOnCameraMovement {
            view: self.view,
            camera_position: self.eye.extend(1.0),
        }
    }

    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    pub fn at(&self) -> Vec3 {
        self.at
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn constant_buffer(&self) -> Option<BufferHandle> {
        self.constant_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    #[test]
    fn test_starts_at_configured_position() {
        let camera = Camera::default();
        assert_eq!(camera.eye(), Vec3::new(0.0, 3.0, -6.0));
        assert!(approx(camera.at(), Vec3::new(0.0, 3.0, -5.0)));
    }

    #[test]
    fn test_update_without_input_is_idempotent() {
        let mut camera = Camera::default();
        camera.update(0.016);
        let view = camera.view();
        camera.update(0.016);
        camera.update(0.5);
        assert_eq!(camera.view(), view);
    }

    #[test]
    fn test_forward_moves_along_look_direction() {
        let mut camera = Camera::default();
        let directions = DirectionsInput {
            front: true,
            ..Default::default()
        };
        camera.handle_input(&directions, &MouseRelativeMovement::default(), 0.5);
        camera.update(0.5);
        assert!(approx(camera.eye(), Vec3::new(0.0, 3.0, -1.0)));
    }

    #[test]
    fn test_movement_is_consumed_by_update() {
        let mut camera = Camera::default();
        let directions = DirectionsInput {
            up: true,
            ..Default::default()
        };
        camera.handle_input(&directions, &MouseRelativeMovement::default(), 0.1);
        camera.update(0.1);
        let eye = camera.eye();
        camera.update(0.1);
        assert_eq!(camera.eye(), eye);
        assert!(approx(eye, Vec3::new(0.0, 4.0, -6.0)));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut camera = Camera::default();
        let mouse = MouseRelativeMovement::new(0, 10_000);
        camera.handle_input(&DirectionsInput::default(), &mouse, 1.0);
        assert!((camera.pitch() - Camera::MAX_PITCH).abs() < 1e-6);

        let mouse = MouseRelativeMovement::new(0, -100_000);
        camera.handle_input(&DirectionsInput::default(), &mouse, 1.0);
        assert!((camera.pitch() + Camera::MAX_PITCH).abs() < 1e-6);
    }

    #[test]
    fn test_yaw_turns_toward_positive_x() {
        let mut camera = Camera::default();
        let turn = std::f32::consts::FRAC_PI_2;
        camera.handle_input(
            &DirectionsInput::default(),
            &MouseRelativeMovement::new(1, 0),
            turn,
        );
        camera.update(0.0);
        assert!(approx(camera.at() - camera.eye(), Vec3::X));
    }
}
