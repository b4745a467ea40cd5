//! Point lights

use glam::{Mat4, Vec3, Vec4};

use crate::renderer::constants::PointLightConstants;

/// How a light moves each update
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LightMotion {
    #[default]
    Static,
    /// Orbit the world Y axis
    RotateY { radians_per_second: f32 },
}

impl LightMotion {
    /// The orbiting light used in the demo scenes
    pub const ORBIT: LightMotion = LightMotion::RotateY {
        radians_per_second: -2.0,
    };
}

/// A shadow-casting point light
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    position: Vec4,
    color: Vec4,
    attenuation_distance: f32,
    motion: LightMotion,
    eye: Vec3,
    at: Vec3,
    up: Vec3,
    view: Mat4,
    projection: Mat4,
}

impl PointLight {
    /// Field of view of the light's shadow projection
    pub const SHADOW_FOV: f32 = std::f32::consts::FRAC_PI_2;
    pub const SHADOW_NEAR: f32 = 0.01;
    pub const SHADOW_FAR: f32 = 1000.0;

    pub fn new(position: Vec3, color: Vec4, attenuation_distance: f32) -> Self {
        let mut light = Self {
            position: position.extend(1.0),
            color,
            attenuation_distance,
            motion: LightMotion::Static,
            eye: position,
            at: Vec3::ZERO,
            up: Vec3::Y,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        light.update_view();
        light
    }

    pub fn with_motion(mut self, motion: LightMotion) -> Self {
        self.motion = motion;
        self
    }

    /// Build the shadow projection for a target of `width` x `height`
    pub fn initialize(&mut self, width: u32, height: u32) {
        let aspect = width as f32 / height.max(1) as f32;
        self.projection =
            Mat4::perspective_lh(Self::SHADOW_FOV, aspect, Self::SHADOW_NEAR, Self::SHADOW_FAR);
    }

    pub fn update(&mut self, delta_time: f32) {
        match self.motion {
            LightMotion::Static => {}
            LightMotion::RotateY { radians_per_second } => {
                let rotation = Mat4::from_rotation_y(radians_per_second * delta_time);
                self.position = rotation * self.position;
                self.update_view();
            }
        }
    }

    fn update_view(&mut self) {
        self.eye = self.position.truncate();
        self.at = Vec3::ZERO;
        // Looking straight down the Y axis would leave the view undefined
        let dir = (self.at - self.eye).normalize_or_zero();
        self.up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
            Vec3::Z
        } else {
            Vec3::Y
        };
        if self.eye != self.at {
            self.view = Mat4::look_at_lh(self.eye, self.at, self.up);
        }
    }

    pub fn constants(&self) -> PointLightConstants {
        let d = self.attenuation_distance;
        PointLightConstants {
            position: self.position,
            color: self.color,
            attenuation_distance: Vec4::new(d, d, d * d, d * d),
        }
    }

    pub fn position(&self) -> Vec4 {
        self.position
    }

    pub fn color(&self) -> Vec4 {
        self.color
    }

    pub fn attenuation_distance(&self) -> f32 {
        self.attenuation_distance
    }

    pub fn motion(&self) -> LightMotion {
        self.motion
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }
}

/// Fixed-capacity, index-addressed light slots
#[derive(Debug, Clone)]
pub struct LightArray<const N: usize> {
    slots: [Option<PointLight>; N],
}

impl<const N: usize> Default for LightArray<N> {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl<const N: usize> LightArray<N> {
    pub const CAPACITY: usize = N;

    /// Store `light` at `index`; out-of-range indices leave the array unchanged.
    pub fn set(&mut self, index: usize, light: PointLight) -> Result<(), PointLight> {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some(light);
                Ok(())
            }
            None => Err(light),
        }
    }

    pub fn get(&self, index: usize) -> Option<&PointLight> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Occupied slots with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PointLight)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|light| (i, light)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PointLight> {
        self.slots.iter_mut().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light() -> PointLight {
        PointLight::new(Vec3::new(4.0, 2.0, 0.0), Vec4::ONE, 10.0)
    }

    #[test]
    fn test_attenuation_is_precomputed() {
        let constants = light().constants();
        assert_eq!(constants.attenuation_distance, Vec4::new(10.0, 10.0, 100.0, 100.0));
    }

    #[test]
    fn test_static_light_does_not_move() {
        let mut light = light();
        light.update(1.0);
        assert_eq!(light.position(), Vec4::new(4.0, 2.0, 0.0, 1.0));
    }

    #[test]
    fn test_rotation_is_cumulative() {
        let mut a = light().with_motion(LightMotion::ORBIT);
        let mut b = a.clone();
        a.update(0.25);
        a.update(0.5);
        b.update(0.75);
        assert!((a.position() - b.position()).length() < 1e-5);
        // Orbiting keeps the height and distance to the Y axis
        assert!((a.position().y - 2.0).abs() < 1e-6);
        assert!((a.position().truncate().length() - light().position().truncate().length()).abs() < 1e-5);
    }

    #[test]
    fn test_view_looks_at_origin() {
        let light = light();
        let origin_in_view = light.view().transform_point3(Vec3::ZERO);
        // Left-handed view space looks down +Z
        assert!(origin_in_view.z > 0.0);
        assert!(origin_in_view.x.abs() < 1e-4 && origin_in_view.y.abs() < 1e-4);
    }

    #[test]
    fn test_light_array_bounds() {
        let mut lights = LightArray::<2>::default();
        assert!(lights.set(1, light()).is_ok());
        assert!(lights.set(2, light()).is_err());
        assert!(lights.get(0).is_none());
        assert!(lights.get(1).is_some());
        assert!(lights.get(7).is_none());
        assert_eq!(lights.iter().map(|(i, _)| i).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_projection_uses_aspect() {
        let mut light = light();
        light.initialize(800, 400);
        let expected = Mat4::perspective_lh(PointLight::SHADOW_FOV, 2.0, 0.01, 1000.0);
        assert_eq!(light.projection(), expected);
    }
}
