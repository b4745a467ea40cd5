//! Constant buffer layouts and binding slots
//!
//! Every struct here is uploaded verbatim. glam stores matrices column-major,
//! which is the layout shader constant buffers read, so no transpose happens
//! on upload.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Point light slots per scene
pub const NUM_LIGHTS: usize = 2;

/// Upper bound of bones a skinned model can drive
pub const MAX_NUM_BONES: usize = 256;

/// Constant buffer slots
pub mod cb_slot {
    pub const CAMERA: u32 = 0;
    pub const PROJECTION: u32 = 1;
    pub const OBJECT: u32 = 2;
    pub const LIGHTS: u32 = 3;
    pub const SKINNING: u32 = 4;
    /// The shadow pass binds its matrices at slot 0
    pub const SHADOW_MATRIX: u32 = 0;
}

/// Pixel shader resource and sampler slots
pub mod srv_slot {
    pub const DIFFUSE: u32 = 0;
    pub const NORMAL: u32 = 1;
    pub const SHADOW_MAP: u32 = 2;
    pub const SKYBOX: u32 = 3;
}

/// Slot of the shadow map rendered from light `index`
///
/// Light 0 keeps slot 2; the skybox owns slot 3, so later lights start at 4.
pub const fn shadow_map_slot(index: usize) -> u32 {
    if index == 0 {
        srv_slot::SHADOW_MAP
    } else {
        srv_slot::SKYBOX + index as u32
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CbChangeOnCameraMovement {
    pub view: Mat4,
    pub camera_position: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CbChangeOnResize {
    pub projection: Mat4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CbChangesEveryFrame {
    pub world: Mat4,
    pub output_color: Vec4,
    pub has_normal_map: u32,
    pub _padding: [u32; 3],
}

impl CbChangesEveryFrame {
    pub fn new(world: Mat4, output_color: Vec4, has_normal_map: bool) -> Self {
        Self {
            world,
            output_color,
            has_normal_map: has_normal_map as u32,
            _padding: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PointLightConstants {
    pub position: Vec4,
    pub color: Vec4,
    /// (d, d, d², d²)
    pub attenuation_distance: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CbLights {
    pub point_lights: [PointLightConstants; NUM_LIGHTS],
    pub light_views: [Mat4; NUM_LIGHTS],
    pub light_projections: [Mat4; NUM_LIGHTS],
}

impl Default for CbLights {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CbShadowMatrix {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub is_voxel: u32,
    pub _padding: [u32; 3],
}

impl CbShadowMatrix {
    pub fn new(world: Mat4, view: Mat4, projection: Mat4, is_voxel: bool) -> Self {
        Self {
            world,
            view,
            projection,
            is_voxel: is_voxel as u32,
            _padding: [0; 3],
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CbSkinning {
    pub bone_transforms: [Mat4; MAX_NUM_BONES],
}

impl CbSkinning {
    /// Copy `transforms` into the leading slots; the rest stay identity.
    pub fn from_transforms(transforms: &[Mat4]) -> Self {
        let mut cb = Self {
            bone_transforms: [Mat4::IDENTITY; MAX_NUM_BONES],
        };
        let count = transforms.len().min(MAX_NUM_BONES);
        cb.bone_transforms[..count].copy_from_slice(&transforms[..count]);
        cb
    }
}

static_assertions::const_assert_eq!(std::mem::size_of::<CbChangeOnCameraMovement>(), 80);
static_assertions::const_assert_eq!(std::mem::size_of::<CbChangeOnResize>(), 64);
static_assertions::const_assert_eq!(std::mem::size_of::<CbChangesEveryFrame>(), 96);
static_assertions::const_assert_eq!(std::mem::size_of::<PointLightConstants>(), 48);
static_assertions::const_assert_eq!(std::mem::size_of::<CbShadowMatrix>(), 208);
static_assertions::const_assert_eq!(std::mem::size_of::<CbSkinning>(), 64 * MAX_NUM_BONES);
static_assertions::const_assert_eq!(std::mem::size_of::<CbLights>() % 16, 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadow_map_slots_skip_skybox() {
        assert_eq!(shadow_map_slot(0), 2);
        assert_eq!(shadow_map_slot(1), 4);
        assert_ne!(shadow_map_slot(1), srv_slot::SKYBOX);
    }

    #[test]
    fn test_flags_are_written_as_u32() {
        let cb = CbChangesEveryFrame::new(Mat4::IDENTITY, Vec4::ONE, true);
        let bytes = bytemuck::bytes_of(&cb);
        assert_eq!(&bytes[80..84], &1u32.to_ne_bytes());

        let cb = CbShadowMatrix::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY, true);
        assert_eq!(&bytemuck::bytes_of(&cb)[192..196], &1u32.to_ne_bytes());
    }

    #[test]
    fn test_matrices_upload_column_major() {
        let translation = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let cb = CbChangeOnResize {
            projection: translation,
        };
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&cb));
        // Translation lives in the fourth column
        assert_eq!(&floats[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_skinning_pads_with_identity() {
        let bones = [Mat4::from_scale(glam::Vec3::splat(2.0))];
        let cb = CbSkinning::from_transforms(&bones);
        assert_eq!(cb.bone_transforms[0], bones[0]);
        assert_eq!(cb.bone_transforms[1], Mat4::IDENTITY);
    }
}
