//! Drawable objects
//!
//! Plain meshes, skinned models, instanced voxels and the skybox share one
//! [`Renderable`] type. Variant data lives in [`RenderableKind`].

use std::rc::Rc;

use glam::{EulerRot, Mat4, Vec3, Vec4};

use super::animation::Skinning;
use crate::backend::{BackendResult, BufferDescriptor, BufferHandle, BufferUsage, GraphicsDevice};
use crate::renderer::constants::{CbChangesEveryFrame, CbSkinning};
use crate::resources::{BasicMeshEntry, InstanceData, Material, MeshData, Texture};
use crate::shader::{PixelShader, VertexShader};

#[derive(Debug, Clone)]
pub enum RenderableKind {
    Mesh,
    /// Skinned mesh with bone influences in the third vertex slot
    Model { skinning: Skinning },
    /// Mesh drawn once per instance transform
    Voxel { instances: Vec<InstanceData> },
    /// Environment sphere drawn around the camera
    Skybox,
}

/// Per-frame transform animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// Scale, spin in place, move out, then orbit around the origin.
    /// The world matrix is rebuilt from accumulated time.
    Orbit {
        scale: Vec3,
        spin_axis: Vec3,
        spin_rate: f32,
        translation: Vec3,
        orbit_axis: Vec3,
        orbit_rate: f32,
    },
    /// Rotate about a local axis
    Spin { axis: Vec3, radians_per_second: f32 },
}

impl Behavior {
    /// Half-size cube circling the X axis four units out
    pub const ORBITING_CUBE: Behavior = Behavior::Orbit {
        scale: Vec3::new(0.5, 0.5, 0.5),
        spin_axis: Vec3::Z,
        spin_rate: -1.0,
        translation: Vec3::new(0.0, 4.0, 0.0),
        orbit_axis: Vec3::X,
        orbit_rate: -2.0,
    };

    /// Smaller cube circling the Y axis
    pub const SATELLITE: Behavior = Behavior::Orbit {
        scale: Vec3::new(0.3, 0.3, 0.3),
        spin_axis: Vec3::Z,
        spin_rate: -1.0,
        translation: Vec3::new(-4.0, 0.0, 0.0),
        orbit_axis: Vec3::Y,
        orbit_rate: -2.0,
    };

    /// World matrix of an orbiting object after `time` seconds
    pub fn orbit_world(
        scale: Vec3,
        spin: (Vec3, f32),
        translation: Vec3,
        orbit: (Vec3, f32),
        time: f32,
    ) -> Mat4 {
        Mat4::from_axis_angle(orbit.0.normalize(), orbit.1 * time)
            * Mat4::from_translation(translation)
            * Mat4::from_axis_angle(spin.0.normalize(), spin.1 * time)
            * Mat4::from_scale(scale)
    }
}

/// GPU buffers of an initialized renderable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderableBuffers {
    pub vertex: BufferHandle,
    pub normal: Option<BufferHandle>,
    pub index: BufferHandle,
    pub constant: BufferHandle,
    /// Instance transforms of a voxel, or bone influences of a model
    pub extra: Option<BufferHandle>,
    pub skinning: Option<BufferHandle>,
}

#[derive(Debug, Clone)]
pub struct Renderable {
    kind: RenderableKind,
    mesh: MeshData,
    materials: Vec<Material>,
    output_color: Vec4,
    world: Mat4,
    behavior: Option<Behavior>,
    elapsed: f32,
    vertex_shader: Option<Rc<VertexShader>>,
    pixel_shader: Option<Rc<PixelShader>>,
    buffers: Option<RenderableBuffers>,
}

impl Renderable {
    fn with_kind(kind: RenderableKind, mesh: MeshData) -> Self {
        Self {
            kind,
            mesh,
            materials: Vec::new(),
            output_color: Vec4::ONE,
            world: Mat4::IDENTITY,
            behavior: None,
            elapsed: 0.0,
            vertex_shader: None,
            pixel_shader: None,
            buffers: None,
        }
    }

    pub fn new(mesh: MeshData) -> Self {
        Self::with_kind(RenderableKind::Mesh, mesh)
    }

    pub fn model(mesh: MeshData, skinning: Skinning) -> Self {
        Self::with_kind(RenderableKind::Model { skinning }, mesh)
    }

    pub fn voxel(mesh: MeshData, instances: Vec<InstanceData>) -> Self {
        Self::with_kind(RenderableKind::Voxel { instances }, mesh)
    }

    /// Skybox sampling `texture`; the mesh is seen from inside
    pub fn skybox(mesh: MeshData, texture: Rc<Texture>) -> Self {
        Self::with_kind(RenderableKind::Skybox, mesh)
            .with_materials(vec![Material::new("skybox").with_diffuse(texture)])
    }

    pub fn with_materials(mut self, materials: Vec<Material>) -> Self {
        self.materials = materials;
        self
    }

    pub fn with_output_color(mut self, color: Vec4) -> Self {
        self.output_color = color;
        self
    }

    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn kind(&self) -> &RenderableKind {
        &self.kind
    }

    pub fn is_skybox(&self) -> bool {
        matches!(self.kind, RenderableKind::Skybox)
    }

    pub fn is_voxel(&self) -> bool {
        matches!(self.kind, RenderableKind::Voxel { .. })
    }

    pub fn skinning(&self) -> Option<&Skinning> {
        match &self.kind {
            RenderableKind::Model { skinning } => Some(skinning),
            _ => None,
        }
    }

    pub fn instances(&self) -> &[InstanceData] {
        match &self.kind {
            RenderableKind::Voxel { instances } => instances,
            _ => &[],
        }
    }

    pub fn num_instances(&self) -> u32 {
        self.instances().len() as u32
    }

    // Transform helpers. Each applies before the current world transform.

    pub fn rotate_x(&mut self, angle: f32) {
        self.world *= Mat4::from_rotation_x(angle);
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.world *= Mat4::from_rotation_y(angle);
    }

    pub fn rotate_z(&mut self, angle: f32) {
        self.world *= Mat4::from_rotation_z(angle);
    }

    /// Roll about Z, then pitch about X, then yaw about Y
    pub fn rotate_roll_pitch_yaw(&mut self, roll: f32, pitch: f32, yaw: f32) {
        self.world *= Mat4::from_euler(EulerRot::YXZ, yaw, pitch, roll);
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.world *= Mat4::from_scale(Vec3::new(x, y, z));
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.world *= Mat4::from_translation(offset);
    }

    pub fn world(&self) -> Mat4 {
        self.world
    }

    pub fn set_world(&mut self, world: Mat4) {
        self.world = world;
    }

    pub fn update(&mut self, delta_time: f32) {
        match self.behavior {
            Some(Behavior::Orbit {
                scale,
                spin_axis,
                spin_rate,
                translation,
                orbit_axis,
                orbit_rate,
            }) => {
                self.elapsed += delta_time;
                self.world = Behavior::orbit_world(
                    scale,
                    (spin_axis, spin_rate),
                    translation,
                    (orbit_axis, orbit_rate),
                    self.elapsed,
                );
            }
            Some(Behavior::Spin {
                axis,
                radians_per_second,
            }) => {
                self.elapsed += delta_time;
                self.world *= Mat4::from_axis_angle(axis.normalize(), radians_per_second * delta_time);
            }
            None => {}
        }
        if let RenderableKind::Model { skinning } = &mut self.kind {
            skinning.update(delta_time);
        }
    }

    /// Create the GPU buffers and upload material textures
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        let vertex = device.create_buffer(
            &BufferDescriptor::new(
                "Vertex Buffer",
                self.mesh.vertex_bytes().len() as u64,
                BufferUsage::VERTEX,
            ),
            Some(self.mesh.vertex_bytes()),
        )?;
        let normal = if self.mesh.normals.is_empty() {
            None
        } else {
            Some(device.create_buffer(
                &BufferDescriptor::new(
                    "Normal Buffer",
                    self.mesh.normal_bytes().len() as u64,
                    BufferUsage::VERTEX,
                ),
                Some(self.mesh.normal_bytes()),
            )?)
        };
        let index = device.create_buffer(
            &BufferDescriptor::new(
                "Index Buffer",
                self.mesh.index_bytes().len() as u64,
                BufferUsage::INDEX,
            ),
            Some(self.mesh.index_bytes()),
        )?;
        let constants = self.constants(self.world);
        let constant = device.create_buffer(
            &BufferDescriptor::new(
                "Renderable Constant Buffer",
                std::mem::size_of::<CbChangesEveryFrame>() as u64,
                BufferUsage::CONSTANT,
            ),
            Some(bytemuck::bytes_of(&constants)),
        )?;

        let (extra, skinning) = match &self.kind {
            RenderableKind::Voxel { instances } if !instances.is_empty() => {
                let bytes: &[u8] = bytemuck::cast_slice(instances);
                let buffer = device.create_buffer(
                    &BufferDescriptor::new("Instance Buffer", bytes.len() as u64, BufferUsage::VERTEX),
                    Some(bytes),
                )?;
                (Some(buffer), None)
            }
            RenderableKind::Model { skinning } => {
                let influences: &[u8] = bytemuck::cast_slice(skinning.animation_data());
                let animation = if influences.is_empty() {
                    None
                } else {
                    Some(device.create_buffer(
                        &BufferDescriptor::new(
                            "Animation Buffer",
                            influences.len() as u64,
                            BufferUsage::VERTEX,
                        ),
                        Some(influences),
                    )?)
                };
                let bones = CbSkinning::from_transforms(skinning.bone_transforms());
                let cb = device.create_buffer(
                    &BufferDescriptor::new(
                        "Skinning Constant Buffer",
                        std::mem::size_of::<CbSkinning>() as u64,
                        BufferUsage::CONSTANT,
                    ),
                    Some(bytemuck::bytes_of(&bones)),
                )?;
                (animation, Some(cb))
            }
            _ => (None, None),
        };

        for material in &self.materials {
            material.initialize(device)?;
        }

        self.buffers = Some(RenderableBuffers {
            vertex,
            normal,
            index,
            constant,
            extra,
            skinning,
        });
        Ok(())
    }

    /// Per-object constants for drawing with `world`
    pub fn constants(&self, world: Mat4) -> CbChangesEveryFrame {
        CbChangesEveryFrame::new(world, self.output_color, self.has_normal_map())
    }

    pub fn buffers(&self) -> Option<RenderableBuffers> {
        self.buffers
    }

    pub fn set_vertex_shader(&mut self, shader: Rc<VertexShader>) {
        self.vertex_shader = Some(shader);
    }

    pub fn set_pixel_shader(&mut self, shader: Rc<PixelShader>) {
        self.pixel_shader = Some(shader);
    }

    pub fn vertex_shader(&self) -> Option<&Rc<VertexShader>> {
        self.vertex_shader.as_ref()
    }

    pub fn pixel_shader(&self) -> Option<&Rc<PixelShader>> {
        self.pixel_shader.as_ref()
    }

    pub fn has_texture(&self) -> bool {
        !self.materials.is_empty()
    }

    pub fn has_normal_map(&self) -> bool {
        !self.is_skybox() && self.materials.iter().any(|m| m.normal.is_some())
    }

    pub fn num_meshes(&self) -> usize {
        self.mesh.meshes.len()
    }

    pub fn mesh(&self, index: usize) -> Option<BasicMeshEntry> {
        self.mesh.meshes.get(index).copied()
    }

    /// Submeshes to draw; the whole index range when none were declared
    pub fn submeshes(&self) -> Vec<BasicMeshEntry> {
        if self.mesh.meshes.is_empty() {
            vec![BasicMeshEntry::new(0, 0, self.num_indices(), 0)]
        } else {
            self.mesh.meshes.clone()
        }
    }

    pub fn material(&self, index: usize) -> Option<&Material> {
        self.materials.get(index)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn mesh_data(&self) -> &MeshData {
        &self.mesh
    }

    pub fn num_vertices(&self) -> u32 {
        self.mesh.num_vertices()
    }

    pub fn num_indices(&self) -> u32 {
        self.mesh.num_indices()
    }

    pub fn output_color(&self) -> Vec4 {
        self.output_color
    }
}
