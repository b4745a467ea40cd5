//! Vertex formats, mesh data and procedural generation

use crate::backend::types::{InputElement, VertexFormat};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

pub const VERTEX_SLOT: u32 = 0;
pub const NORMAL_SLOT: u32 = 1;
/// Instance transforms and skinning data share the third slot.
pub const EXTRA_SLOT: u32 = 2;

/// Position, texture coordinate and normal
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SimpleVertex {
    pub position: Vec3,
    pub tex_coord: Vec2,
    pub normal: Vec3,
}

impl SimpleVertex {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(position: Vec3, tex_coord: Vec2, normal: Vec3) -> Self {
        Self {
            position,
            tex_coord,
            normal,
        }
    }

    pub fn input_elements() -> [InputElement; 3] {
        [
            InputElement::per_vertex("POSITION", 0, VertexFormat::Float32x3, VERTEX_SLOT, 0),
            InputElement::per_vertex("TEXCOORD", 0, VertexFormat::Float32x2, VERTEX_SLOT, 12),
            InputElement::per_vertex("NORMAL", 0, VertexFormat::Float32x3, VERTEX_SLOT, 20),
        ]
    }
}

/// Tangent frame used for normal mapping
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct NormalData {
    pub tangent: Vec3,
    pub bitangent: Vec3,
}

impl NormalData {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn input_elements() -> [InputElement; 2] {
        [
            InputElement::per_vertex("TANGENT", 0, VertexFormat::Float32x3, NORMAL_SLOT, 0),
            InputElement::per_vertex("BITANGENT", 0, VertexFormat::Float32x3, NORMAL_SLOT, 12),
        ]
    }
}

/// Per-instance world transform
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub transformation: Mat4,
}

impl InstanceData {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn new(transformation: Mat4) -> Self {
        Self { transformation }
    }

    pub fn input_elements() -> [InputElement; 4] {
        [0u32, 1, 2, 3].map(|row| {
            InputElement::per_instance(
                "INSTANCE_TRANSFORM",
                row,
                VertexFormat::Float32x4,
                EXTRA_SLOT,
                row * 16,
            )
        })
    }
}

/// Per-vertex bone influences
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AnimationData {
    pub bone_indices: [u32; 4],
    pub bone_weights: Vec4,
}

impl AnimationData {
    pub const STRIDE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn input_elements() -> [InputElement; 2] {
        [
            InputElement::per_vertex("BONEINDICES", 0, VertexFormat::Uint32x4, EXTRA_SLOT, 0),
            InputElement::per_vertex("BONEWEIGHTS", 0, VertexFormat::Float32x4, EXTRA_SLOT, 16),
        ]
    }

    /// Add an influence in the first free slot; extra influences are dropped.
    pub fn add_bone(&mut self, bone: u32, weight: f32) -> bool {
        for i in 0..4 {
            if self.bone_weights[i] == 0.0 {
                self.bone_indices[i] = bone;
                self.bone_weights[i] = weight;
                return true;
            }
        }
        false
    }
}

/// Standard input layouts
pub mod layouts {
    use super::*;

    /// Vertex data plus the tangent frame
    pub fn standard() -> Vec<InputElement> {
        let mut elements = SimpleVertex::input_elements().to_vec();
        elements.extend(NormalData::input_elements());
        elements
    }

    pub fn instanced() -> Vec<InputElement> {
        let mut elements = standard();
        elements.extend(InstanceData::input_elements());
        elements
    }

    pub fn skinned() -> Vec<InputElement> {
        let mut elements = standard();
        elements.extend(AnimationData::input_elements());
        elements
    }

    /// Position only, for the skybox
    pub fn position_only() -> Vec<InputElement> {
        vec![SimpleVertex::input_elements()[0].clone()]
    }

    /// Position plus instance transform, for the shadow pass
    pub fn shadow() -> Vec<InputElement> {
        let mut elements = position_only();
        elements.extend(InstanceData::input_elements());
        elements
    }
}

/// A sub-range of an object's shared vertex and index buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicMeshEntry {
    pub base_vertex: u32,
    pub base_index: u32,
    pub num_indices: u32,
    pub material_index: u32,
}

impl BasicMeshEntry {
    pub fn new(base_vertex: u32, base_index: u32, num_indices: u32, material_index: u32) -> Self {
        Self {
            base_vertex,
            base_index,
            num_indices,
            material_index,
        }
    }
}

/// Geometry of one drawable object
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<SimpleVertex>,
    /// One entry per vertex, or empty when the object is not normal mapped
    pub normals: Vec<NormalData>,
    pub indices: Vec<u16>,
    pub meshes: Vec<BasicMeshEntry>,
}

impl MeshData {
    pub fn new(vertices: Vec<SimpleVertex>, indices: Vec<u16>) -> Self {
        Self {
            vertices,
            normals: Vec::new(),
            indices,
            meshes: Vec::new(),
        }
    }

    pub fn with_meshes(mut self, meshes: Vec<BasicMeshEntry>) -> Self {
        self.meshes = meshes;
        self
    }

    pub fn num_vertices(&self) -> u32 {
        self.vertices.len() as u32
    }

    pub fn num_indices(&self) -> u32 {
        self.indices.len() as u32
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Derive a tangent frame per vertex from positions and texture coordinates
    pub fn compute_tangents(&mut self) {
        let mut tangents = vec![Vec3::ZERO; self.vertices.len()];
        let mut bitangents = vec![Vec3::ZERO; self.vertices.len()];

        let ranges: Vec<(u32, u32, u32)> = if self.meshes.is_empty() {
            vec![(0, 0, self.num_indices())]
        } else {
            self.meshes
                .iter()
                .map(|m| (m.base_vertex, m.base_index, m.num_indices))
                .collect()
        };

        for (base_vertex, base_index, count) in ranges {
            let start = base_index as usize;
            if start >= self.indices.len() {
                log::warn!(
                    "Submesh starts at index {} past the {} indices; no tangents derived",
                    start,
                    self.indices.len()
                );
                continue;
            }
            let end = (start + count as usize).min(self.indices.len());
            for triangle in self.indices[start..end].chunks_exact(3) {
                let idx = [triangle[0], triangle[1], triangle[2]]
                    .map(|i| base_vertex as usize + i as usize);
                if idx.iter().any(|&i| i >= self.vertices.len()) {
                    continue;
                }
                let [v0, v1, v2] = idx.map(|i| self.vertices[i]);
                let edge1 = v1.position - v0.position;
                let edge2 = v2.position - v0.position;
                let duv1 = v1.tex_coord - v0.tex_coord;
                let duv2 = v2.tex_coord - v0.tex_coord;

                let det = duv1.x * duv2.y - duv2.x * duv1.y;
                if det.abs() < f32::EPSILON {
                    continue;
                }
                let r = 1.0 / det;
                let tangent = (edge1 * duv2.y - edge2 * duv1.y) * r;
                let bitangent = (edge2 * duv1.x - edge1 * duv2.x) * r;
                for i in idx {
                    tangents[i] += tangent;
                    bitangents[i] += bitangent;
                }
            }
        }

        self.normals = tangents
            .into_iter()
            .zip(bitangents)
            .map(|(t, b)| NormalData {
                tangent: t.normalize_or_zero(),
                bitangent: b.normalize_or_zero(),
            })
            .collect();
    }

    /// Reverse triangle winding, e.g. for geometry seen from inside
    pub fn flip_winding(&mut self) {
        for triangle in self.indices.chunks_exact_mut(3) {
            triangle.swap(1, 2);
        }
    }

    /// Create a unit cube centered at origin
    pub fn cube() -> Self {
        let faces = [
            // Front face
            (Vec3::new(-0.5, -0.5, 0.5), Vec3::Z),
            (Vec3::new(0.5, -0.5, 0.5), Vec3::Z),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::Z),
            (Vec3::new(-0.5, 0.5, 0.5), Vec3::Z),
            // Back face
            (Vec3::new(0.5, -0.5, -0.5), -Vec3::Z),
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::Z),
            (Vec3::new(-0.5, 0.5, -0.5), -Vec3::Z),
            (Vec3::new(0.5, 0.5, -0.5), -Vec3::Z),
            // Right face
            (Vec3::new(0.5, -0.5, 0.5), Vec3::X),
            (Vec3::new(0.5, -0.5, -0.5), Vec3::X),
            (Vec3::new(0.5, 0.5, -0.5), Vec3::X),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::X),
            // Left face
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::X),
            (Vec3::new(-0.5, -0.5, 0.5), -Vec3::X),
            (Vec3::new(-0.5, 0.5, 0.5), -Vec3::X),
            (Vec3::new(-0.5, 0.5, -0.5), -Vec3::X),
            // Top face
            (Vec3::new(-0.5, 0.5, 0.5), Vec3::Y),
            (Vec3::new(0.5, 0.5, 0.5), Vec3::Y),
            (Vec3::new(0.5, 0.5, -0.5), Vec3::Y),
            (Vec3::new(-0.5, 0.5, -0.5), Vec3::Y),
            // Bottom face
            (Vec3::new(-0.5, -0.5, -0.5), -Vec3::Y),
            (Vec3::new(0.5, -0.5, -0.5), -Vec3::Y),
            (Vec3::new(0.5, -0.5, 0.5), -Vec3::Y),
            (Vec3::new(-0.5, -0.5, 0.5), -Vec3::Y),
        ];
        let corner_uvs = [
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 0.0),
        ];

        let vertices = faces
            .iter()
            .enumerate()
            .map(|(i, &(position, normal))| SimpleVertex::new(position, corner_uvs[i % 4], normal))
            .collect();

        let mut indices = Vec::with_capacity(36);
        for face in 0..6u16 {
            let base = face * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        let mut mesh = Self::new(vertices, indices);
        mesh.meshes = vec![BasicMeshEntry::new(0, 0, 36, 0)];
        mesh.compute_tangents();
        mesh
    }

    /// Create a UV sphere of the given radius.
    ///
    /// Segments and rings are reduced until the vertex count fits 16-bit
    /// indices, so at most 65536 vertices are produced.
    pub fn sphere(radius: f32, segments: u16, rings: u16) -> Self {
        const MAX_VERTICES: u32 = u16::MAX as u32 + 1;
        let (requested_segments, requested_rings) = (u32::from(segments), u32::from(rings));
        // Leave room for at least two rings
        let segments = requested_segments.clamp(3, MAX_VERTICES / 3 - 1);
        let rings = requested_rings.clamp(2, MAX_VERTICES / (segments + 1) - 1);
        if segments < requested_segments || rings < requested_rings {
            log::warn!(
                "Sphere of {}x{} exceeds 16-bit indices; using {}x{}",
                requested_segments,
                requested_rings,
                segments,
                rings
            );
        }
        let segment_angle = std::f32::consts::TAU / segments as f32;
        let ring_angle = std::f32::consts::PI / rings as f32;

        let mut vertices = Vec::new();
        for ring in 0..=rings {
            let phi = ring as f32 * ring_angle;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for segment in 0..=segments {
                let theta = segment as f32 * segment_angle;
                let normal = Vec3::new(ring_radius * theta.cos(), y, ring_radius * theta.sin());
                let uv = Vec2::new(
                    segment as f32 / segments as f32,
                    ring as f32 / rings as f32,
                );
                vertices.push(SimpleVertex::new(normal * radius, uv, normal));
            }
        }

        let mut indices = Vec::new();
        for ring in 0..rings {
            for segment in 0..segments {
                let current = ring * (segments + 1) + segment;
                let next = current + segments + 1;
                indices.extend(
                    [current, next, current + 1, current + 1, next, next + 1]
                        .into_iter()
                        .filter_map(|i| u16::try_from(i).ok()),
                );
            }
        }

        let count = indices.len() as u32;
        let mut mesh = Self::new(vertices, indices);
        mesh.meshes = vec![BasicMeshEntry::new(0, 0, count, 0)];
        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_strides() {
        assert_eq!(SimpleVertex::STRIDE, 32);
        assert_eq!(NormalData::STRIDE, 24);
        assert_eq!(InstanceData::STRIDE, 64);
        assert_eq!(AnimationData::STRIDE, 32);
    }

    #[test]
    fn test_cube() {
        let cube = MeshData::cube();
        assert_eq!(cube.num_vertices(), 24);
        assert_eq!(cube.num_indices(), 36);
        assert_eq!(cube.normals.len(), 24);
        assert_eq!(cube.index_bytes().len(), 72);
    }

    #[test]
    fn test_cube_tangents_follow_u() {
        let cube = MeshData::cube();
        // Front face: u grows along +X
        assert!((cube.normals[0].tangent - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_sphere_indices_in_range() {
        let sphere = MeshData::sphere(2.0, 8, 4);
        assert!(sphere
            .indices
            .iter()
            .all(|&i| (i as u32) < sphere.num_vertices()));
        assert!((sphere.vertices[0].position.length() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_dense_sphere_fits_16_bit_indices() {
        let sphere = MeshData::sphere(1.0, 300, 300);
        assert!(sphere.num_vertices() <= u16::MAX as u32 + 1);
        assert_eq!(sphere.num_indices() % 3, 0);
        assert!(sphere
            .indices
            .iter()
            .all(|&i| (i as u32) < sphere.num_vertices()));
        // Segments kept, rings reduced: 301 * 217 vertices
        assert_eq!(sphere.num_vertices(), 301 * 217);
        assert_eq!(sphere.num_indices(), 300 * 216 * 6);
    }

    #[test]
    fn test_tangents_skip_submesh_past_index_buffer() {
        let mut cube = MeshData::cube();
        cube.meshes = vec![BasicMeshEntry::new(0, 40, 6, 0)];
        cube.compute_tangents();
        assert_eq!(cube.normals.len(), 24);
        assert!(cube.normals.iter().all(|n| n.tangent == Vec3::ZERO));
    }

    #[test]
    fn test_flip_winding() {
        let mut mesh = MeshData::new(Vec::new(), vec![0, 1, 2]);
        mesh.flip_winding();
        assert_eq!(mesh.indices, vec![0, 2, 1]);
    }

    #[test]
    fn test_add_bone_fills_free_slots() {
        let mut data = AnimationData::zeroed();
        for bone in 0..4 {
            assert!(data.add_bone(bone, 0.25));
        }
        assert!(!data.add_bone(9, 0.1));
        assert_eq!(data.bone_indices, [0, 1, 2, 3]);
    }

    #[test]
    fn test_shadow_layout_slots() {
        let layout = layouts::shadow();
        assert_eq!(layout.len(), 5);
        assert_eq!(layout[0].input_slot, VERTEX_SLOT);
        assert!(layout[1..].iter().all(|e| e.input_slot == EXTRA_SLOT));
    }
}
