//! Shared fixtures for the renderer integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use scene_renderer::backend::{Command, CommandList, DummyProvider};
use scene_renderer::resources::{
    layouts, BasicMeshEntry, InstanceData, Material, MeshData, SamplerType, SimpleVertex, Texture,
    TextureData,
};
use scene_renderer::{
    PixelShader, PointLight, Renderable, Renderer, RendererConfig, Scene, ShaderBytecode,
    VertexShader, WindowTarget,
};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn target() -> WindowTarget {
    WindowTarget::headless(WIDTH, HEIGHT)
}

pub fn renderer(provider: DummyProvider) -> Renderer<DummyProvider> {
    Renderer::new(provider, RendererConfig::default())
}

/// Four vertices indexed `num_indices` times
pub fn quad(num_indices: u32) -> MeshData {
    let vertices = (0..4)
        .map(|i| SimpleVertex::new(Vec3::new(i as f32, 0.0, 0.0), Vec2::ZERO, Vec3::Y))
        .collect();
    let indices = (0..num_indices).map(|i| (i % 4) as u16).collect();
    MeshData::new(vertices, indices)
}

pub fn vertex_shader() -> VertexShader {
    VertexShader::new(
        ShaderBytecode::new(vec![0u8; 4], "VS", "vs_5_0"),
        layouts::standard(),
    )
}

pub fn instanced_vertex_shader() -> VertexShader {
    VertexShader::new(
        ShaderBytecode::new(vec![0u8; 4], "VSVoxel", "vs_5_0"),
        layouts::instanced(),
    )
}

pub fn skinned_vertex_shader() -> VertexShader {
    VertexShader::new(
        ShaderBytecode::new(vec![0u8; 4], "VSModel", "vs_5_0"),
        layouts::skinned(),
    )
}

pub fn pixel_shader() -> PixelShader {
    PixelShader::new(ShaderBytecode::new(vec![0u8; 4], "PS", "ps_5_0"))
}

pub fn shadow_shaders() -> (VertexShader, PixelShader) {
    (
        VertexShader::new(
            ShaderBytecode::new(vec![0u8; 4], "VSShadow", "vs_5_0"),
            layouts::shadow(),
        ),
        PixelShader::new(ShaderBytecode::new(vec![0u8; 4], "PSShadow", "ps_5_0")),
    )
}

pub fn texture(name: &str) -> Rc<Texture> {
    Rc::new(Texture::new(
        TextureData::solid_color([200, 100, 50, 255], name),
        SamplerType::LinearWrap,
    ))
}

/// A scene with the shaders every test binds registered under fixed names
pub fn scene_with_shaders() -> Scene {
    let mut scene = Scene::new();
    scene.add_vertex_shader("VS", vertex_shader()).unwrap();
    scene.add_vertex_shader("VSVoxel", instanced_vertex_shader()).unwrap();
    scene.add_vertex_shader("VSModel", skinned_vertex_shader()).unwrap();
    scene.add_pixel_shader("PS", pixel_shader()).unwrap();
    scene
}

pub fn add_shaded_renderable(scene: &mut Scene, name: &str, renderable: Renderable) {
    scene.add_renderable(name, renderable).unwrap();
    scene.set_vertex_shader_of_renderable(name, "VS").unwrap();
    scene.set_pixel_shader_of_renderable(name, "PS").unwrap();
}

pub fn add_shaded_voxel(scene: &mut Scene, name: &str, instances: u32) {
    let instances = (0..instances)
        .map(|i| InstanceData::new(Mat4::from_translation(Vec3::X * i as f32)))
        .collect();
    scene.add_voxel(name, Renderable::voxel(quad(36), instances)).unwrap();
    scene.set_vertex_shader_of_voxel(name, "VSVoxel").unwrap();
    scene.set_pixel_shader_of_voxel(name, "PS").unwrap();
}

pub fn two_submesh_renderable() -> Renderable {
    let mesh = quad(18).with_meshes(vec![
        BasicMeshEntry::new(0, 0, 6, 0),
        BasicMeshEntry::new(4, 6, 12, 1),
    ]);
    Renderable::new(mesh).with_materials(vec![
        Material::new("first").with_diffuse(texture("first")),
        Material::new("second").with_diffuse(texture("second")),
    ])
}

pub fn white_light(position: Vec3) -> PointLight {
    PointLight::new(position, Vec4::ONE, 10.0)
}

/// Draw commands of a frame, in submission order
pub fn draws(list: &CommandList) -> Vec<Command> {
    list.draws().cloned().collect()
}

pub fn count(list: &CommandList, predicate: impl Fn(&Command) -> bool) -> usize {
    list.commands().iter().filter(|command| predicate(command)).count()
}
