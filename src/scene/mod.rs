//! Scene management
//!
//! A [`Scene`] buckets the drawable objects, point lights, skybox and shader
//! objects of one level. Objects are registered by unique name and iterated
//! in name order.

mod animation;
mod camera;
mod light;
mod renderable;

pub use animation::*;
pub use camera::*;
pub use light::*;
pub use renderable::*;

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::backend::GraphicsDevice;
use crate::error::{RendererError, RendererResult};
use crate::renderer::constants::NUM_LIGHTS;
use crate::shader::{PixelShader, VertexShader};

/// Which bucket a renderable lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Renderables,
    Models,
    Voxels,
}

#[derive(Debug, Default)]
pub struct Scene {
    renderables: BTreeMap<String, Renderable>,
    models: BTreeMap<String, Renderable>,
    voxels: BTreeMap<String, Renderable>,
    lights: LightArray<NUM_LIGHTS>,
    skybox: Option<Renderable>,
    vertex_shaders: BTreeMap<String, Rc<VertexShader>>,
    pixel_shaders: BTreeMap<String, Rc<PixelShader>>,
    initialized: bool,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    fn bucket(&self, bucket: Bucket) -> &BTreeMap<String, Renderable> {
        match bucket {
            Bucket::Renderables => &self.renderables,
            Bucket::Models => &self.models,
            Bucket::Voxels => &self.voxels,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut BTreeMap<String, Renderable> {
        match bucket {
            Bucket::Renderables => &mut self.renderables,
            Bucket::Models => &mut self.models,
            Bucket::Voxels => &mut self.voxels,
        }
    }

    fn insert(&mut self, bucket: Bucket, name: &str, renderable: Renderable) -> RendererResult<()> {
        let map = self.bucket_mut(bucket);
        if map.contains_key(name) {
            return Err(RendererError::DuplicateRenderable(name.to_string()));
        }
        map.insert(name.to_string(), renderable);
        Ok(())
    }

    pub fn add_renderable(&mut self, name: &str, renderable: Renderable) -> RendererResult<()> {
        self.insert(Bucket::Renderables, name, renderable)
    }

    pub fn add_model(&mut self, name: &str, model: Renderable) -> RendererResult<()> {
        self.insert(Bucket::Models, name, model)
    }

    pub fn add_voxel(&mut self, name: &str, voxel: Renderable) -> RendererResult<()> {
        self.insert(Bucket::Voxels, name, voxel)
    }

    /// Place `light` in slot `index`
    pub fn add_point_light(&mut self, index: usize, light: PointLight) -> RendererResult<()> {
        self.lights
            .set(index, light)
            .map_err(|_| RendererError::LightIndexOutOfRange {
                index,
                capacity: NUM_LIGHTS,
            })
    }

    pub fn point_light(&self, index: usize) -> Option<&PointLight> {
        self.lights.get(index)
    }

    pub fn point_light_mut(&mut self, index: usize) -> Option<&mut PointLight> {
        self.lights.get_mut(index)
    }

    pub fn point_lights(&self) -> &LightArray<NUM_LIGHTS> {
        &self.lights
    }

    pub fn set_skybox(&mut self, skybox: Renderable) {
        self.skybox = Some(skybox);
    }

    pub fn skybox(&self) -> Option<&Renderable> {
        self.skybox.as_ref()
    }

    pub fn skybox_mut(&mut self) -> Option<&mut Renderable> {
        self.skybox.as_mut()
    }

    pub fn add_vertex_shader(&mut self, name: &str, shader: VertexShader) -> RendererResult<()> {
        if self.vertex_shaders.contains_key(name) {
            return Err(RendererError::DuplicateVertexShader(name.to_string()));
        }
        self.vertex_shaders.insert(name.to_string(), Rc::new(shader));
        Ok(())
    }

    pub fn add_pixel_shader(&mut self, name: &str, shader: PixelShader) -> RendererResult<()> {
        if self.pixel_shaders.contains_key(name) {
            return Err(RendererError::DuplicatePixelShader(name.to_string()));
        }
        self.pixel_shaders.insert(name.to_string(), Rc::new(shader));
        Ok(())
    }

    pub fn vertex_shader(&self, name: &str) -> Option<&Rc<VertexShader>> {
        self.vertex_shaders.get(name)
    }

    pub fn pixel_shader(&self, name: &str) -> Option<&Rc<PixelShader>> {
        self.pixel_shaders.get(name)
    }

    fn find_vertex_shader(&self, name: &str) -> RendererResult<Rc<VertexShader>> {
        self.vertex_shaders
            .get(name)
            .cloned()
            .ok_or_else(|| RendererError::VertexShaderNotFound(name.to_string()))
    }

    fn find_pixel_shader(&self, name: &str) -> RendererResult<Rc<PixelShader>> {
        self.pixel_shaders
            .get(name)
            .cloned()
            .ok_or_else(|| RendererError::PixelShaderNotFound(name.to_string()))
    }

    fn assign_vertex_shader(
        &mut self,
        bucket: Bucket,
        renderable: &str,
        shader: &str,
    ) -> RendererResult<()> {
        let shader = self.find_vertex_shader(shader)?;
        self.bucket_mut(bucket)
            .get_mut(renderable)
            .ok_or_else(|| RendererError::RenderableNotFound(renderable.to_string()))?
            .set_vertex_shader(shader);
        Ok(())
    }

    fn assign_pixel_shader(
        &mut self,
        bucket: Bucket,
        renderable: &str,
        shader: &str,
    ) -> RendererResult<()> {
        let shader = self.find_pixel_shader(shader)?;
        self.bucket_mut(bucket)
            .get_mut(renderable)
            .ok_or_else(|| RendererError::RenderableNotFound(renderable.to_string()))?
            .set_pixel_shader(shader);
        Ok(())
    }

    pub fn set_vertex_shader_of_renderable(&mut self, renderable: &str, shader: &str) -> RendererResult<()> {
        self.assign_vertex_shader(Bucket::Renderables, renderable, shader)
    }

    pub fn set_pixel_shader_of_renderable(&mut self, renderable: &str, shader: &str) -> RendererResult<()> {
        self.assign_pixel_shader(Bucket::Renderables, renderable, shader)
    }

    pub fn set_vertex_shader_of_model(&mut self, model: &str, shader: &str) -> RendererResult<()> {
        self.assign_vertex_shader(Bucket::Models, model, shader)
    }

    pub fn set_pixel_shader_of_model(&mut self, model: &str, shader: &str) -> RendererResult<()> {
        self.assign_pixel_shader(Bucket::Models, model, shader)
    }

    pub fn set_vertex_shader_of_voxel(&mut self, voxel: &str, shader: &str) -> RendererResult<()> {
        self.assign_vertex_shader(Bucket::Voxels, voxel, shader)
    }

    pub fn set_pixel_shader_of_voxel(&mut self, voxel: &str, shader: &str) -> RendererResult<()> {
        self.assign_pixel_shader(Bucket::Voxels, voxel, shader)
    }

    /// Assign both skybox shaders. Fails when no skybox is set.
    pub fn set_skybox_shaders(&mut self, vertex_shader: &str, pixel_shader: &str) -> RendererResult<()> {
        let vertex = self.find_vertex_shader(vertex_shader)?;
        let pixel = self.find_pixel_shader(pixel_shader)?;
        let skybox = self
            .skybox
            .as_mut()
            .ok_or_else(|| RendererError::RenderableNotFound("skybox".to_string()))?;
        skybox.set_vertex_shader(vertex);
        skybox.set_pixel_shader(pixel);
        Ok(())
    }

    pub fn renderable(&self, name: &str) -> Option<&Renderable> {
        self.renderables.get(name)
    }

    pub fn renderable_mut(&mut self, name: &str) -> Option<&mut Renderable> {
        self.renderables.get_mut(name)
    }

    pub fn model(&self, name: &str) -> Option<&Renderable> {
        self.models.get(name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut Renderable> {
        self.models.get_mut(name)
    }

    pub fn voxel(&self, name: &str) -> Option<&Renderable> {
        self.voxels.get(name)
    }

    pub fn voxel_mut(&mut self, name: &str) -> Option<&mut Renderable> {
        self.voxels.get_mut(name)
    }

    pub fn renderables(&self) -> impl Iterator<Item = (&str, &Renderable)> {
        self.iter(Bucket::Renderables)
    }

    pub fn models(&self) -> impl Iterator<Item = (&str, &Renderable)> {
        self.iter(Bucket::Models)
    }

    pub fn voxels(&self) -> impl Iterator<Item = (&str, &Renderable)> {
        self.iter(Bucket::Voxels)
    }

    fn iter(&self, bucket: Bucket) -> impl Iterator<Item = (&str, &Renderable)> {
        self.bucket(bucket).iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Create GPU objects for shaders, renderables, voxels, models and the
    /// skybox, and size the light projections to the back buffer.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> RendererResult<()> {
        for shader in self.vertex_shaders.values() {
            shader.initialize(device)?;
        }
        for shader in self.pixel_shaders.values() {
            shader.initialize(device)?;
        }
        for bucket in [Bucket::Renderables, Bucket::Voxels, Bucket::Models] {
            for (name, renderable) in self.bucket_mut(bucket).iter_mut() {
                log::trace!("Initializing {:?} '{}'", bucket, name);
                renderable.initialize(device)?;
            }
        }
        if let Some(skybox) = &mut self.skybox {
            skybox.initialize(device)?;
        }

        let (width, height) = device.back_buffer_size();
        for light in self.lights.iter_mut() {
            light.initialize(width, height);
        }

        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn update(&mut self, delta_time: f32) {
        for renderable in self
            .renderables
            .values_mut()
            .chain(self.models.values_mut())
            .chain(self.voxels.values_mut())
        {
            renderable.update(delta_time);
        }
        if let Some(skybox) = &mut self.skybox {
            skybox.update(delta_time);
        }
        for light in self.lights.iter_mut() {
            light.update(delta_time);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceProvider, DriverType, DummyProvider};
    use crate::resources::{layouts, MeshData};
    use crate::shader::ShaderBytecode;
    use crate::window::WindowTarget;
    use glam::{Vec3, Vec4};

    fn vertex_shader() -> VertexShader {
        VertexShader::new(
            ShaderBytecode::from_wgsl("// vs", "vs_main", "vs_5_0"),
            layouts::standard(),
        )
    }

    fn pixel_shader() -> PixelShader {
        PixelShader::new(ShaderBytecode::from_wgsl("// ps", "ps_main", "ps_5_0"))
    }

    fn light(x: f32) -> PointLight {
        PointLight::new(Vec3::new(x, 1.0, 0.0), Vec4::ONE, 5.0)
    }

    #[test]
    fn test_duplicate_renderable_keeps_first() {
        let mut scene = Scene::new();
        let first = Renderable::new(MeshData::cube()).with_output_color(Vec4::X);
        scene.add_renderable("cube", first).unwrap();
        let result = scene.add_renderable("cube", Renderable::new(MeshData::cube()));
        assert_eq!(result, Err(RendererError::DuplicateRenderable("cube".into())));
        assert_eq!(scene.renderable("cube").unwrap().output_color(), Vec4::X);

        // Buckets are independent
        assert!(scene.add_voxel("cube", Renderable::new(MeshData::cube())).is_ok());
    }

    #[test]
    fn test_duplicate_shaders() {
        let mut scene = Scene::new();
        scene.add_vertex_shader("vs", vertex_shader()).unwrap();
        scene.add_pixel_shader("ps", pixel_shader()).unwrap();
        assert_eq!(
            scene.add_vertex_shader("vs", vertex_shader()),
            Err(RendererError::DuplicateVertexShader("vs".into()))
        );
        assert_eq!(
            scene.add_pixel_shader("ps", pixel_shader()),
            Err(RendererError::DuplicatePixelShader("ps".into()))
        );
    }

    #[test]
    fn test_point_light_slots() {
        let mut scene = Scene::new();
        for i in 0..NUM_LIGHTS {
            scene.add_point_light(i, light(i as f32 + 1.0)).unwrap();
            assert_eq!(scene.point_light(i), Some(&light(i as f32 + 1.0)));
        }
        let result = scene.add_point_light(NUM_LIGHTS, light(9.0));
        assert_eq!(
            result,
            Err(RendererError::LightIndexOutOfRange {
                index: NUM_LIGHTS,
                capacity: NUM_LIGHTS
            })
        );
        assert_eq!(scene.point_lights().iter().count(), NUM_LIGHTS);
        assert_eq!(scene.point_light(0), Some(&light(1.0)));
    }

    #[test]
    fn test_shader_assignment_lookups() {
        let mut scene = Scene::new();
        scene.add_renderable("cube", Renderable::new(MeshData::cube())).unwrap();
        scene.add_vertex_shader("vs", vertex_shader()).unwrap();

        assert_eq!(
            scene.set_vertex_shader_of_renderable("cube", "missing"),
            Err(RendererError::VertexShaderNotFound("missing".into()))
        );
        assert_eq!(
            scene.set_vertex_shader_of_renderable("sphere", "vs"),
            Err(RendererError::RenderableNotFound("sphere".into()))
        );
        assert_eq!(
            scene.set_pixel_shader_of_model("cube", "ps"),
            Err(RendererError::PixelShaderNotFound("ps".into()))
        );
        scene.set_vertex_shader_of_renderable("cube", "vs").unwrap();
        assert!(scene.renderable("cube").unwrap().vertex_shader().is_some());
    }

    #[test]
    fn test_iteration_is_name_ordered() {
        let mut scene = Scene::new();
        for name in ["zeta", "alpha", "mid"] {
            scene.add_renderable(name, Renderable::new(MeshData::cube())).unwrap();
        }
        let names: Vec<_> = scene.renderables().map(|(name, _)| name).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_initialize_and_update() {
        let mut scene = Scene::new();
        scene
            .add_renderable(
                "cube",
                Renderable::new(MeshData::cube()).with_behavior(Behavior::ORBITING_CUBE),
            )
            .unwrap();
        scene
            .add_point_light(0, light(2.0).with_motion(LightMotion::ORBIT))
            .unwrap();
        scene.add_vertex_shader("vs", vertex_shader()).unwrap();

        let target = WindowTarget::headless(200, 100);
        let mut device = DummyProvider::new()
            .create_device(DriverType::Hardware, &target)
            .unwrap();
        scene.initialize(&mut device).unwrap();
        assert!(scene.is_initialized());
        assert!(scene.renderable("cube").unwrap().buffers().is_some());
        assert!(scene.vertex_shader("vs").unwrap().handle().is_some());
        assert_ne!(scene.point_light(0).unwrap().projection(), glam::Mat4::IDENTITY);

        let before = scene.point_light(0).unwrap().position();
        scene.update(0.1);
        assert_ne!(scene.point_light(0).unwrap().position(), before);
        assert_ne!(scene.renderable("cube").unwrap().world(), glam::Mat4::IDENTITY);
    }
}
