//! Frame orchestration
//!
//! The [`Renderer`] owns the device, the global constant buffers, one shadow
//! map per light slot and the named scenes. Each frame it records a shadow
//! pass and a main pass into its [`DeviceContext`] and submits the result as
//! one command list.

pub mod constants;
mod config;
mod draw;

pub use config::RendererConfig;

use std::collections::BTreeMap;

use glam::Mat4;

use crate::backend::{
    BackendError, BackendResult, BufferDescriptor, BufferHandle, BufferUsage, DepthStencilViewHandle,
    DeviceContext, DeviceProvider, DriverType, GraphicsDevice, PrimitiveTopology,
    RenderTargetViewHandle, TextureDescriptor, TextureUsage, Viewport,
};
use crate::error::{RendererError, RendererResult};
use crate::input::{DirectionsInput, MouseRelativeMovement};
use crate::resources::{InstanceData, RenderTexture, SamplerTable, Texture};
use crate::scene::{Camera, Scene};
use crate::shader::{PixelShader, VertexShader};
use crate::window::WindowTarget;
use constants::{CbChangeOnResize, CbLights, CbShadowMatrix, NUM_LIGHTS};
use draw::FramePass;

/// GPU objects the renderer owns itself
#[derive(Debug)]
pub(crate) struct FrameResources {
    pub render_target: RenderTargetViewHandle,
    pub depth_stencil: DepthStencilViewHandle,
    pub viewport: Viewport,
    pub cb_change_on_resize: BufferHandle,
    pub cb_lights: BufferHandle,
    pub cb_shadow_matrix: BufferHandle,
    pub shadow_maps: Vec<RenderTexture>,
    pub samplers: SamplerTable,
    /// Single identity transform fed to the shadow layout's instance slot
    pub identity_instance: BufferHandle,
}

/// Shader pair used for rendering into the shadow maps
#[derive(Debug)]
pub(crate) struct ShadowShaders {
    pub vertex: VertexShader,
    pub pixel: PixelShader,
}

pub struct Renderer<P: DeviceProvider> {
    provider: P,
    config: RendererConfig,
    device: Option<P::Device>,
    context: DeviceContext,
    scenes: BTreeMap<String, Scene>,
    main_scene: Option<String>,
    camera: Camera,
    shadow_shaders: Option<ShadowShaders>,
    invalid_texture: Texture,
    frame: Option<FrameResources>,
}

impl<P: DeviceProvider> Renderer<P> {
    pub fn new(provider: P, config: RendererConfig) -> Self {
        let camera = Camera::new(config.camera);
        Self {
            provider,
            config,
            device: None,
            context: DeviceContext::new(),
            scenes: BTreeMap::new(),
            main_scene: None,
            camera,
            shadow_shaders: None,
            invalid_texture: Texture::invalid(),
            frame: None,
        }
    }

    /// Create the device and every GPU resource, then initialize the main scene.
    ///
    /// Fails fast. On failure the renderer holds no device and `render` does
    /// nothing.
    pub fn initialize(&mut self, target: &WindowTarget) -> RendererResult<()> {
        let main_scene = self.main_scene.clone().ok_or(RendererError::NoMainScene)?;
        self.device = None;
        self.frame = None;

        let mut device = self.create_device(target)?;
        let frame = self.initialize_resources(&mut device, &main_scene)?;
        log::debug!(
            "Renderer initialized ({:?}, main scene '{}')",
            device.driver_type(),
            main_scene
        );
        self.device = Some(device);
        self.frame = Some(frame);
        Ok(())
    }

    fn create_device(&mut self, target: &WindowTarget) -> BackendResult<P::Device> {
        let mut last_error = None;
        for &driver_type in &self.config.driver_types {
            match self.provider.create_device(driver_type, target) {
                Ok(device) => {
                    log::info!("Created {:?} device", driver_type);
                    return Ok(device);
                }
                Err(err) => {
                    log::warn!("{:?} device unavailable: {}", driver_type, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            BackendError::DeviceCreationFailed("no driver types configured".into())
        }))
    }

    fn initialize_resources(
        &mut self,
        device: &mut dyn GraphicsDevice,
        main_scene: &str,
    ) -> RendererResult<FrameResources> {
        let mut ctx = DeviceContext::new();
        let (width, height) = device.back_buffer_size();

        let render_target = device.back_buffer_view()?;
        let depth_texture = device.create_texture(
            &TextureDescriptor {
                label: Some("Depth Stencil".into()),
                width,
                height,
                mip_levels: 1,
                format: self.config.depth_format,
                usage: TextureUsage::DEPTH_STENCIL,
            },
            None,
        )?;
        let depth_stencil = device.create_depth_stencil_view(depth_texture)?;
        let viewport = Viewport::from_size(width, height);
        ctx.set_render_targets(Some(render_target), Some(depth_stencil));
        ctx.set_viewport(viewport);
        ctx.set_primitive_topology(PrimitiveTopology::TriangleList);

        let aspect = width as f32 / height.max(1) as f32;
        let projection = CbChangeOnResize {
            projection: Mat4::perspective_lh(
                self.config.fov_y,
                aspect,
                self.config.near_plane,
                self.config.far_plane,
            ),
        };
        let cb_change_on_resize = device.create_buffer(
            &BufferDescriptor::new(
                "Projection Constant Buffer",
                std::mem::size_of::<CbChangeOnResize>() as u64,
                BufferUsage::CONSTANT,
            ),
            Some(bytemuck::bytes_of(&projection)),
        )?;
        let cb_lights = device.create_buffer(
            &BufferDescriptor::new(
                "Lights Constant Buffer",
                std::mem::size_of::<CbLights>() as u64,
                BufferUsage::CONSTANT,
            ),
            Some(bytemuck::bytes_of(&CbLights::default())),
        )?;
        self.camera.initialize(device)?;
        let cb_shadow_matrix = device.create_buffer(
            &BufferDescriptor::new(
                "Shadow Matrix Constant Buffer",
                std::mem::size_of::<CbShadowMatrix>() as u64,
                BufferUsage::CONSTANT,
            ),
            None,
        )?;

        let mut shadow_maps = Vec::with_capacity(NUM_LIGHTS);
        for i in 0..NUM_LIGHTS {
            let mut shadow_map = RenderTexture::new(
                format!("Shadow Map {}", i),
                width,
                height,
                self.config.shadow_map_format,
            );
            shadow_map.initialize(device)?;
            shadow_maps.push(shadow_map);
        }
        let samplers = SamplerTable::create(device)?;
        let identity = InstanceData::new(Mat4::IDENTITY);
        let identity_instance = device.create_buffer(
            &BufferDescriptor::new(
                "Identity Instance Buffer",
                InstanceData::STRIDE as u64,
                BufferUsage::VERTEX,
            ),
            Some(bytemuck::bytes_of(&identity)),
        )?;

        let scene = self
            .scenes
            .get_mut(main_scene)
            .ok_or_else(|| RendererError::SceneNotFound(main_scene.to_string()))?;
        scene.initialize(device)?;
        self.invalid_texture.initialize(device)?;
        if let Some(shadow) = &self.shadow_shaders {
            shadow.vertex.initialize(device)?;
            shadow.pixel.initialize(device)?;
        }

        device.execute(ctx.finish());
        Ok(FrameResources {
            render_target,
            depth_stencil,
            viewport,
            cb_change_on_resize,
            cb_lights,
            cb_shadow_matrix,
            shadow_maps,
            samplers,
            identity_instance,
        })
    }

    /// Register `scene` under `name`
    pub fn add_scene(&mut self, name: &str, scene: Scene) -> RendererResult<()> {
        if self.scenes.contains_key(name) {
            return Err(RendererError::DuplicateScene(name.to_string()));
        }
        self.scenes.insert(name.to_string(), scene);
        Ok(())
    }

    /// Make `name` the scene driving update and the shadow pass
    pub fn set_main_scene(&mut self, name: &str) -> RendererResult<()> {
        if !self.scenes.contains_key(name) {
            return Err(RendererError::SceneNotFound(name.to_string()));
        }
        self.main_scene = Some(name.to_string());
        Ok(())
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.get(name)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.get_mut(name)
    }

    pub fn main_scene_name(&self) -> Option<&str> {
        self.main_scene.as_deref()
    }

    pub fn main_scene(&self) -> Option<&Scene> {
        self.main_scene.as_deref().and_then(|name| self.scenes.get(name))
    }

    pub fn main_scene_mut(&mut self) -> Option<&mut Scene> {
        let name = self.main_scene.as_deref()?;
        self.scenes.get_mut(name)
    }

    /// Shaders for the shadow pass. The vertex shader must read the
    /// position-plus-instance layout, see [`layouts::shadow`].
    ///
    /// Without them the shadow pass is skipped.
    ///
    /// [`layouts::shadow`]: crate::resources::layouts::shadow
    pub fn set_shadow_map_shaders(
        &mut self,
        vertex: VertexShader,
        pixel: PixelShader,
    ) -> RendererResult<()> {
        if let Some(device) = self.device.as_mut() {
            vertex.initialize(device)?;
            pixel.initialize(device)?;
        }
        self.shadow_shaders = Some(ShadowShaders { vertex, pixel });
        Ok(())
    }

    pub fn handle_input(
        &mut self,
        directions: &DirectionsInput,
        mouse: &MouseRelativeMovement,
        delta_time: f32,
    ) {
        self.camera.handle_input(directions, mouse, delta_time);
    }

    /// Advance the main scene and the camera
    pub fn update(&mut self, delta_time: f32) {
        if let Some(scene) = self.main_scene_mut() {
            scene.update(delta_time);
        }
        self.camera.update(delta_time);
    }

    /// Record and submit one frame
    pub fn render(&mut self) {
        let Self {
            config,
            device,
            context,
            scenes,
            main_scene,
            camera,
            shadow_shaders,
            invalid_texture,
            frame,
            ..
        } = self;
        let (Some(device), Some(frame)) = (device.as_mut(), frame.as_ref()) else {
            log::warn!("render called without an initialized device");
            return;
        };

        let sync_interval = config.sync_interval;
        let mut pass = FramePass {
            ctx: &mut *context,
            frame,
            config,
            camera,
            invalid_texture,
        };
        if let (Some(shaders), Some(scene)) = (
            shadow_shaders.as_ref(),
            main_scene.as_deref().and_then(|name| scenes.get(name)),
        ) {
            pass.shadow_pass(scene, shaders);
        }
        pass.main_pass(scenes);
        pass.ctx.present(sync_interval);

        device.execute(context.finish());
    }

    pub fn driver_type(&self) -> Option<DriverType> {
        self.device.as_ref().map(|device| device.driver_type())
    }

    pub fn device(&self) -> Option<&P::Device> {
        self.device.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.device.is_some()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
}
