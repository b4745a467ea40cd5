//! Scene Renderer - a forward renderer with point-light shadow mapping
//!
//! A [`Renderer`] owns one graphics device and a set of named [`Scene`]s.
//! Each frame it renders every populated light's shadow map from the main
//! scene, then draws every initialized scene into the back buffer and
//! presents once.
//!
//! Scenes hold plain meshes, instanced voxels, skinned models and an optional
//! skybox, each drawn with the vertex and pixel shaders the application
//! registered under a name.
//!
//! Two device implementations are provided:
//! - **wgpu**: the real GPU backend, behind the default `wgpu-backend` feature
//! - **dummy**: records every command list it executes, for tools and tests

pub mod backend;
pub mod error;
pub mod input;
pub mod logging;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod shader;
pub mod window;

pub use error::{RendererError, RendererResult};
pub use input::{DirectionsInput, MouseRelativeMovement};
pub use logging::init_logging;
pub use renderer::{Renderer, RendererConfig};
pub use resources::{Material, MeshData, Texture, TextureData};
pub use scene::{Camera, CameraConfig, LightMotion, PointLight, Renderable, Scene};
pub use shader::{PixelShader, ShaderBytecode, VertexShader};
pub use window::WindowTarget;

#[cfg(feature = "wgpu-backend")]
pub use backend::wgpu_backend::WgpuProvider;
