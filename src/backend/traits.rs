//! Core backend abstraction traits
//!
//! These traits define the interface every device implementation provides:
//! resource creation up front and ordered execution of recorded command lists.

use crate::backend::command::CommandList;
use crate::backend::types::*;
use crate::shader::ShaderBytecode;
use crate::window::WindowTarget;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Failed to create device: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to create surface: {0}")]
    SurfaceCreationFailed(String),
    #[error("Failed to create swap chain: {0}")]
    SwapChainCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create view: {0}")]
    ViewCreationFailed(String),
    #[error("Failed to create sampler: {0}")]
    SamplerCreationFailed(String),
    #[error("Failed to create shader: {0}")]
    ShaderCreationFailed(String),
    #[error("Failed to create input layout: {0}")]
    InputLayoutCreationFailed(String),
    #[error("Unknown resource handle: {0}")]
    InvalidHandle(u64),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Wrap an id allocated by a device implementation.
            pub fn from_raw(id: u64) -> Self {
                Self(id)
            }

            pub fn raw(&self) -> u64 {
                self.0
            }
        }
    };
}

resource_handle!(
    /// Handle to a GPU buffer
    BufferHandle
);
resource_handle!(
    /// Handle to a GPU texture
    TextureHandle
);
resource_handle!(
    /// Handle to a render-target view of a texture
    RenderTargetViewHandle
);
resource_handle!(
    /// Handle to a depth-stencil view of a texture
    DepthStencilViewHandle
);
resource_handle!(
    /// Handle to a shader-resource view of a texture
    ShaderResourceViewHandle
);
resource_handle!(
    /// Handle to a sampler
    SamplerHandle
);
resource_handle!(
    /// Handle to a vertex shader
    VertexShaderHandle
);
resource_handle!(
    /// Handle to a pixel shader
    PixelShaderHandle
);
resource_handle!(
    /// Handle to a vertex input layout
    InputLayoutHandle
);

/// A created device together with its swap chain.
///
/// Resource creation happens eagerly and may fail. Everything that happens
/// per frame is recorded into a [`CommandList`] and handed to [`execute`],
/// which never fails; problems there are logged by the implementation.
///
/// [`execute`]: GraphicsDevice::execute
pub trait GraphicsDevice {
    /// Driver type this device was created with
    fn driver_type(&self) -> DriverType;

    /// Back buffer dimensions
    fn back_buffer_size(&self) -> (u32, u32);

    /// Render-target view onto the swap chain's back buffer
    fn back_buffer_view(&mut self) -> BackendResult<RenderTargetViewHandle>;

    /// Create a buffer, optionally filled with initial contents
    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> BackendResult<BufferHandle>;

    /// Create a texture, optionally filled with tightly packed texels
    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texels: Option<&[u8]>,
    ) -> BackendResult<TextureHandle>;

    fn create_render_target_view(
        &mut self,
        texture: TextureHandle,
    ) -> BackendResult<RenderTargetViewHandle>;

    fn create_depth_stencil_view(
        &mut self,
        texture: TextureHandle,
    ) -> BackendResult<DepthStencilViewHandle>;

    fn create_shader_resource_view(
        &mut self,
        texture: TextureHandle,
    ) -> BackendResult<ShaderResourceViewHandle>;

    fn create_sampler(&mut self, descriptor: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn create_vertex_shader(
        &mut self,
        bytecode: &ShaderBytecode,
    ) -> BackendResult<VertexShaderHandle>;

    fn create_pixel_shader(&mut self, bytecode: &ShaderBytecode)
        -> BackendResult<PixelShaderHandle>;

    /// Create an input layout, validated against the vertex shader's inputs
    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        bytecode: &ShaderBytecode,
    ) -> BackendResult<InputLayoutHandle>;

    /// Execute a recorded command list in order
    fn execute(&mut self, commands: CommandList);
}

/// Creates devices for a window, one driver type at a time.
pub trait DeviceProvider {
    type Device: GraphicsDevice;

    fn create_device(
        &mut self,
        driver_type: DriverType,
        target: &WindowTarget,
    ) -> BackendResult<Self::Device>;
}
