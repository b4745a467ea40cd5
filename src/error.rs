//! Renderer-level errors

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RendererError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("No main scene has been set")]
    NoMainScene,

    #[error("Scene not found: {0}")]
    SceneNotFound(String),

    #[error("Scene already exists: {0}")]
    DuplicateScene(String),

    #[error("Renderable already exists: {0}")]
    DuplicateRenderable(String),

    #[error("Vertex shader already exists: {0}")]
    DuplicateVertexShader(String),

    #[error("Pixel shader already exists: {0}")]
    DuplicatePixelShader(String),

    #[error("Renderable not found: {0}")]
    RenderableNotFound(String),

    #[error("Vertex shader not found: {0}")]
    VertexShaderNotFound(String),

    #[error("Pixel shader not found: {0}")]
    PixelShaderNotFound(String),

    #[error("Light index {index} out of range (capacity {capacity})")]
    LightIndexOutOfRange { index: usize, capacity: usize },

    #[error("Model has {count} bones, at most {max} are supported")]
    TooManyBones { count: usize, max: usize },
}

pub type RendererResult<T> = Result<T, RendererError>;
