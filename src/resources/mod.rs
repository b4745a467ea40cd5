//! Resource management
//!
//! Mesh geometry, vertex formats, textures, samplers and materials.

mod material;
mod mesh;
mod texture;

pub use material::*;
pub use mesh::*;
pub use texture::*;
