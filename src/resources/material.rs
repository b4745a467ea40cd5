//! Surface materials

use std::rc::Rc;

use super::Texture;
use crate::backend::{BackendResult, GraphicsDevice};

/// Diffuse and normal textures of one submesh
#[derive(Debug, Clone, Default)]
pub struct Material {
    pub name: String,
    pub diffuse: Option<Rc<Texture>>,
    pub normal: Option<Rc<Texture>>,
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_diffuse(mut self, texture: Rc<Texture>) -> Self {
        self.diffuse = Some(texture);
        self
    }

    pub fn with_normal(mut self, texture: Rc<Texture>) -> Self {
        self.normal = Some(texture);
        self
    }

    pub fn initialize(&self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        for texture in self.diffuse.iter().chain(self.normal.iter()) {
            texture.initialize(device)?;
        }
        Ok(())
    }
}
