//! Vertex and pixel shader objects
//!
//! Shaders arrive as compiled bytecode from an external compiler. A
//! [`VertexShader`] additionally owns the input layout describing how bound
//! vertex buffers feed its inputs.

use std::cell::OnceCell;

use crate::backend::{
    BackendResult, GraphicsDevice, InputElement, InputLayoutHandle, PixelShaderHandle,
    VertexShaderHandle,
};

/// A compiled shader blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderBytecode {
    pub bytes: Vec<u8>,
    pub entry_point: String,
    pub shader_model: String,
    /// Input semantics the vertex entry point reads, when known
    pub input_signature: Option<Vec<(String, u32)>>,
}

impl ShaderBytecode {
    pub fn new(
        bytes: impl Into<Vec<u8>>,
        entry_point: impl Into<String>,
        shader_model: impl Into<String>,
    ) -> Self {
        Self {
            bytes: bytes.into(),
            entry_point: entry_point.into(),
            shader_model: shader_model.into(),
            input_signature: None,
        }
    }

    /// Bytecode holding WGSL source text.
    pub fn from_wgsl(source: &str, entry_point: &str, shader_model: &str) -> Self {
        Self::new(source.as_bytes(), entry_point, shader_model)
    }

    pub fn with_input_signature<'a>(
        mut self,
        semantics: impl IntoIterator<Item = (&'a str, u32)>,
    ) -> Self {
        self.input_signature = Some(
            semantics
                .into_iter()
                .map(|(name, index)| (name.to_string(), index))
                .collect(),
        );
        self
    }

    /// Check that `elements` supply every input the shader declares.
    pub fn check_input_layout(&self, elements: &[InputElement]) -> Result<(), String> {
        if elements.is_empty() {
            return Err("input layout has no elements".into());
        }
        let Some(signature) = &self.input_signature else {
            return Ok(());
        };
        for (name, index) in signature {
            let found = elements
                .iter()
                .any(|e| e.semantic_name == name.as_str() && e.semantic_index == *index);
            if !found {
                return Err(format!(
                    "shader input {}{} is missing from the input layout",
                    name, index
                ));
            }
        }
        Ok(())
    }
}

/// A vertex shader and the input layout it is fed through.
#[derive(Debug)]
pub struct VertexShader {
    bytecode: ShaderBytecode,
    layout: Vec<InputElement>,
    gpu: OnceCell<(VertexShaderHandle, InputLayoutHandle)>,
}

impl VertexShader {
    pub fn new(bytecode: ShaderBytecode, layout: Vec<InputElement>) -> Self {
        Self {
            bytecode,
            layout,
            gpu: OnceCell::new(),
        }
    }

    /// Create the shader and its input layout on `device`.
    ///
    /// A shader shared between several owners is created once.
    pub fn initialize(&self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        if self.gpu.get().is_some() {
            return Ok(());
        }
        let shader = device.create_vertex_shader(&self.bytecode)?;
        let layout = device.create_input_layout(&self.layout, &self.bytecode)?;
        log::debug!(
            "Created vertex shader '{}' ({}) with {} input elements",
            self.bytecode.entry_point,
            self.bytecode.shader_model,
            self.layout.len()
        );
        // Cannot fail: the cell was checked empty above
        let _ = self.gpu.set((shader, layout));
        Ok(())
    }

    pub fn bytecode(&self) -> &ShaderBytecode {
        &self.bytecode
    }

    pub fn input_elements(&self) -> &[InputElement] {
        &self.layout
    }

    pub fn handle(&self) -> Option<VertexShaderHandle> {
        self.gpu.get().map(|(shader, _)| *shader)
    }

    pub fn input_layout(&self) -> Option<InputLayoutHandle> {
        self.gpu.get().map(|(_, layout)| *layout)
    }
}

/// A pixel shader.
#[derive(Debug)]
pub struct PixelShader {
    bytecode: ShaderBytecode,
    gpu: OnceCell<PixelShaderHandle>,
}

impl PixelShader {
    pub fn new(bytecode: ShaderBytecode) -> Self {
        Self {
            bytecode,
            gpu: OnceCell::new(),
        }
    }

    pub fn initialize(&self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        if self.gpu.get().is_some() {
            return Ok(());
        }
        let shader = device.create_pixel_shader(&self.bytecode)?;
        // Cannot fail: the cell was checked empty above
        let _ = self.gpu.set(shader);
        Ok(())
    }

    pub fn bytecode(&self) -> &ShaderBytecode {
        &self.bytecode
    }

    pub fn handle(&self) -> Option<PixelShaderHandle> {
        self.gpu.get().copied()
    }
}
