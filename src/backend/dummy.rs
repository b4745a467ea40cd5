//! Dummy device for testing and development.
//!
//! This device doesn't perform actual GPU operations. It allocates handles,
//! keeps CPU copies of buffer contents and records every executed command
//! list, so tests can inspect exactly what the renderer submitted without
//! requiring GPU hardware. Individual creation calls can be made to fail.

use std::collections::HashMap;

use crate::backend::command::{Command, CommandList};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::shader::ShaderBytecode;
use crate::window::WindowTarget;

/// A creation call the dummy device should fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DummyFailure {
    /// Buffers whose label contains the given text
    Buffer(String),
    /// Textures whose label contains the given text
    Texture(String),
    Sampler,
    VertexShader,
    PixelShader,
    BackBuffer,
}

/// Creates [`DummyDevice`]s, optionally refusing some driver types.
#[derive(Debug, Clone, Default)]
pub struct DummyProvider {
    unavailable: Vec<DriverType>,
    failures: Vec<DummyFailure>,
}

impl DummyProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to create devices of `driver_type`
    pub fn without_driver(mut self, driver_type: DriverType) -> Self {
        self.unavailable.push(driver_type);
        self
    }

    /// Make created devices fail the given creation call
    pub fn failing(mut self, failure: DummyFailure) -> Self {
        self.failures.push(failure);
        self
    }
}

impl DeviceProvider for DummyProvider {
    type Device = DummyDevice;

    fn create_device(
        &mut self,
        driver_type: DriverType,
        target: &WindowTarget,
    ) -> BackendResult<DummyDevice> {
        if self.unavailable.contains(&driver_type) {
            log::trace!("DummyProvider: {:?} driver unavailable", driver_type);
            return Err(BackendError::DeviceCreationFailed(format!(
                "{:?} driver unavailable",
                driver_type
            )));
        }
        log::trace!(
            "DummyProvider: creating {:?} device ({}x{})",
            driver_type,
            target.width,
            target.height
        );
        Ok(DummyDevice {
            driver_type,
            size: (target.width, target.height),
            failures: self.failures.clone(),
            ..DummyDevice::default()
        })
    }
}

/// CPU-side record of a created buffer
#[derive(Debug, Clone)]
pub struct DummyBuffer {
    pub label: Option<String>,
    pub usage: BufferUsage,
    pub data: Vec<u8>,
}

/// Recording device
#[derive(Debug)]
pub struct DummyDevice {
    driver_type: DriverType,
    size: (u32, u32),
    failures: Vec<DummyFailure>,
    next_id: u64,
    back_buffer: Option<RenderTargetViewHandle>,
    buffers: HashMap<BufferHandle, DummyBuffer>,
    textures: HashMap<TextureHandle, TextureDescriptor>,
    views: HashMap<u64, TextureHandle>,
    samplers: HashMap<SamplerHandle, SamplerDescriptor>,
    vertex_shaders: HashMap<VertexShaderHandle, ShaderBytecode>,
    pixel_shaders: HashMap<PixelShaderHandle, ShaderBytecode>,
    input_layouts: HashMap<InputLayoutHandle, Vec<InputElement>>,
    executed: Vec<CommandList>,
    presented: usize,
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self {
            driver_type: DriverType::Hardware,
            size: (1, 1),
            failures: Vec::new(),
            next_id: 1,
            back_buffer: None,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            samplers: HashMap::new(),
            vertex_shaders: HashMap::new(),
            pixel_shaders: HashMap::new(),
            input_layouts: HashMap::new(),
            executed: Vec::new(),
            presented: 0,
        }
    }
}

impl DummyDevice {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn fails(&self, failure: &DummyFailure) -> bool {
        self.failures.contains(failure)
    }

    fn label_fails(&self, label: Option<&str>, texture: bool) -> bool {
        let label = label.unwrap_or_default();
        self.failures.iter().any(|failure| match failure {
            DummyFailure::Buffer(text) if !texture => label.contains(text.as_str()),
            DummyFailure::Texture(text) if texture => label.contains(text.as_str()),
            _ => false,
        })
    }

    fn view_of(&mut self, texture: TextureHandle) -> BackendResult<u64> {
        if !self.textures.contains_key(&texture) {
            return Err(BackendError::InvalidHandle(texture.0));
        }
        let id = self.allocate();
        self.views.insert(id, texture);
        Ok(id)
    }

    pub fn buffer(&self, handle: BufferHandle) -> Option<&DummyBuffer> {
        self.buffers.get(&handle)
    }

    /// Current contents of a buffer, including executed updates
    pub fn buffer_data(&self, handle: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&handle).map(|b| b.data.as_slice())
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&handle)
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn input_layout(&self, handle: InputLayoutHandle) -> Option<&[InputElement]> {
        self.input_layouts.get(&handle).map(Vec::as_slice)
    }

    /// Every command list executed so far, oldest first
    pub fn executed(&self) -> &[CommandList] {
        &self.executed
    }

    pub fn last_executed(&self) -> Option<&CommandList> {
        self.executed.last()
    }

    pub fn frames_presented(&self) -> usize {
        self.presented
    }
}

impl GraphicsDevice for DummyDevice {
    fn driver_type(&self) -> DriverType {
        self.driver_type
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn back_buffer_view(&mut self) -> BackendResult<RenderTargetViewHandle> {
        if self.fails(&DummyFailure::BackBuffer) {
            return Err(BackendError::SwapChainCreationFailed(
                "back buffer unavailable".into(),
            ));
        }
        if let Some(view) = self.back_buffer {
            return Ok(view);
        }
        let view = RenderTargetViewHandle(self.allocate());
        self.back_buffer = Some(view);
        Ok(view)
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> BackendResult<BufferHandle> {
        log::trace!(
            "DummyDevice: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        if self.label_fails(descriptor.label.as_deref(), false) {
            return Err(BackendError::BufferCreationFailed(
                descriptor.label.clone().unwrap_or_default(),
            ));
        }
        if descriptor.size == 0 {
            return Err(BackendError::BufferCreationFailed(format!(
                "{:?} has zero size",
                descriptor.label
            )));
        }
        let mut data = vec![0u8; descriptor.size as usize];
        if let Some(contents) = contents {
            let len = contents.len().min(data.len());
            data[..len].copy_from_slice(&contents[..len]);
        }
        let handle = BufferHandle(self.allocate());
        self.buffers.insert(
            handle,
            DummyBuffer {
                label: descriptor.label.clone(),
                usage: descriptor.usage,
                data,
            },
        );
        Ok(handle)
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        _texels: Option<&[u8]>,
    ) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{})",
            descriptor.label,
            descriptor.width,
            descriptor.height
        );
        if self.label_fails(descriptor.label.as_deref(), true) {
            return Err(BackendError::TextureCreationFailed(
                descriptor.label.clone().unwrap_or_default(),
            ));
        }
        let handle = TextureHandle(self.allocate());
        self.textures.insert(handle, descriptor.clone());
        Ok(handle)
    }

    fn create_render_target_view(
        &mut self,
        texture: TextureHandle,
    ) -> BackendResult<RenderTargetViewHandle> {
        self.view_of(texture).map(RenderTargetViewHandle)
    }

    fn create_depth_stencil_view(
        &mut self,
        texture: TextureHandle,
    ) -> BackendResult<DepthStencilViewHandle> {
        self.view_of(texture).map(DepthStencilViewHandle)
    }

    fn create_shader_resource_view(
        &mut self,
        texture: TextureHandle,
    ) -> BackendResult<ShaderResourceViewHandle> {
        self.view_of(texture).map(ShaderResourceViewHandle)
    }

    fn create_sampler(&mut self, descriptor: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        log::trace!("DummyDevice: creating sampler {:?}", descriptor.label);
        if self.fails(&DummyFailure::Sampler) {
            return Err(BackendError::SamplerCreationFailed(
                descriptor.label.clone().unwrap_or_default(),
            ));
        }
        let handle = SamplerHandle(self.allocate());
        self.samplers.insert(handle, descriptor.clone());
        Ok(handle)
    }

    fn create_vertex_shader(
        &mut self,
        bytecode: &ShaderBytecode,
    ) -> BackendResult<VertexShaderHandle> {
        if self.fails(&DummyFailure::VertexShader) {
            return Err(BackendError::ShaderCreationFailed(bytecode.entry_point.clone()));
        }
        let handle = VertexShaderHandle(self.allocate());
        self.vertex_shaders.insert(handle, bytecode.clone());
        Ok(handle)
    }

    fn create_pixel_shader(
        &mut self,
        bytecode: &ShaderBytecode,
    ) -> BackendResult<PixelShaderHandle> {
        if self.fails(&DummyFailure::PixelShader) {
            return Err(BackendError::ShaderCreationFailed(bytecode.entry_point.clone()));
        }
        let handle = PixelShaderHandle(self.allocate());
        self.pixel_shaders.insert(handle, bytecode.clone());
        Ok(handle)
    }

    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        bytecode: &ShaderBytecode,
    ) -> BackendResult<InputLayoutHandle> {
        bytecode
            .check_input_layout(elements)
            .map_err(BackendError::InputLayoutCreationFailed)?;
        let handle = InputLayoutHandle(self.allocate());
        self.input_layouts.insert(handle, elements.to_vec());
        Ok(handle)
    }

    fn execute(&mut self, commands: CommandList) {
        log::trace!("DummyDevice: executing {} commands", commands.len());
        for command in commands.commands() {
            match command {
                Command::UpdateSubresource { buffer, data } => match self.buffers.get_mut(buffer) {
                    Some(target) if data.len() <= target.data.len() => {
                        target.data[..data.len()].copy_from_slice(data);
                    }
                    Some(target) => log::warn!(
                        "DummyDevice: update of {} bytes overflows buffer {:?}",
                        data.len(),
                        target.label
                    ),
                    None => log::warn!("DummyDevice: update of unknown buffer {:?}", buffer),
                },
                Command::Present { .. } => self.presented += 1,
                _ => {}
            }
        }
        self.executed.push(commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::command::DeviceContext;

    fn device() -> DummyDevice {
        DummyProvider::new()
            .create_device(DriverType::Hardware, &WindowTarget::headless(64, 64))
            .unwrap()
    }

    #[test]
    fn test_unavailable_driver() {
        let mut provider = DummyProvider::new().without_driver(DriverType::Hardware);
        let target = WindowTarget::headless(8, 8);
        assert!(provider.create_device(DriverType::Hardware, &target).is_err());
        assert!(provider.create_device(DriverType::Warp, &target).is_ok());
    }

    #[test]
    fn test_update_subresource_applies_on_execute() {
        let mut device = device();
        let buffer = device
            .create_buffer(
                &BufferDescriptor::new("cb", 16, BufferUsage::CONSTANT),
                None,
            )
            .unwrap();

        let mut ctx = DeviceContext::new();
        ctx.update_subresource(buffer, &[1, 2, 3, 4]);
        assert_eq!(&device.buffer_data(buffer).unwrap()[..4], &[0, 0, 0, 0]);

        device.execute(ctx.finish());
        assert_eq!(&device.buffer_data(buffer).unwrap()[..4], &[1, 2, 3, 4]);
        assert_eq!(device.executed().len(), 1);
    }

    #[test]
    fn test_labeled_buffer_failure() {
        let mut device = DummyProvider::new()
            .failing(DummyFailure::Buffer("index".into()))
            .create_device(DriverType::Hardware, &WindowTarget::headless(8, 8))
            .unwrap();
        let ok = device.create_buffer(&BufferDescriptor::new("vertex", 4, BufferUsage::VERTEX), None);
        let failed =
            device.create_buffer(&BufferDescriptor::new("index", 4, BufferUsage::INDEX), None);
        assert!(ok.is_ok());
        assert!(matches!(failed, Err(BackendError::BufferCreationFailed(_))));
    }

    #[test]
    fn test_view_of_unknown_texture() {
        let mut device = device();
        assert_eq!(
            device.create_shader_resource_view(TextureHandle(999)),
            Err(BackendError::InvalidHandle(999))
        );
    }
}
