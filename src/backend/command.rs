//! Immediate-context style command recording
//!
//! [`DeviceContext`] mirrors the state-setting calls of an immediate device
//! context. Calls are appended in order to a [`CommandList`], which the
//! renderer hands to [`GraphicsDevice::execute`] once per frame.
//!
//! [`GraphicsDevice::execute`]: crate::backend::GraphicsDevice::execute

use crate::backend::traits::*;
use crate::backend::types::*;

/// A vertex buffer bound to one input slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferBinding {
    pub buffer: Option<BufferHandle>,
    pub stride: u32,
    pub offset: u32,
}

impl VertexBufferBinding {
    pub fn new(buffer: BufferHandle, stride: u32) -> Self {
        Self {
            buffer: Some(buffer),
            stride,
            offset: 0,
        }
    }

    pub fn unbound() -> Self {
        Self {
            buffer: None,
            stride: 0,
            offset: 0,
        }
    }
}

/// One recorded device-context call
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetVertexBuffers {
        start_slot: u32,
        bindings: Vec<VertexBufferBinding>,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
        offset: u32,
    },
    SetInputLayout(InputLayoutHandle),
    SetPrimitiveTopology(PrimitiveTopology),
    /// Replace the whole contents of a buffer
    UpdateSubresource {
        buffer: BufferHandle,
        data: Vec<u8>,
    },
    SetVertexShader(VertexShaderHandle),
    SetPixelShader(PixelShaderHandle),
    SetConstantBuffers {
        stage: ShaderStage,
        start_slot: u32,
        buffers: Vec<BufferHandle>,
    },
    /// `None` entries unbind the slot
    SetShaderResources {
        stage: ShaderStage,
        start_slot: u32,
        views: Vec<Option<ShaderResourceViewHandle>>,
    },
    SetSamplers {
        stage: ShaderStage,
        start_slot: u32,
        samplers: Vec<SamplerHandle>,
    },
    SetRenderTargets {
        render_target: Option<RenderTargetViewHandle>,
        depth_stencil: Option<DepthStencilViewHandle>,
    },
    SetDepthStencilState(DepthStencilState),
    SetViewport(Viewport),
    ClearRenderTarget {
        view: RenderTargetViewHandle,
        color: Color,
    },
    ClearDepthStencil {
        view: DepthStencilViewHandle,
        depth: f32,
        stencil: u8,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    },
    Present {
        sync_interval: u32,
    },
}

impl Command {
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Command::DrawIndexed { .. } | Command::DrawIndexedInstanced { .. }
        )
    }
}

/// An ordered list of recorded commands
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// All draw commands, in submission order
    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().filter(|c| c.is_draw())
    }

    /// Position of the first command matching `predicate`
    pub fn position(&self, predicate: impl Fn(&Command) -> bool) -> Option<usize> {
        self.commands.iter().position(predicate)
    }
}

impl IntoIterator for CommandList {
    type Item = Command;
    type IntoIter = std::vec::IntoIter<Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.into_iter()
    }
}

/// Records device-context calls into a [`CommandList`]
#[derive(Debug, Default)]
pub struct DeviceContext {
    recording: CommandList,
}

impl DeviceContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, command: Command) {
        self.recording.commands.push(command);
    }

    /// Take everything recorded so far, leaving the context empty
    pub fn finish(&mut self) -> CommandList {
        std::mem::take(&mut self.recording)
    }

    pub fn pending(&self) -> &CommandList {
        &self.recording
    }

    pub fn set_vertex_buffers(&mut self, start_slot: u32, bindings: &[VertexBufferBinding]) {
        self.push(Command::SetVertexBuffers {
            start_slot,
            bindings: bindings.to_vec(),
        });
    }

    pub fn set_index_buffer(&mut self, buffer: BufferHandle, format: IndexFormat, offset: u32) {
        self.push(Command::SetIndexBuffer {
            buffer,
            format,
            offset,
        });
    }

    pub fn set_input_layout(&mut self, layout: InputLayoutHandle) {
        self.push(Command::SetInputLayout(layout));
    }

    pub fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.push(Command::SetPrimitiveTopology(topology));
    }

    pub fn update_subresource(&mut self, buffer: BufferHandle, data: &[u8]) {
        self.push(Command::UpdateSubresource {
            buffer,
            data: data.to_vec(),
        });
    }

    pub fn vs_set_shader(&mut self, shader: VertexShaderHandle) {
        self.push(Command::SetVertexShader(shader));
    }

    pub fn ps_set_shader(&mut self, shader: PixelShaderHandle) {
        self.push(Command::SetPixelShader(shader));
    }

    pub fn vs_set_constant_buffers(&mut self, start_slot: u32, buffers: &[BufferHandle]) {
        self.set_constant_buffers(ShaderStage::Vertex, start_slot, buffers);
    }

    pub fn ps_set_constant_buffers(&mut self, start_slot: u32, buffers: &[BufferHandle]) {
        self.set_constant_buffers(ShaderStage::Pixel, start_slot, buffers);
    }

    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[BufferHandle],
    ) {
        self.push(Command::SetConstantBuffers {
            stage,
            start_slot,
            buffers: buffers.to_vec(),
        });
    }

    pub fn ps_set_shader_resources(
        &mut self,
        start_slot: u32,
        views: &[Option<ShaderResourceViewHandle>],
    ) {
        self.push(Command::SetShaderResources {
            stage: ShaderStage::Pixel,
            start_slot,
            views: views.to_vec(),
        });
    }

    pub fn ps_set_samplers(&mut self, start_slot: u32, samplers: &[SamplerHandle]) {
        self.push(Command::SetSamplers {
            stage: ShaderStage::Pixel,
            start_slot,
            samplers: samplers.to_vec(),
        });
    }

    pub fn set_render_targets(
        &mut self,
        render_target: Option<RenderTargetViewHandle>,
        depth_stencil: Option<DepthStencilViewHandle>,
    ) {
        self.push(Command::SetRenderTargets {
            render_target,
            depth_stencil,
        });
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.push(Command::SetDepthStencilState(state));
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.push(Command::SetViewport(viewport));
    }

    pub fn clear_render_target(&mut self, view: RenderTargetViewHandle, color: Color) {
        self.push(Command::ClearRenderTarget { view, color });
    }

    pub fn clear_depth_stencil(&mut self, view: DepthStencilViewHandle, depth: f32, stencil: u8) {
        self.push(Command::ClearDepthStencil {
            view,
            depth,
            stencil,
        });
    }

    pub fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.push(Command::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }

    pub fn draw_indexed_instanced(
        &mut self,
        index_count: u32,
        instance_count: u32,
        start_index: u32,
        base_vertex: i32,
        start_instance: u32,
    ) {
        self.push(Command::DrawIndexedInstanced {
            index_count,
            instance_count,
            start_index,
            base_vertex,
            start_instance,
        });
    }

    pub fn present(&mut self, sync_interval: u32) {
        self.push(Command::Present { sync_interval });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_keep_recording_order() {
        let mut ctx = DeviceContext::new();
        ctx.set_input_layout(InputLayoutHandle(1));
        ctx.draw_indexed(36, 0, 0);
        ctx.present(0);

        let list = ctx.finish();
        assert_eq!(list.len(), 3);
        assert_eq!(list.commands()[0], Command::SetInputLayout(InputLayoutHandle(1)));
        assert_eq!(list.draws().count(), 1);
        assert!(ctx.pending().is_empty());
    }

    #[test]
    fn test_unbind_shader_resources() {
        let mut ctx = DeviceContext::new();
        ctx.ps_set_shader_resources(0, &[None, None, None]);
        let list = ctx.finish();
        match &list.commands()[0] {
            Command::SetShaderResources {
                stage,
                start_slot,
                views,
            } => {
                assert_eq!(*stage, ShaderStage::Pixel);
                assert_eq!(*start_slot, 0);
                assert!(views.iter().all(Option::is_none));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
