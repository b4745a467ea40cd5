//! Command list replay for the wgpu device
//!
//! Bound state is tracked the way an immediate context tracks it and
//! persists across command lists. Draws are snapshotted into a pending render
//! pass; any command that cannot happen inside a pass (target changes,
//! clears, buffer updates, present) closes it first. Clears become the load
//! operations of the next pass on that view.

use std::collections::{BTreeMap, HashMap};

use wgpu::util::DeviceExt;

use super::{aligned_size, BackBuffer, WgpuDevice, SAMPLER_BINDING_BASE, TEXTURE_BINDING_BASE};
use crate::backend::command::{Command, CommandList, VertexBufferBinding};
use crate::backend::traits::*;
use crate::backend::types::*;

const VERTEX_GROUP: usize = 0;
const PIXEL_GROUP: usize = 1;

fn group_of(stage: ShaderStage) -> usize {
    match stage {
        ShaderStage::Vertex => VERTEX_GROUP,
        ShaderStage::Pixel => PIXEL_GROUP,
    }
}

/// Bound pipeline state
#[derive(Debug, Default)]
pub(super) struct ReplayState {
    vertex_buffers: BTreeMap<u32, VertexBufferBinding>,
    index_buffer: Option<(BufferHandle, IndexFormat, u32)>,
    input_layout: Option<InputLayoutHandle>,
    topology: PrimitiveTopology,
    vertex_shader: Option<VertexShaderHandle>,
    pixel_shader: Option<PixelShaderHandle>,
    constant_buffers: [BTreeMap<u32, BufferHandle>; 2],
    shader_resources: [BTreeMap<u32, ShaderResourceViewHandle>; 2],
    samplers: [BTreeMap<u32, SamplerHandle>; 2],
    render_target: Option<RenderTargetViewHandle>,
    depth_stencil: Option<DepthStencilViewHandle>,
    depth_state: DepthStencilState,
    viewport: Option<Viewport>,
    color_clears: HashMap<RenderTargetViewHandle, Color>,
    depth_clears: HashMap<DepthStencilViewHandle, f32>,
}

/// One bind group layout entry, keyed for caching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) enum LayoutEntry {
    Uniform { binding: u32 },
    Texture { binding: u32, filterable: bool },
    Sampler { binding: u32, filtering: bool },
}

#[derive(Debug, Clone, Copy)]
enum BindingResource {
    Buffer(BufferHandle),
    Texture(ShaderResourceViewHandle),
    Sampler(SamplerHandle),
}

/// Everything that selects a distinct render pipeline
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(super) struct PipelineKey {
    vertex_shader: VertexShaderHandle,
    pixel_shader: PixelShaderHandle,
    input_layout: InputLayoutHandle,
    /// (input slot, stride) of every slot the layout reads, ascending
    strides: Vec<(u32, u32)>,
    topology: PrimitiveTopology,
    index_format: IndexFormat,
    color_format: Option<TextureFormat>,
    depth_format: Option<TextureFormat>,
    depth_state: DepthStencilState,
    groups: [Vec<LayoutEntry>; 2],
}

#[derive(Debug, Clone, Copy)]
struct DrawCall {
    index_count: u32,
    instance_count: u32,
    start_index: u32,
    base_vertex: i32,
    start_instance: u32,
}

struct RecordedDraw {
    key: PipelineKey,
    vertex_buffers: Vec<(BufferHandle, u64)>,
    index_buffer: (BufferHandle, IndexFormat, u64),
    resources: [Vec<(u32, BindingResource)>; 2],
    viewport: Option<Viewport>,
    call: DrawCall,
}

struct PendingPass {
    render_target: Option<RenderTargetViewHandle>,
    depth_stencil: Option<DepthStencilViewHandle>,
    draws: Vec<RecordedDraw>,
}

impl WgpuDevice {
    pub(super) fn replay(&mut self, commands: CommandList) {
        let mut encoder = self.new_encoder();
        let mut pass: Option<PendingPass> = None;

        for command in commands {
            match command {
                Command::SetVertexBuffers {
                    start_slot,
                    bindings,
                } => {
                    for (slot, binding) in (start_slot..).zip(bindings) {
                        if binding.buffer.is_some() {
                            self.state.vertex_buffers.insert(slot, binding);
                        } else {
                            self.state.vertex_buffers.remove(&slot);
                        }
                    }
                }
                Command::SetIndexBuffer {
                    buffer,
                    format,
                    offset,
                } => self.state.index_buffer = Some((buffer, format, offset)),
                Command::SetInputLayout(layout) => self.state.input_layout = Some(layout),
                Command::SetPrimitiveTopology(topology) => self.state.topology = topology,
                Command::UpdateSubresource { buffer, data } => {
                    self.flush_pass(&mut encoder, pass.take());
                    self.copy_into_buffer(&mut encoder, buffer, &data);
                }
                Command::SetVertexShader(shader) => self.state.vertex_shader = Some(shader),
                Command::SetPixelShader(shader) => self.state.pixel_shader = Some(shader),
                Command::SetConstantBuffers {
                    stage,
                    start_slot,
                    buffers,
                } => {
                    let bound = &mut self.state.constant_buffers[group_of(stage)];
                    for (slot, buffer) in (start_slot..).zip(buffers) {
                        bound.insert(slot, buffer);
                    }
                }
                Command::SetShaderResources {
                    stage,
                    start_slot,
                    views,
                } => {
                    let bound = &mut self.state.shader_resources[group_of(stage)];
                    for (slot, view) in (start_slot..).zip(views) {
                        match view {
                            Some(view) => bound.insert(slot, view),
                            None => bound.remove(&slot),
                        };
                    }
                }
                Command::SetSamplers {
                    stage,
                    start_slot,
                    samplers,
                } => {
                    let bound = &mut self.state.samplers[group_of(stage)];
                    for (slot, sampler) in (start_slot..).zip(samplers) {
                        bound.insert(slot, sampler);
                    }
                }
                Command::SetRenderTargets {
                    render_target,
                    depth_stencil,
                } => {
                    self.flush_pass(&mut encoder, pass.take());
                    self.state.render_target = render_target;
                    self.state.depth_stencil = depth_stencil;
                }
                Command::SetDepthStencilState(state) => self.state.depth_state = state,
                Command::SetViewport(viewport) => self.state.viewport = Some(viewport),
                Command::ClearRenderTarget { view, color } => {
                    self.flush_pass(&mut encoder, pass.take());
                    self.state.color_clears.insert(view, color);
                }
                Command::ClearDepthStencil { view, depth, .. } => {
                    self.flush_pass(&mut encoder, pass.take());
                    self.state.depth_clears.insert(view, depth);
                }
                Command::DrawIndexed {
                    index_count,
                    start_index,
                    base_vertex,
                } => {
                    let call = DrawCall {
                        index_count,
                        instance_count: 1,
                        start_index,
                        base_vertex,
                        start_instance: 0,
                    };
                    self.record_draw(&mut pass, call);
                }
                Command::DrawIndexedInstanced {
                    index_count,
                    instance_count,
                    start_index,
                    base_vertex,
                    start_instance,
                } => {
                    let call = DrawCall {
                        index_count,
                        instance_count,
                        start_index,
                        base_vertex,
                        start_instance,
                    };
                    self.record_draw(&mut pass, call);
                }
                Command::Present { .. } => {
                    self.flush_pass(&mut encoder, pass.take());
                    self.flush_clears(&mut encoder);
                    let finished = std::mem::replace(&mut encoder, self.new_encoder());
                    self.submit(finished);
                    self.present();
                }
            }
        }

        self.flush_pass(&mut encoder, pass.take());
        self.flush_clears(&mut encoder);
        self.submit(encoder);
    }

    fn new_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            })
    }

    fn submit(&mut self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        self.staging.clear();
    }

    fn present(&mut self) {
        if let BackBuffer::Surface { frame, .. } = &mut self.back_buffer {
            if let Some((texture, _view)) = frame.take() {
                texture.present();
            }
        }
    }

    fn copy_into_buffer(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        buffer: BufferHandle,
        data: &[u8],
    ) {
        let Some(target) = self.buffers.get(&buffer.0) else {
            log::warn!("UpdateSubresource on unknown buffer {:?}", buffer);
            return;
        };
        let size = aligned_size(data.len() as u64);
        if size == 0 {
            return;
        }
        if size > target.size {
            log::warn!(
                "UpdateSubresource of {} bytes overflows buffer of {} bytes",
                data.len(),
                target.size
            );
            return;
        }
        let mut padded = data.to_vec();
        padded.resize(size as usize, 0);
        let staging = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Staging Buffer"),
                contents: &padded,
                usage: wgpu::BufferUsages::COPY_SRC,
            });
        encoder.copy_buffer_to_buffer(&staging, 0, &target.buffer, 0, size);
        self.staging.push(staging);
    }

    fn view_format(&self, view: RenderTargetViewHandle) -> Option<TextureFormat> {
        if view.0 == self.back_buffer_view {
            Some(self.back_buffer_format)
        } else {
            self.views.get(&view.0).map(|v| v.format)
        }
    }

    fn snapshot_draw(&self, call: DrawCall) -> Option<RecordedDraw> {
        let state = &self.state;
        let (Some(vertex_shader), Some(pixel_shader), Some(input_layout)) =
            (state.vertex_shader, state.pixel_shader, state.input_layout)
        else {
            log::trace!("Skipping draw: shaders or input layout not bound");
            return None;
        };
        let Some((index, index_format, index_offset)) = state.index_buffer else {
            log::trace!("Skipping draw: no index buffer bound");
            return None;
        };
        if state.render_target.is_none() && state.depth_stencil.is_none() {
            log::trace!("Skipping draw: no render target bound");
            return None;
        }
        let elements = self.input_layouts.get(&input_layout.0)?;

        let mut slots: Vec<u32> = elements.iter().map(|e| e.input_slot).collect();
        slots.sort_unstable();
        slots.dedup();

        let mut strides = Vec::with_capacity(slots.len());
        let mut vertex_buffers = Vec::with_capacity(slots.len());
        for slot in slots {
            let Some(binding) = state.vertex_buffers.get(&slot) else {
                log::warn!("Skipping draw: input slot {} has no vertex buffer", slot);
                return None;
            };
            let buffer = binding.buffer?;
            strides.push((slot, binding.stride));
            vertex_buffers.push((buffer, binding.offset as u64));
        }

        let mut groups: [Vec<LayoutEntry>; 2] = Default::default();
        let mut resources: [Vec<(u32, BindingResource)>; 2] = Default::default();
        for group in [VERTEX_GROUP, PIXEL_GROUP] {
            for (&slot, &buffer) in &state.constant_buffers[group] {
                groups[group].push(LayoutEntry::Uniform { binding: slot });
                resources[group].push((slot, BindingResource::Buffer(buffer)));
            }
            for (&slot, &view) in &state.shader_resources[group] {
                let filterable = self
                    .views
                    .get(&view.0)
                    .map(|v| v.format.is_filterable())
                    .unwrap_or(true);
                let binding = TEXTURE_BINDING_BASE + slot;
                groups[group].push(LayoutEntry::Texture {
                    binding,
                    filterable,
                });
                resources[group].push((binding, BindingResource::Texture(view)));
            }
            for (&slot, &sampler) in &state.samplers[group] {
                let filtering = self
                    .samplers
                    .get(&sampler.0)
                    .map(|s| s.filtering)
                    .unwrap_or(false);
                let binding = SAMPLER_BINDING_BASE + slot;
                groups[group].push(LayoutEntry::Sampler { binding, filtering });
                resources[group].push((binding, BindingResource::Sampler(sampler)));
            }
        }

        let key = PipelineKey {
            vertex_shader,
            pixel_shader,
            input_layout,
            strides,
            topology: state.topology,
            index_format,
            color_format: state.render_target.and_then(|rt| self.view_format(rt)),
            depth_format: state
                .depth_stencil
                .and_then(|ds| self.views.get(&ds.0).map(|v| v.format)),
            depth_state: state.depth_state,
            groups,
        };

        Some(RecordedDraw {
            key,
            vertex_buffers,
            index_buffer: (index, index_format, index_offset as u64),
            resources,
            viewport: state.viewport,
            call,
        })
    }

    fn record_draw(&mut self, pass: &mut Option<PendingPass>, call: DrawCall) {
        let Some(draw) = self.snapshot_draw(call) else {
            return;
        };
        let pass = pass.get_or_insert_with(|| PendingPass {
            render_target: self.state.render_target,
            depth_stencil: self.state.depth_stencil,
            draws: Vec::new(),
        });
        pass.draws.push(draw);
    }

    fn ensure_bind_group_layout(&mut self, entries: &[LayoutEntry]) {
        if self.bind_group_layouts.contains_key(entries) {
            return;
        }
        let visibility = wgpu::ShaderStages::VERTEX_FRAGMENT;
        let wgpu_entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|entry| match *entry {
                LayoutEntry::Uniform { binding } => wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                LayoutEntry::Texture {
                    binding,
                    filterable,
                } => wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                LayoutEntry::Sampler { binding, filtering } => wgpu::BindGroupLayoutEntry {
                    binding,
                    visibility,
                    ty: wgpu::BindingType::Sampler(if filtering {
                        wgpu::SamplerBindingType::Filtering
                    } else {
                        wgpu::SamplerBindingType::NonFiltering
                    }),
                    count: None,
                },
            })
            .collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &wgpu_entries,
            });
        self.bind_group_layouts.insert(entries.to_vec(), layout);
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> Result<(), String> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }
        self.ensure_bind_group_layout(&key.groups[VERTEX_GROUP]);
        self.ensure_bind_group_layout(&key.groups[PIXEL_GROUP]);

        let vertex = self
            .vertex_shaders
            .get(&key.vertex_shader.0)
            .ok_or("unknown vertex shader")?;
        let pixel = self
            .pixel_shaders
            .get(&key.pixel_shader.0)
            .ok_or("unknown pixel shader")?;
        let elements = self
            .input_layouts
            .get(&key.input_layout.0)
            .ok_or("unknown input layout")?;
        let layouts = [
            self.bind_group_layouts
                .get(&key.groups[VERTEX_GROUP])
                .ok_or("missing vertex bind group layout")?,
            self.bind_group_layouts
                .get(&key.groups[PIXEL_GROUP])
                .ok_or("missing pixel bind group layout")?,
        ];

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        // Build vertex buffer layouts with proper lifetimes
        let vertex_attrs: Vec<Vec<wgpu::VertexAttribute>> = key
            .strides
            .iter()
            .map(|(slot, _)| {
                elements
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.input_slot == *slot)
                    .map(|(location, e)| wgpu::VertexAttribute {
                        format: Self::convert_vertex_format(e.format),
                        offset: e.aligned_byte_offset as u64,
                        shader_location: location as u32,
                    })
                    .collect()
            })
            .collect();

        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = key
            .strides
            .iter()
            .zip(vertex_attrs.iter())
            .map(|((slot, stride), attrs)| {
                let per_instance = elements.iter().any(|e| {
                    e.input_slot == *slot && e.classification == InputClassification::PerInstance
                });
                wgpu::VertexBufferLayout {
                    array_stride: *stride as u64,
                    step_mode: if per_instance {
                        wgpu::VertexStepMode::Instance
                    } else {
                        wgpu::VertexStepMode::Vertex
                    },
                    attributes: attrs,
                }
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = key
            .color_format
            .map(|format| wgpu::ColorTargetState {
                format: Self::convert_texture_format(format),
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
            .into_iter()
            .map(Some)
            .collect();

        let strip_index_format = match key.topology {
            PrimitiveTopology::TriangleStrip => Some(Self::convert_index_format(key.index_format)),
            _ => None,
        };

        let depth_stencil = key.depth_format.map(|format| wgpu::DepthStencilState {
            format: Self::convert_texture_format(format),
            depth_write_enabled: key.depth_state.depth_write_enabled,
            depth_compare: Self::convert_compare_function(key.depth_state.depth_compare),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Scene Pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: &vertex.entry_point,
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &pixel.module,
                    entry_point: &pixel.entry_point,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: Self::convert_topology(key.topology),
                    strip_index_format,
                    // Clockwise front faces with back-face culling
                    front_face: wgpu::FrontFace::Cw,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(error.to_string());
        }

        self.pipelines.insert(key.clone(), pipeline);
        Ok(())
    }

    fn create_bind_group(
        &self,
        entries: &[LayoutEntry],
        resources: &[(u32, BindingResource)],
    ) -> Option<wgpu::BindGroup> {
        let layout = self.bind_group_layouts.get(entries)?;
        let mut wgpu_entries = Vec::with_capacity(resources.len());
        for (binding, resource) in resources {
            let resource = match resource {
                BindingResource::Buffer(buffer) => {
                    self.buffers.get(&buffer.0)?.buffer.as_entire_binding()
                }
                BindingResource::Texture(view) => {
                    wgpu::BindingResource::TextureView(&self.views.get(&view.0)?.view)
                }
                BindingResource::Sampler(sampler) => {
                    wgpu::BindingResource::Sampler(&self.samplers.get(&sampler.0)?.sampler)
                }
            };
            wgpu_entries.push(wgpu::BindGroupEntry {
                binding: *binding,
                resource,
            });
        }
        Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &wgpu_entries,
        }))
    }

    /// Acquire the swap chain image for this frame if it is not held yet
    fn acquire_frame(&mut self) -> bool {
        let BackBuffer::Surface {
            surface,
            config,
            frame,
        } = &mut self.back_buffer
        else {
            return true;
        };
        if frame.is_some() {
            return true;
        }
        let texture = match surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(&self.device, config);
                match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(e) => {
                        log::warn!("Failed to acquire swap chain image: {}", e);
                        return false;
                    }
                }
            }
            Err(e) => {
                log::warn!("Failed to acquire swap chain image: {}", e);
                return false;
            }
        };
        let view = texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        *frame = Some((texture, view));
        true
    }

    fn color_view(&self, view: RenderTargetViewHandle) -> Option<&wgpu::TextureView> {
        if view.0 != self.back_buffer_view {
            return self.views.get(&view.0).map(|v| &v.view);
        }
        match &self.back_buffer {
            BackBuffer::Surface { frame, .. } => frame.as_ref().map(|(_, view)| view),
            BackBuffer::Headless { view, .. } => Some(view),
        }
    }

    fn flush_pass(&mut self, encoder: &mut wgpu::CommandEncoder, pass: Option<PendingPass>) {
        let Some(pass) = pass else {
            return;
        };
        if pass.draws.is_empty() {
            return;
        }
        if pass.render_target.map(|rt| rt.0) == Some(self.back_buffer_view) && !self.acquire_frame()
        {
            return;
        }

        let mut prepared = Vec::with_capacity(pass.draws.len());
        for draw in &pass.draws {
            if let Err(error) = self.ensure_pipeline(&draw.key) {
                log::warn!("Skipping draw: pipeline creation failed: {}", error);
                continue;
            }
            let vertex_group =
                self.create_bind_group(&draw.key.groups[VERTEX_GROUP], &draw.resources[VERTEX_GROUP]);
            let pixel_group =
                self.create_bind_group(&draw.key.groups[PIXEL_GROUP], &draw.resources[PIXEL_GROUP]);
            match (vertex_group, pixel_group) {
                (Some(vertex), Some(pixel)) => prepared.push((draw, [vertex, pixel])),
                _ => log::warn!("Skipping draw: bound resource no longer exists"),
            }
        }

        let color_load = pass.render_target.map(|rt| {
            match self.state.color_clears.remove(&rt) {
                Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: c[0] as f64,
                    g: c[1] as f64,
                    b: c[2] as f64,
                    a: c[3] as f64,
                }),
                None => wgpu::LoadOp::Load,
            }
        });
        let depth_load = pass
            .depth_stencil
            .map(|ds| match self.state.depth_clears.remove(&ds) {
                Some(depth) => wgpu::LoadOp::Clear(depth),
                None => wgpu::LoadOp::Load,
            });

        let this = &*self;
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = pass
            .render_target
            .zip(color_load)
            .and_then(|(rt, load)| {
                this.color_view(rt).map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .into_iter()
            .map(Some)
            .collect();
        let depth_attachment = pass.depth_stencil.zip(depth_load).and_then(|(ds, load)| {
            this.views
                .get(&ds.0)
                .map(|v| wgpu::RenderPassDepthStencilAttachment {
                    view: &v.view,
                    depth_ops: Some(wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                })
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Scene Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: depth_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for (draw, groups) in &prepared {
            let Some(pipeline) = this.pipelines.get(&draw.key) else {
                continue;
            };
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &groups[VERTEX_GROUP], &[]);
            render_pass.set_bind_group(1, &groups[PIXEL_GROUP], &[]);
            for (slot, (buffer, offset)) in draw.vertex_buffers.iter().enumerate() {
                if let Some(entry) = this.buffers.get(&buffer.0) {
                    render_pass.set_vertex_buffer(slot as u32, entry.buffer.slice(*offset..));
                }
            }
            let (index, format, offset) = draw.index_buffer;
            if let Some(entry) = this.buffers.get(&index.0) {
                render_pass
                    .set_index_buffer(entry.buffer.slice(offset..), Self::convert_index_format(format));
            }
            if let Some(vp) = draw.viewport {
                render_pass.set_viewport(vp.x, vp.y, vp.width, vp.height, vp.min_depth, vp.max_depth);
            }
            let call = draw.call;
            render_pass.draw_indexed(
                call.start_index..call.start_index + call.index_count,
                call.base_vertex,
                call.start_instance..call.start_instance + call.instance_count,
            );
        }
    }

    /// Clear views whose clear was never consumed by a pass
    fn flush_clears(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let color_clears: Vec<_> = self.state.color_clears.drain().collect();
        let depth_clears: Vec<_> = self.state.depth_clears.drain().collect();

        for (rt, c) in color_clears {
            if rt.0 == self.back_buffer_view && !self.acquire_frame() {
                continue;
            }
            let Some(view) = self.color_view(rt) else {
                continue;
            };
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: c[0] as f64,
                            g: c[1] as f64,
                            b: c[2] as f64,
                            a: c[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        for (ds, depth) in depth_clears {
            let Some(entry) = self.views.get(&ds.0) else {
                continue;
            };
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &entry.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(depth),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
    }
}
