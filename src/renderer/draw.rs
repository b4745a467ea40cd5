//! Shadow and main pass recording

use std::collections::BTreeMap;

use glam::Mat4;

use super::constants::{
    cb_slot, shadow_map_slot, srv_slot, CbLights, CbShadowMatrix, CbSkinning, NUM_LIGHTS,
};
use super::{FrameResources, RendererConfig, ShadowShaders};
use crate::backend::{
    DepthStencilState, DeviceContext, IndexFormat, InputLayoutHandle, PixelShaderHandle,
    VertexBufferBinding, VertexShaderHandle,
};
use crate::resources::{
    AnimationData, InstanceData, NormalData, SamplerType, SimpleVertex, Texture, EXTRA_SLOT,
    VERTEX_SLOT,
};
use crate::scene::{Camera, Renderable, RenderableBuffers, RenderableKind, Scene};

/// Sampler bound next to every shadow map
const SHADOW_MAP_SAMPLER: SamplerType = SamplerType::LinearClamp;

/// Borrowed state for recording one frame
pub(super) struct FramePass<'a> {
    pub ctx: &'a mut DeviceContext,
    pub frame: &'a FrameResources,
    pub config: &'a RendererConfig,
    pub camera: &'a Camera,
    pub invalid_texture: &'a Texture,
}

/// GPU handles a draw needs, resolved up front
struct DrawHandles {
    buffers: RenderableBuffers,
    vertex_shader: VertexShaderHandle,
    input_layout: InputLayoutHandle,
    pixel_shader: PixelShaderHandle,
}

fn resolve(name: &str, renderable: &Renderable) -> Option<DrawHandles> {
    let handles = (|| {
        let vertex = renderable.vertex_shader()?;
        Some(DrawHandles {
            buffers: renderable.buffers()?,
            vertex_shader: vertex.handle()?,
            input_layout: vertex.input_layout()?,
            pixel_shader: renderable.pixel_shader()?.handle()?,
        })
    })();
    if handles.is_none() {
        log::trace!("Skipping '{}': shaders or buffers missing", name);
    }
    handles
}

fn lights_constants(scene: &Scene) -> CbLights {
    let mut cb = CbLights::default();
    for (i, light) in scene.point_lights().iter() {
        cb.point_lights[i] = light.constants();
        cb.light_views[i] = light.view();
        cb.light_projections[i] = light.projection();
    }
    cb
}

impl FramePass<'_> {
    /// Render every object of `scene` into each populated light's shadow map
    pub fn shadow_pass(&mut self, scene: &Scene, shaders: &ShadowShaders) {
        let (Some(vertex_shader), Some(input_layout), Some(pixel_shader)) = (
            shaders.vertex.handle(),
            shaders.vertex.input_layout(),
            shaders.pixel.handle(),
        ) else {
            log::trace!("Skipping shadow pass: shadow shaders not created");
            return;
        };

        // A shadow map cannot be sampled while it is the render target
        self.ctx.ps_set_shader_resources(srv_slot::DIFFUSE, &[None, None]);
        for i in 0..NUM_LIGHTS {
            self.ctx.ps_set_shader_resources(shadow_map_slot(i), &[None]);
        }

        for (index, light) in scene.point_lights().iter() {
            let Some(target) = self.frame.shadow_maps.get(index).and_then(|map| map.views()) else {
                continue;
            };
            self.ctx
                .set_render_targets(Some(target.render_target), Some(self.frame.depth_stencil));
            self.ctx.set_viewport(self.frame.viewport);
            self.ctx
                .clear_render_target(target.render_target, self.config.shadow_clear_color);
            self.ctx.clear_depth_stencil(self.frame.depth_stencil, 1.0, 0);

            let objects = scene
                .renderables()
                .chain(scene.voxels())
                .chain(scene.models());
            for (name, renderable) in objects {
                let Some(buffers) = renderable.buffers() else {
                    log::trace!("Skipping shadow of '{}': buffers missing", name);
                    continue;
                };
                let instances = if renderable.is_voxel() {
                    match buffers.extra {
                        Some(buffer) => buffer,
                        None => continue,
                    }
                } else {
                    self.frame.identity_instance
                };

                self.ctx.set_vertex_buffers(
                    VERTEX_SLOT,
                    &[VertexBufferBinding::new(buffers.vertex, SimpleVertex::STRIDE)],
                );
                self.ctx.set_vertex_buffers(
                    EXTRA_SLOT,
                    &[VertexBufferBinding::new(instances, InstanceData::STRIDE)],
                );
                self.ctx.set_index_buffer(buffers.index, IndexFormat::Uint16, 0);
                self.ctx.set_input_layout(input_layout);

                let cb = CbShadowMatrix::new(
                    renderable.world(),
                    light.view(),
                    light.projection(),
                    renderable.is_voxel(),
                );
                self.ctx
                    .update_subresource(self.frame.cb_shadow_matrix, bytemuck::bytes_of(&cb));
                self.ctx.vs_set_shader(vertex_shader);
                self.ctx.ps_set_shader(pixel_shader);
                self.ctx
                    .vs_set_constant_buffers(cb_slot::SHADOW_MATRIX, &[self.frame.cb_shadow_matrix]);

                for mesh in renderable.submeshes() {
                    if renderable.is_voxel() {
                        self.ctx.draw_indexed_instanced(
                            mesh.num_indices,
                            renderable.num_instances(),
                            mesh.base_index,
                            mesh.base_vertex as i32,
                            0,
                        );
                    } else {
                        self.ctx
                            .draw_indexed(mesh.num_indices, mesh.base_index, mesh.base_vertex as i32);
                    }
                }
            }
        }

        self.ctx
            .set_render_targets(Some(self.frame.render_target), Some(self.frame.depth_stencil));
    }

    /// Clear the back buffer and draw every initialized scene in name order
    pub fn main_pass(&mut self, scenes: &BTreeMap<String, Scene>) {
        self.ctx
            .clear_render_target(self.frame.render_target, self.config.clear_color);
        self.ctx.clear_depth_stencil(self.frame.depth_stencil, 1.0, 0);

        if let Some(camera_buffer) = self.camera.constant_buffer() {
            self.ctx
                .update_subresource(camera_buffer, bytemuck::bytes_of(&self.camera.constants()));
        }

        for (scene_name, scene) in scenes {
            if !scene.is_initialized() {
                log::trace!("Skipping scene '{}': not initialized", scene_name);
                continue;
            }
            let lights = lights_constants(scene);
            self.ctx
                .update_subresource(self.frame.cb_lights, bytemuck::bytes_of(&lights));

            let skybox_texture = scene
                .skybox()
                .and_then(|skybox| skybox.material(0))
                .and_then(|material| material.diffuse.as_deref());
            if let Some(texture) = skybox_texture {
                self.bind_texture(srv_slot::SKYBOX, texture);
            }

            for (name, renderable) in scene.renderables() {
                self.draw_object(name, renderable, renderable.world());
            }
            for (name, voxel) in scene.voxels() {
                self.draw_object(name, voxel, voxel.world());
            }
            for (name, model) in scene.models() {
                self.draw_object(name, model, model.world());
            }
            if let Some(skybox) = scene.skybox() {
                // Recentered on the eye so it never gets closer
                let world = Mat4::from_translation(self.camera.eye()) * skybox.world();
                self.ctx.set_depth_stencil_state(DepthStencilState::READ_ONLY);
                self.draw_object("skybox", skybox, world);
                self.ctx.set_depth_stencil_state(DepthStencilState::default());
            }
        }
    }

    /// Bind `texture` and its sampler at `slot`, falling back to the invalid
    /// texture when it has no GPU view.
    fn bind_texture(&mut self, slot: u32, texture: &Texture) {
        let texture = if texture.view().is_some() {
            texture
        } else {
            self.invalid_texture
        };
        let Some(view) = texture.view() else {
            return;
        };
        self.ctx.ps_set_shader_resources(slot, &[Some(view)]);
        self.ctx
            .ps_set_samplers(slot, &[self.frame.samplers.get(texture.sampler_type())]);
    }

    fn bind_vertex_buffers(&mut self, renderable: &Renderable, buffers: &RenderableBuffers) -> bool {
        let vertex = VertexBufferBinding::new(buffers.vertex, SimpleVertex::STRIDE);
        let normal = buffers
            .normal
            .map_or_else(VertexBufferBinding::unbound, |buffer| {
                VertexBufferBinding::new(buffer, NormalData::STRIDE)
            });
        let bindings = match renderable.kind() {
            RenderableKind::Skybox => vec![vertex],
            RenderableKind::Mesh => vec![vertex, normal],
            RenderableKind::Voxel { .. } => {
                let Some(instances) = buffers.extra else {
                    return false;
                };
                vec![vertex, normal, VertexBufferBinding::new(instances, InstanceData::STRIDE)]
            }
            RenderableKind::Model { .. } => {
                let animation = buffers
                    .extra
                    .map_or_else(VertexBufferBinding::unbound, |buffer| {
                        VertexBufferBinding::new(buffer, AnimationData::STRIDE)
                    });
                vec![vertex, normal, animation]
            }
        };
        self.ctx.set_vertex_buffers(VERTEX_SLOT, &bindings);
        true
    }

    /// Record buffers, layout, constants, shaders, bindings and draws of one object
    fn draw_object(&mut self, name: &str, renderable: &Renderable, world: Mat4) {
        let Some(handles) = resolve(name, renderable) else {
            return;
        };
        let buffers = handles.buffers;
        if !self.bind_vertex_buffers(renderable, &buffers) {
            log::trace!("Skipping '{}': no instances", name);
            return;
        }
        self.ctx.set_index_buffer(buffers.index, IndexFormat::Uint16, 0);
        self.ctx.set_input_layout(handles.input_layout);

        let constants = renderable.constants(world);
        self.ctx
            .update_subresource(buffers.constant, bytemuck::bytes_of(&constants));
        let skinning = renderable.skinning().zip(buffers.skinning);
        if let Some((skinning, buffer)) = skinning {
            let bones = CbSkinning::from_transforms(skinning.bone_transforms());
            self.ctx.update_subresource(buffer, bytemuck::bytes_of(&bones));
        }

        self.ctx.vs_set_shader(handles.vertex_shader);
        self.ctx.ps_set_shader(handles.pixel_shader);

        let camera = self.camera.constant_buffer();
        let frame = self.frame;
        let shared = camera.map(|camera| [camera, frame.cb_change_on_resize, buffers.constant]);
        if renderable.is_skybox() {
            if let Some(shared) = shared {
                self.ctx.vs_set_constant_buffers(cb_slot::CAMERA, &shared);
            }
            self.draw_skybox(renderable);
            return;
        }

        if let Some(shared) = shared {
            self.ctx.vs_set_constant_buffers(cb_slot::CAMERA, &shared);
        }
        self.ctx.vs_set_constant_buffers(cb_slot::LIGHTS, &[frame.cb_lights]);
        if let Some((_, buffer)) = skinning {
            self.ctx.vs_set_constant_buffers(cb_slot::SKINNING, &[buffer]);
        }
        if let Some(camera) = camera {
            self.ctx.ps_set_constant_buffers(cb_slot::CAMERA, &[camera]);
        }
        self.ctx
            .ps_set_constant_buffers(cb_slot::OBJECT, &[buffers.constant, frame.cb_lights]);

        let shadow_sampler = frame.samplers.get(SHADOW_MAP_SAMPLER);
        for (i, shadow_map) in frame.shadow_maps.iter().enumerate() {
            if let Some(views) = shadow_map.views() {
                let slot = shadow_map_slot(i);
                self.ctx.ps_set_shader_resources(slot, &[Some(views.shader_resource)]);
                self.ctx.ps_set_samplers(slot, &[shadow_sampler]);
            }
        }

        if renderable.is_voxel() {
            self.draw_voxel(renderable);
        } else {
            self.draw_meshes(renderable);
        }
    }

    /// One draw over all indices, or one per submesh with its material bound
    fn draw_meshes(&mut self, renderable: &Renderable) {
        if !renderable.has_texture() {
            self.ctx.draw_indexed(renderable.num_indices(), 0, 0);
            return;
        }
        let normal_mapped = renderable.has_normal_map();
        for mesh in renderable.submeshes() {
            let material = renderable.material(mesh.material_index as usize);
            let diffuse = material.and_then(|m| m.diffuse.as_deref());
            self.bind_texture(srv_slot::DIFFUSE, diffuse.unwrap_or(self.invalid_texture));
            if normal_mapped {
                if let Some(normal) = material.and_then(|m| m.normal.as_deref()) {
                    self.bind_texture(srv_slot::NORMAL, normal);
                }
            }
            self.ctx
                .draw_indexed(mesh.num_indices, mesh.base_index, mesh.base_vertex as i32);
        }
    }

    fn draw_voxel(&mut self, voxel: &Renderable) {
        if let Some(material) = voxel.material(0) {
            let diffuse = material.diffuse.as_deref().unwrap_or(self.invalid_texture);
            self.bind_texture(srv_slot::DIFFUSE, diffuse);
            if let Some(normal) = material.normal.as_deref() {
                self.bind_texture(srv_slot::NORMAL, normal);
            }
        }
        self.ctx
            .draw_indexed_instanced(voxel.num_indices(), voxel.num_instances(), 0, 0, 0);
    }

    fn draw_skybox(&mut self, skybox: &Renderable) {
        if !skybox.has_texture() {
            self.ctx.draw_indexed(skybox.num_indices(), 0, 0);
            return;
        }
        for mesh in skybox.submeshes() {
            let diffuse = skybox
                .material(mesh.material_index as usize)
                .and_then(|m| m.diffuse.as_deref())
                .unwrap_or(self.invalid_texture);
            self.bind_texture(srv_slot::SKYBOX, diffuse);
            self.ctx
                .draw_indexed(mesh.num_indices, mesh.base_index, mesh.base_vertex as i32);
        }
    }
}
