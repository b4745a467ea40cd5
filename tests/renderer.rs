//! Frame-level tests of the renderer against the recording dummy device.
//!
//! Every frame is submitted as one command list, so each test renders and
//! then inspects `DummyDevice::last_executed`.

mod common;

use glam::{Mat4, Vec3};
use rstest::rstest;

use common::*;
use scene_renderer::backend::{
    BackendError, Command, DepthStencilState, DriverType, DummyFailure, DummyProvider,
    GraphicsDevice, ShaderStage,
};
use scene_renderer::renderer::constants::{
    shadow_map_slot, CbChangesEveryFrame, CbShadowMatrix, MAX_NUM_BONES,
};
use scene_renderer::resources::{AnimationData, MeshData};
use scene_renderer::scene::Skinning;
use scene_renderer::{Renderable, RendererError, Scene};

fn single_renderable_renderer(num_indices: u32) -> scene_renderer::Renderer<DummyProvider> {
    let mut scene = scene_with_shaders();
    add_shaded_renderable(&mut scene, "cube", Renderable::new(quad(num_indices)));
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer
}

// ============================================================================
// Scene registry
// ============================================================================

#[test]
fn test_duplicate_scene_is_rejected() {
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", Scene::new()).unwrap();
    assert_eq!(
        renderer.add_scene("main", Scene::new()),
        Err(RendererError::DuplicateScene("main".into()))
    );
}

#[test]
fn test_unknown_main_scene_is_rejected() {
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", Scene::new()).unwrap();
    assert_eq!(
        renderer.set_main_scene("other"),
        Err(RendererError::SceneNotFound("other".into()))
    );
    assert_eq!(renderer.main_scene_name(), None);
}

#[test]
fn test_initialize_requires_main_scene() {
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", Scene::new()).unwrap();
    assert_eq!(renderer.initialize(&target()), Err(RendererError::NoMainScene));
    assert!(!renderer.is_initialized());
}

// ============================================================================
// Initialization
// ============================================================================

#[rstest]
#[case::hardware(&[], DriverType::Hardware)]
#[case::warp(&[DriverType::Hardware], DriverType::Warp)]
#[case::reference(&[DriverType::Hardware, DriverType::Warp], DriverType::Reference)]
fn test_driver_fallback(#[case] unavailable: &[DriverType], #[case] expected: DriverType) {
    let mut provider = DummyProvider::new();
    for &driver in unavailable {
        provider = provider.without_driver(driver);
    }
    let mut renderer = renderer(provider);
    renderer.add_scene("main", Scene::new()).unwrap();
    renderer.set_main_scene("main").unwrap();

    renderer.initialize(&target()).unwrap();
    assert_eq!(renderer.driver_type(), Some(expected));
}

#[test]
fn test_no_driver_available() {
    let provider = DummyProvider::new()
        .without_driver(DriverType::Hardware)
        .without_driver(DriverType::Warp)
        .without_driver(DriverType::Reference);
    let mut renderer = renderer(provider);
    renderer.add_scene("main", Scene::new()).unwrap();
    renderer.set_main_scene("main").unwrap();

    let result = renderer.initialize(&target());
    assert!(matches!(
        result,
        Err(RendererError::Backend(BackendError::DeviceCreationFailed(_)))
    ));
    assert_eq!(renderer.driver_type(), None);
}

#[rstest]
#[case::back_buffer(DummyFailure::BackBuffer)]
#[case::depth_stencil(DummyFailure::Texture("Depth".into()))]
#[case::projection(DummyFailure::Buffer("Projection".into()))]
#[case::lights(DummyFailure::Buffer("Lights".into()))]
#[case::shadow_map(DummyFailure::Texture("Shadow Map".into()))]
#[case::sampler(DummyFailure::Sampler)]
#[case::renderable(DummyFailure::Buffer("Vertex Buffer".into()))]
#[case::vertex_shader(DummyFailure::VertexShader)]
#[case::pixel_shader(DummyFailure::PixelShader)]
fn test_failed_initialization_leaves_no_device(#[case] failure: DummyFailure) {
    let mut scene = scene_with_shaders();
    add_shaded_renderable(&mut scene, "cube", Renderable::new(quad(6)));
    let mut renderer = renderer(DummyProvider::new().failing(failure));
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();

    assert!(renderer.initialize(&target()).is_err());
    assert!(!renderer.is_initialized());
    // Nothing to render into; must not panic
    renderer.render();
}

#[test]
fn test_initialize_sizes_resources_to_back_buffer() {
    let mut renderer = single_renderable_renderer(6);
    renderer.initialize(&target()).unwrap();
    let device = renderer.device().unwrap();
    assert_eq!(device.back_buffer_size(), (WIDTH, HEIGHT));
    // Nine sampler types, created once
    assert_eq!(device.sampler_count(), 9);
    assert!(renderer.main_scene().unwrap().is_initialized());
}

// ============================================================================
// Main pass
// ============================================================================

#[test]
fn test_single_renderable_draws_once() {
    let mut renderer = single_renderable_renderer(100);
    renderer.initialize(&target()).unwrap();
    renderer.update(0.016);
    renderer.render();

    let device = renderer.device().unwrap();
    let frame = device.last_executed().unwrap();
    assert_eq!(
        draws(frame),
        vec![Command::DrawIndexed {
            index_count: 100,
            start_index: 0,
            base_vertex: 0,
        }]
    );
    assert_eq!(device.frames_presented(), 1);
}

#[test]
fn test_render_before_initialize_does_nothing() {
    let mut renderer = single_renderable_renderer(6);
    renderer.render();
    assert!(renderer.device().is_none());
}

#[test]
fn test_present_once_per_frame() {
    let mut renderer = single_renderable_renderer(6);
    renderer.initialize(&target()).unwrap();
    for _ in 0..3 {
        renderer.update(1.0 / 60.0);
        renderer.render();
    }

    let device = renderer.device().unwrap();
    assert_eq!(device.frames_presented(), 3);
    let frame = device.last_executed().unwrap();
    assert_eq!(count(frame, |c| matches!(c, Command::Present { .. })), 1);
    assert!(matches!(frame.commands().last(), Some(Command::Present { .. })));
}

#[test]
fn test_frame_clears_back_buffer_first() {
    let mut renderer = single_renderable_renderer(6);
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    assert!(matches!(
        frame.commands().first(),
        Some(Command::ClearRenderTarget { color, .. }) if *color == renderer.config().clear_color
    ));
}

#[test]
fn test_object_binding_order() {
    let mut renderer = single_renderable_renderer(6);
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let constant = renderer
        .main_scene()
        .and_then(|scene| scene.renderable("cube"))
        .and_then(|cube| cube.buffers())
        .unwrap()
        .constant;
    let frame = renderer.device().unwrap().last_executed().unwrap();
    let position = |predicate: &dyn Fn(&Command) -> bool| frame.position(predicate).unwrap();

    let vertex_buffers = position(&|c| matches!(c, Command::SetVertexBuffers { .. }));
    let index_buffer = position(&|c| matches!(c, Command::SetIndexBuffer { .. }));
    let layout = position(&|c| matches!(c, Command::SetInputLayout(_)));
    let update = position(&|c| matches!(c, Command::UpdateSubresource { buffer, .. } if *buffer == constant));
    let vertex_shader = position(&|c| matches!(c, Command::SetVertexShader(_)));
    let pixel_shader = position(&|c| matches!(c, Command::SetPixelShader(_)));
    let vs_constants = position(&|c| {
        matches!(c, Command::SetConstantBuffers { stage: ShaderStage::Vertex, start_slot: 0, .. })
    });
    let draw = position(&|c| c.is_draw());

    assert!(vertex_buffers < index_buffer);
    assert!(index_buffer < layout);
    assert!(layout < update);
    assert!(update < vertex_shader);
    assert!(vertex_shader < pixel_shader);
    assert!(pixel_shader < vs_constants);
    assert!(vs_constants < draw);
}

#[test]
fn test_shadow_maps_bound_for_lit_objects() {
    let mut renderer = single_renderable_renderer(6);
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    for light in 0..2 {
        let slot = shadow_map_slot(light);
        assert_eq!(
            count(frame, |c| matches!(
                c,
                Command::SetShaderResources { start_slot, views, .. }
                    if *start_slot == slot && views[0].is_some()
            )),
            1
        );
    }
}

#[test]
fn test_textured_renderable_draws_each_submesh() {
    let mut scene = scene_with_shaders();
    add_shaded_renderable(&mut scene, "pair", two_submesh_renderable());
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    assert_eq!(
        draws(frame),
        vec![
            Command::DrawIndexed {
                index_count: 6,
                start_index: 0,
                base_vertex: 0,
            },
            Command::DrawIndexed {
                index_count: 12,
                start_index: 6,
                base_vertex: 4,
            },
        ]
    );
    // A diffuse texture bound before each draw
    assert_eq!(
        count(frame, |c| matches!(
            c,
            Command::SetShaderResources { start_slot: 0, views, .. } if views[0].is_some()
        )),
        2
    );
}

#[test]
fn test_voxel_draws_all_instances_at_once() {
    let mut scene = scene_with_shaders();
    add_shaded_voxel(&mut scene, "blocks", 3);
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    assert_eq!(
        draws(frame),
        vec![Command::DrawIndexedInstanced {
            index_count: 36,
            instance_count: 3,
            start_index: 0,
            base_vertex: 0,
            start_instance: 0,
        }]
    );
    let bindings = frame
        .commands()
        .iter()
        .find_map(|c| match c {
            Command::SetVertexBuffers { start_slot: 0, bindings } => Some(bindings.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(bindings.len(), 3);
    assert_eq!(bindings[2].stride, 64);
}

#[test]
fn test_model_uploads_bone_transforms() {
    let mesh = quad(6);
    let data = vec![<AnimationData as bytemuck::Zeroable>::zeroed(); mesh.vertices.len()];
    let bone = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
    let skinning = Skinning::new(data, vec![bone, Mat4::IDENTITY]).unwrap();

    let mut scene = scene_with_shaders();
    scene.add_model("hero", Renderable::model(mesh, skinning)).unwrap();
    scene.set_vertex_shader_of_model("hero", "VSModel").unwrap();
    scene.set_pixel_shader_of_model("hero", "PS").unwrap();
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let skinning_buffer = renderer
        .main_scene()
        .and_then(|scene| scene.model("hero"))
        .and_then(|hero| hero.buffers())
        .and_then(|buffers| buffers.skinning)
        .unwrap();
    let device = renderer.device().unwrap();
    let data = device.buffer_data(skinning_buffer).unwrap();
    assert_eq!(data.len(), 64 * MAX_NUM_BONES);
    let uploaded: Mat4 = bytemuck::pod_read_unaligned(&data[..64]);
    assert_eq!(uploaded, bone);

    let frame = device.last_executed().unwrap();
    assert_eq!(
        count(frame, |c| matches!(
            c,
            Command::SetConstantBuffers { stage: ShaderStage::Vertex, start_slot: 4, buffers }
                if buffers == &[skinning_buffer]
        )),
        1
    );
}

#[test]
fn test_too_many_bones() {
    let transforms = vec![Mat4::IDENTITY; MAX_NUM_BONES + 1];
    assert_eq!(
        Skinning::new(Vec::new(), transforms).err(),
        Some(RendererError::TooManyBones {
            count: MAX_NUM_BONES + 1,
            max: MAX_NUM_BONES,
        })
    );
}

#[test]
fn test_skybox_follows_camera() {
    let mut scene = scene_with_shaders();
    let mut sky = MeshData::cube();
    sky.flip_winding();
    scene.set_skybox(Renderable::skybox(sky, texture("sky")));
    scene.set_skybox_shaders("VS", "PS").unwrap();
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let skybox = renderer.main_scene().and_then(Scene::skybox).unwrap();
    let constant = skybox.buffers().unwrap().constant;
    let device = renderer.device().unwrap();
    let uploaded: CbChangesEveryFrame =
        bytemuck::pod_read_unaligned(device.buffer_data(constant).unwrap());
    let eye = renderer.camera().eye();
    assert_eq!(uploaded.world, Mat4::from_translation(eye) * skybox.world());

    let frame = device.last_executed().unwrap();
    let read_only = frame
        .position(|c| *c == Command::SetDepthStencilState(DepthStencilState::READ_ONLY))
        .unwrap();
    let draw = frame.position(|c| c.is_draw()).unwrap();
    let restored = frame
        .position(|c| *c == Command::SetDepthStencilState(DepthStencilState::default()))
        .unwrap();
    assert!(read_only < draw && draw < restored);
}

#[test]
fn test_uninitialized_scenes_are_skipped() {
    let mut renderer = single_renderable_renderer(6);
    let mut overlay = scene_with_shaders();
    add_shaded_renderable(&mut overlay, "hud", Renderable::new(quad(12)));
    renderer.add_scene("overlay", overlay).unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    assert_eq!(draws(frame).len(), 1);
}

#[test]
fn test_renderable_without_shaders_is_skipped() {
    let mut scene = scene_with_shaders();
    scene.add_renderable("bare", Renderable::new(quad(6))).unwrap();
    add_shaded_renderable(&mut scene, "cube", Renderable::new(quad(12)));
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    assert_eq!(
        draws(frame),
        vec![Command::DrawIndexed {
            index_count: 12,
            start_index: 0,
            base_vertex: 0,
        }]
    );
}

// ============================================================================
// Shadow pass
// ============================================================================

fn shadowed_renderer(lights: usize) -> scene_renderer::Renderer<DummyProvider> {
    let mut scene = scene_with_shaders();
    add_shaded_renderable(&mut scene, "cube", Renderable::new(quad(6)));
    add_shaded_voxel(&mut scene, "blocks", 2);
    for i in 0..lights {
        scene
            .add_point_light(i, white_light(Vec3::new(0.0, 5.0, -5.0 + i as f32)))
            .unwrap();
    }
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    let (vertex, pixel) = shadow_shaders();
    renderer.set_shadow_map_shaders(vertex, pixel).unwrap();
    renderer.initialize(&target()).unwrap();
    renderer
}

#[rstest]
#[case::no_lights(0)]
#[case::one_light(1)]
#[case::two_lights(2)]
fn test_shadow_pass_per_light(#[case] lights: usize) {
    let mut renderer = shadowed_renderer(lights);
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    // Two objects per light, then the main pass draws both again
    assert_eq!(draws(frame).len(), 2 * lights + 2);
    assert_eq!(
        count(frame, |c| matches!(c, Command::ClearRenderTarget { .. })),
        lights + 1
    );

    let flags: Vec<u32> = frame
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::UpdateSubresource { data, .. }
                if data.len() == std::mem::size_of::<CbShadowMatrix>() =>
            {
                Some(bytemuck::pod_read_unaligned::<CbShadowMatrix>(data).is_voxel)
            }
            _ => None,
        })
        .collect();
    assert_eq!(flags, [0, 1].repeat(lights));
}

#[test]
fn test_shadow_pass_uses_light_matrices() {
    let mut renderer = shadowed_renderer(1);
    renderer.render();

    let light = renderer
        .main_scene()
        .and_then(|scene| scene.point_light(0))
        .unwrap()
        .clone();
    let frame = renderer.device().unwrap().last_executed().unwrap();
    let first = frame
        .commands()
        .iter()
        .find_map(|c| match c {
            Command::UpdateSubresource { data, .. }
                if data.len() == std::mem::size_of::<CbShadowMatrix>() =>
            {
                Some(bytemuck::pod_read_unaligned::<CbShadowMatrix>(data))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(first.view, light.view());
    assert_eq!(first.projection, light.projection());
}

#[test]
fn test_shadow_pass_restores_back_buffer() {
    let mut renderer = shadowed_renderer(2);
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    let targets: Vec<_> = frame
        .commands()
        .iter()
        .filter_map(|c| match c {
            Command::SetRenderTargets { render_target, .. } => *render_target,
            _ => None,
        })
        .collect();
    assert_eq!(targets.len(), 3);
    assert_ne!(targets[0], targets[1]);
    // Back to the back buffer before the main pass clears it
    let back_buffer = targets[2];
    let main_clear = frame
        .position(|c| matches!(c, Command::ClearRenderTarget { view, .. } if *view == back_buffer))
        .unwrap();
    let last_target = frame
        .position(|c| matches!(c, Command::SetRenderTargets { render_target: Some(view), .. } if *view == back_buffer))
        .unwrap();
    assert!(last_target < main_clear);
}

#[test]
fn test_shadow_pass_skipped_without_shaders() {
    let mut scene = scene_with_shaders();
    add_shaded_renderable(&mut scene, "cube", Renderable::new(quad(6)));
    scene.add_point_light(0, white_light(Vec3::Y * 5.0)).unwrap();
    let mut renderer = renderer(DummyProvider::new());
    renderer.add_scene("main", scene).unwrap();
    renderer.set_main_scene("main").unwrap();
    renderer.initialize(&target()).unwrap();
    renderer.render();

    let frame = renderer.device().unwrap().last_executed().unwrap();
    assert_eq!(draws(frame).len(), 1);
}
