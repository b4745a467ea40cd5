//! wgpu backend implementation
//!
//! Resources are created eagerly through the device. Command lists are
//! replayed by [`replay`], which turns the immediate-context state model into
//! render passes, pipelines and bind groups.
//!
//! Shader bytecode is WGSL source. Vertex-stage resources live in
//! `@group(0)` and pixel-stage resources in `@group(1)`. Within a group,
//! constant buffer slot `n` is `@binding(n)`, texture slot `n` is
//! `@binding(16 + n)` and sampler slot `n` is `@binding(32 + n)`. Element `k`
//! of the bound input layout feeds `@location(k)`.

mod replay;

use crate::backend::command::CommandList;
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::shader::ShaderBytecode;
use crate::window::{WindowKind, WindowTarget};
use std::collections::HashMap;
use wgpu::util::DeviceExt;

use replay::{LayoutEntry, PipelineKey, ReplayState};

pub(crate) const TEXTURE_BINDING_BASE: u32 = 16;
pub(crate) const SAMPLER_BINDING_BASE: u32 = 32;

/// Creates [`WgpuDevice`]s, mapping driver types onto adapter requests.
///
/// `Hardware` asks for a high-performance adapter, `Warp` forces the
/// software fallback adapter and `Reference` tries the GL backend.
#[derive(Debug, Clone)]
pub struct WgpuProvider {
    pub backends: wgpu::Backends,
    pub vsync: bool,
}

impl Default for WgpuProvider {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            vsync: false,
        }
    }
}

impl DeviceProvider for WgpuProvider {
    type Device = WgpuDevice;

    fn create_device(
        &mut self,
        driver_type: DriverType,
        target: &WindowTarget,
    ) -> BackendResult<WgpuDevice> {
        pollster::block_on(WgpuDevice::new_async(
            self.backends,
            driver_type,
            target,
            self.vsync,
        ))
    }
}

struct BufferEntry {
    buffer: wgpu::Buffer,
    size: u64,
}

struct TextureEntry {
    texture: wgpu::Texture,
    format: TextureFormat,
}

struct ViewEntry {
    view: wgpu::TextureView,
    format: TextureFormat,
}

struct SamplerEntry {
    sampler: wgpu::Sampler,
    filtering: bool,
}

struct ShaderEntry {
    module: wgpu::ShaderModule,
    entry_point: String,
}

/// Presentation target: a configured surface or an off-screen texture
enum BackBuffer {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
        frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
    },
    Headless {
        _texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// wgpu device implementation
pub struct WgpuDevice {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    driver_type: DriverType,
    size: (u32, u32),
    back_buffer: BackBuffer,
    back_buffer_format: TextureFormat,
    back_buffer_view: u64,

    // Resource storage
    buffers: HashMap<u64, BufferEntry>,
    textures: HashMap<u64, TextureEntry>,
    views: HashMap<u64, ViewEntry>,
    samplers: HashMap<u64, SamplerEntry>,
    vertex_shaders: HashMap<u64, ShaderEntry>,
    pixel_shaders: HashMap<u64, ShaderEntry>,
    input_layouts: HashMap<u64, Vec<InputElement>>,
    next_id: u64,

    // Replay caches
    bind_group_layouts: HashMap<Vec<LayoutEntry>, wgpu::BindGroupLayout>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    staging: Vec<wgpu::Buffer>,
    state: ReplayState,
}

impl WgpuDevice {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba32Float => wgpu::TextureFormat::Rgba32Float,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::R32Float => wgpu::TextureFormat::R32Float,
        }
    }

    fn convert_texture_format_back(format: wgpu::TextureFormat) -> Option<TextureFormat> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
            wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
            wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
            wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
            _ => None,
        }
    }

    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        // Every buffer may be rewritten through a copy.
        let mut result = wgpu::BufferUsages::COPY_DST;
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::CONSTANT) {
            result |= wgpu::BufferUsages::UNIFORM;
        }
        result
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::SHADER_RESOURCE) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_TARGET) || usage.contains(TextureUsage::DEPTH_STENCIL)
        {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
        match format {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Uint32x4 => wgpu::VertexFormat::Uint32x4,
        }
    }

    fn convert_compare_function(func: CompareFunction) -> wgpu::CompareFunction {
        match func {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }

    fn convert_index_format(format: IndexFormat) -> wgpu::IndexFormat {
        match format {
            IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
            IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
        }
    }

    fn convert_topology(topology: PrimitiveTopology) -> wgpu::PrimitiveTopology {
        match topology {
            PrimitiveTopology::PointList => wgpu::PrimitiveTopology::PointList,
            PrimitiveTopology::LineList => wgpu::PrimitiveTopology::LineList,
            PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            PrimitiveTopology::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
        match mode {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }

    fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
        match mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
            AddressMode::MirrorRepeat => wgpu::AddressMode::MirrorRepeat,
        }
    }
}

impl WgpuDevice {
    /// Async initialization, wrapped by [`WgpuProvider`] on native
    pub async fn new_async(
        backends: wgpu::Backends,
        driver_type: DriverType,
        target: &WindowTarget,
        vsync: bool,
    ) -> BackendResult<Self> {
        let backends = match driver_type {
            DriverType::Reference => wgpu::Backends::GL,
            _ => backends,
        };
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let surface = match target.kind {
            WindowKind::Native { window, display } => {
                // SAFETY: the application keeps the window alive for as long
                // as the renderer initialized with this target.
                let surface = unsafe {
                    instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                        raw_display_handle: display,
                        raw_window_handle: window,
                    })
                }
                .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;
                Some(surface)
            }
            WindowKind::Headless => None,
        };

        let (power_preference, force_fallback_adapter) = match driver_type {
            DriverType::Hardware => (wgpu::PowerPreference::HighPerformance, false),
            DriverType::Warp => (wgpu::PowerPreference::None, true),
            DriverType::Reference => (wgpu::PowerPreference::LowPower, false),
        };

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: surface.as_ref(),
                force_fallback_adapter,
            })
            .await
            .ok_or_else(|| {
                BackendError::DeviceCreationFailed(format!("No {:?} adapter found", driver_type))
            })?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend, {:?} driver)",
            adapter_info.name,
            adapter_info.backend,
            driver_type
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Scene Renderer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        device.on_uncaptured_error(Box::new(|error| {
            log::error!("wgpu validation error: {}", error);
        }));

        let width = target.width.max(1);
        let height = target.height.max(1);

        let (back_buffer, back_buffer_format) = match surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find(|f| Self::convert_texture_format_back(*f).is_some())
                    .ok_or_else(|| {
                        BackendError::SwapChainCreationFailed(
                            "No supported surface format".into(),
                        )
                    })?;
                let alpha_mode = caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto);
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width,
                    height,
                    present_mode: if vsync {
                        wgpu::PresentMode::AutoVsync
                    } else {
                        wgpu::PresentMode::AutoNoVsync
                    },
                    alpha_mode,
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(&device, &config);
                let ours = Self::convert_texture_format_back(format)
                    .unwrap_or(TextureFormat::Bgra8Unorm);
                (
                    BackBuffer::Surface {
                        surface,
                        config,
                        frame: None,
                    },
                    ours,
                )
            }
            None => {
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some("Headless Back Buffer"),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::COPY_SRC,
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                (
                    BackBuffer::Headless {
                        _texture: texture,
                        view,
                    },
                    TextureFormat::Rgba8Unorm,
                )
            }
        };

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            driver_type,
            size: (width, height),
            back_buffer,
            back_buffer_format,
            back_buffer_view: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            samplers: HashMap::new(),
            vertex_shaders: HashMap::new(),
            pixel_shaders: HashMap::new(),
            input_layouts: HashMap::new(),
            next_id: 2,
            bind_group_layouts: HashMap::new(),
            pipelines: HashMap::new(),
            staging: Vec::new(),
            state: ReplayState::default(),
        })
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn create_module(
        &mut self,
        bytecode: &ShaderBytecode,
    ) -> BackendResult<wgpu::ShaderModule> {
        let source = std::str::from_utf8(&bytecode.bytes).map_err(|e| {
            BackendError::ShaderCreationFailed(format!(
                "{}: bytecode is not WGSL text ({})",
                bytecode.entry_point, e
            ))
        })?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&bytecode.entry_point),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::ShaderCreationFailed(format!(
                "{}: {}",
                bytecode.entry_point, error
            )));
        }
        Ok(module)
    }

    fn view_of(&mut self, texture: TextureHandle) -> BackendResult<u64> {
        let entry = self
            .textures
            .get(&texture.0)
            .ok_or(BackendError::InvalidHandle(texture.0))?;
        let view = entry
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let format = entry.format;
        let id = self.allocate();
        self.views.insert(id, ViewEntry { view, format });
        Ok(id)
    }
}

/// Round `size` up to the copy alignment wgpu requires.
fn aligned_size(size: u64) -> u64 {
    let align = wgpu::COPY_BUFFER_ALIGNMENT;
    size.div_ceil(align) * align
}

impl GraphicsDevice for WgpuDevice {
    fn driver_type(&self) -> DriverType {
        self.driver_type
    }

    fn back_buffer_size(&self) -> (u32, u32) {
        self.size
    }

    fn back_buffer_view(&mut self) -> BackendResult<RenderTargetViewHandle> {
        Ok(RenderTargetViewHandle(self.back_buffer_view))
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
        contents: Option<&[u8]>,
    ) -> BackendResult<BufferHandle> {
        if descriptor.size == 0 {
            return Err(BackendError::BufferCreationFailed(format!(
                "{:?} has zero size",
                descriptor.label
            )));
        }
        let size = aligned_size(descriptor.size);
        let usage = Self::convert_buffer_usage(descriptor.usage);

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = match contents {
            Some(contents) => {
                let mut padded = vec![0u8; size as usize];
                let len = contents.len().min(padded.len());
                padded[..len].copy_from_slice(&contents[..len]);
                self.device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: descriptor.label.as_deref(),
                        contents: &padded,
                        usage,
                    })
            }
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: descriptor.label.as_deref(),
                size,
                usage,
                mapped_at_creation: false,
            }),
        };
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::BufferCreationFailed(error.to_string()));
        }

        let id = self.allocate();
        self.buffers.insert(id, BufferEntry { buffer, size });
        Ok(BufferHandle(id))
    }

    fn create_texture(
        &mut self,
        descriptor: &TextureDescriptor,
        texels: Option<&[u8]>,
    ) -> BackendResult<TextureHandle> {
        let size = wgpu::Extent3d {
            width: descriptor.width.max(1),
            height: descriptor.height.max(1),
            depth_or_array_layers: 1,
        };
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size,
            mip_level_count: descriptor.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(descriptor.format),
            usage: Self::convert_texture_usage(descriptor.usage),
            view_formats: &[],
        });
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::TextureCreationFailed(error.to_string()));
        }

        if let Some(texels) = texels {
            let bytes_per_row = size.width * descriptor.format.bytes_per_pixel();
            let expected = (bytes_per_row * size.height) as usize;
            if texels.len() < expected {
                return Err(BackendError::TextureCreationFailed(format!(
                    "{:?}: {} bytes of texels, expected {}",
                    descriptor.label,
                    texels.len(),
                    expected
                )));
            }
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                &texels[..expected],
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(size.height),
                },
                size,
            );
        }

        let id = self.allocate();
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                format: descriptor.format,
            },
        );
        Ok(TextureHandle(id))
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

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let address_mode = Self::convert_address_mode(desc.address_mode);
        let filtering = desc.mag_filter == FilterMode::Linear
            || desc.min_filter == FilterMode::Linear
            || desc.mipmap_filter == FilterMode::Linear;
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: Self::convert_filter_mode(desc.mag_filter),
            min_filter: Self::convert_filter_mode(desc.min_filter),
            mipmap_filter: Self::convert_filter_mode(desc.mipmap_filter),
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: desc.max_anisotropy.max(1),
            border_color: None,
        });

        let id = self.allocate();
        self.samplers.insert(id, SamplerEntry { sampler, filtering });
        Ok(SamplerHandle(id))
    }

    fn create_vertex_shader(
        &mut self,
        bytecode: &ShaderBytecode,
    ) -> BackendResult<VertexShaderHandle> {
        let module = self.create_module(bytecode)?;
        let id = self.allocate();
        self.vertex_shaders.insert(
            id,
            ShaderEntry {
                module,
                entry_point: bytecode.entry_point.clone(),
            },
        );
        Ok(VertexShaderHandle(id))
    }

    fn create_pixel_shader(
        &mut self,
        bytecode: &ShaderBytecode,
    ) -> BackendResult<PixelShaderHandle> {
        let module = self.create_module(bytecode)?;
        let id = self.allocate();
        self.pixel_shaders.insert(
            id,
            ShaderEntry {
                module,
                entry_point: bytecode.entry_point.clone(),
            },
        );
        Ok(PixelShaderHandle(id))
    }

    fn create_input_layout(
        &mut self,
        elements: &[InputElement],
        bytecode: &ShaderBytecode,
    ) -> BackendResult<InputLayoutHandle> {
        bytecode
            .check_input_layout(elements)
            .map_err(BackendError::InputLayoutCreationFailed)?;
        let id = self.allocate();
        self.input_layouts.insert(id, elements.to_vec());
        Ok(InputLayoutHandle(id))
    }

    fn execute(&mut self, commands: CommandList) {
        self.replay(commands);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_size() {
        assert_eq!(aligned_size(1), 4);
        assert_eq!(aligned_size(4), 4);
        assert_eq!(aligned_size(200), 200);
        assert_eq!(aligned_size(202), 204);
    }

    #[test]
    fn test_constant_buffers_are_copy_targets() {
        let usage = WgpuDevice::convert_buffer_usage(BufferUsage::CONSTANT);
        assert!(usage.contains(wgpu::BufferUsages::UNIFORM));
        assert!(usage.contains(wgpu::BufferUsages::COPY_DST));
    }

    #[test]
    fn test_depth_texture_is_render_attachment() {
        let usage = WgpuDevice::convert_texture_usage(TextureUsage::DEPTH_STENCIL);
        assert!(usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
    }
}
