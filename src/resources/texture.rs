//! Texture data, GPU textures, samplers and render textures

use std::cell::OnceCell;

use crate::backend::traits::*;
use crate::backend::types::*;

/// Decoded texels, tightly packed
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub data: Vec<u8>,
    pub name: String,
}

impl TextureData {
    /// Wrap RGBA8 texels produced by an image decoder
    pub fn from_rgba8(name: &str, width: u32, height: u32, data: Vec<u8>) -> Result<Self, String> {
        let expected = (width * height * 4) as usize;
        if data.len() != expected {
            return Err(format!(
                "{}: {} bytes of texels for {}x{} RGBA8, expected {}",
                name,
                data.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            width,
            height,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: name.to_string(),
        })
    }

    /// Create a solid color texture
    pub fn solid_color(color: [u8; 4], name: &str) -> Self {
        Self {
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8UnormSrgb,
            data: color.to_vec(),
            name: name.to_string(),
        }
    }

    /// Create a default normal map (pointing out of the surface)
    pub fn default_normal() -> Self {
        Self::solid_color([128, 128, 255, 255], "default_normal")
    }

    /// Create a checkerboard texture with 8-texel cells
    pub fn checkerboard(size: u32, color1: [u8; 4], color2: [u8; 4], name: &str) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);

        for y in 0..size {
            for x in 0..size {
                let is_even = ((x / 8) + (y / 8)) % 2 == 0;
                let color = if is_even { color1 } else { color2 };
                data.extend_from_slice(&color);
            }
        }

        Self {
            width: size,
            height: size,
            format: TextureFormat::Rgba8UnormSrgb,
            data,
            name: name.to_string(),
        }
    }
}

/// How a texture is filtered and addressed when sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerType {
    PointClamp,
    PointWrap,
    PointMirror,
    LinearClamp,
    #[default]
    LinearWrap,
    LinearMirror,
    AnisotropicClamp,
    AnisotropicWrap,
    AnisotropicMirror,
}

impl SamplerType {
    pub const ALL: [SamplerType; 9] = [
        SamplerType::PointClamp,
        SamplerType::PointWrap,
        SamplerType::PointMirror,
        SamplerType::LinearClamp,
        SamplerType::LinearWrap,
        SamplerType::LinearMirror,
        SamplerType::AnisotropicClamp,
        SamplerType::AnisotropicWrap,
        SamplerType::AnisotropicMirror,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub fn descriptor(self) -> SamplerDescriptor {
        let (filter, max_anisotropy) = match self {
            SamplerType::PointClamp | SamplerType::PointWrap | SamplerType::PointMirror => {
                (FilterMode::Nearest, 1)
            }
            SamplerType::LinearClamp | SamplerType::LinearWrap | SamplerType::LinearMirror => {
                (FilterMode::Linear, 1)
            }
            _ => (FilterMode::Linear, 16),
        };
        let address_mode = match self {
            SamplerType::PointClamp | SamplerType::LinearClamp | SamplerType::AnisotropicClamp => {
                AddressMode::ClampToEdge
            }
            SamplerType::PointWrap | SamplerType::LinearWrap | SamplerType::AnisotropicWrap => {
                AddressMode::Repeat
            }
            _ => AddressMode::MirrorRepeat,
        };
        SamplerDescriptor {
            label: Some(format!("{:?}", self)),
            address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: filter,
            max_anisotropy,
        }
    }
}

/// One sampler object per [`SamplerType`], created once per device
#[derive(Debug, Clone)]
pub struct SamplerTable {
    samplers: Vec<SamplerHandle>,
}

impl SamplerTable {
    pub fn create(device: &mut dyn GraphicsDevice) -> BackendResult<Self> {
        let samplers = SamplerType::ALL
            .iter()
            .map(|ty| device.create_sampler(&ty.descriptor()))
            .collect::<BackendResult<Vec<_>>>()?;
        Ok(Self { samplers })
    }

    pub fn get(&self, sampler_type: SamplerType) -> SamplerHandle {
        self.samplers[sampler_type.index()]
    }
}

/// GPU-side objects of an initialized texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTexture {
    pub texture: TextureHandle,
    pub view: ShaderResourceViewHandle,
}

/// A sampled texture, shared between the materials that use it
#[derive(Debug)]
pub struct Texture {
    data: TextureData,
    sampler_type: SamplerType,
    gpu: OnceCell<GpuTexture>,
}

impl Texture {
    pub fn new(data: TextureData, sampler_type: SamplerType) -> Self {
        Self {
            data,
            sampler_type,
            gpu: OnceCell::new(),
        }
    }

    /// Magenta and black checkerboard bound where a texture is missing
    pub fn invalid() -> Self {
        Self::new(
            TextureData::checkerboard(64, [255, 0, 255, 255], [0, 0, 0, 255], "invalid"),
            SamplerType::PointWrap,
        )
    }

    /// Upload to `device`. Shared textures are uploaded once.
    pub fn initialize(&self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        if self.gpu.get().is_some() {
            return Ok(());
        }
        let texture = device.create_texture(
            &TextureDescriptor {
                label: Some(self.data.name.clone()),
                width: self.data.width,
                height: self.data.height,
                mip_levels: 1,
                format: self.data.format,
                usage: TextureUsage::SHADER_RESOURCE | TextureUsage::COPY_DST,
            },
            Some(&self.data.data),
        )?;
        let view = device.create_shader_resource_view(texture)?;
        // Cannot fail: the cell was checked empty above
        let _ = self.gpu.set(GpuTexture { texture, view });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.data.name
    }

    pub fn data(&self) -> &TextureData {
        &self.data
    }

    pub fn sampler_type(&self) -> SamplerType {
        self.sampler_type
    }

    pub fn view(&self) -> Option<ShaderResourceViewHandle> {
        self.gpu.get().map(|gpu| gpu.view)
    }
}

/// An off-screen color target that can also be sampled
#[derive(Debug)]
pub struct RenderTexture {
    width: u32,
    height: u32,
    format: TextureFormat,
    label: String,
    gpu: Option<RenderTextureViews>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTextureViews {
    pub texture: TextureHandle,
    pub render_target: RenderTargetViewHandle,
    pub shader_resource: ShaderResourceViewHandle,
}

impl RenderTexture {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            width,
            height,
            format,
            label: label.into(),
            gpu: None,
        }
    }

    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice) -> BackendResult<()> {
        let texture = device.create_texture(
            &TextureDescriptor {
                label: Some(self.label.clone()),
                width: self.width,
                height: self.height,
                mip_levels: 1,
                format: self.format,
                usage: TextureUsage::RENDER_TARGET | TextureUsage::SHADER_RESOURCE,
            },
            None,
        )?;
        let render_target = device.create_render_target_view(texture)?;
        let shader_resource = device.create_shader_resource_view(texture)?;
        self.gpu = Some(RenderTextureViews {
            texture,
            render_target,
            shader_resource,
        });
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn views(&self) -> Option<RenderTextureViews> {
        self.gpu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyProvider, DeviceProvider};
    use crate::window::WindowTarget;

    #[test]
    fn test_checkerboard_cells() {
        let data = TextureData::checkerboard(16, [1, 1, 1, 1], [2, 2, 2, 2], "cb");
        assert_eq!(data.data.len(), 16 * 16 * 4);
        assert_eq!(data.data[0], 1);
        // texel (8, 0) starts the second cell
        assert_eq!(data.data[8 * 4], 2);
    }

    #[test]
    fn test_from_rgba8_checks_size() {
        assert!(TextureData::from_rgba8("t", 2, 2, vec![0; 16]).is_ok());
        assert!(TextureData::from_rgba8("t", 2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn test_sampler_descriptors() {
        let desc = SamplerType::PointClamp.descriptor();
        assert_eq!(desc.mag_filter, FilterMode::Nearest);
        assert_eq!(desc.address_mode, AddressMode::ClampToEdge);
        assert_eq!(SamplerType::AnisotropicMirror.descriptor().max_anisotropy, 16);
    }

    #[test]
    fn test_sampler_table_and_shared_texture_upload() {
        let mut device = DummyProvider::new()
            .create_device(DriverType::Hardware, &WindowTarget::headless(8, 8))
            .unwrap();
        let table = SamplerTable::create(&mut device).unwrap();
        assert_eq!(device.sampler_count(), SamplerType::ALL.len());
        assert_ne!(table.get(SamplerType::PointWrap), table.get(SamplerType::LinearWrap));

        let texture = Texture::invalid();
        assert!(texture.view().is_none());
        texture.initialize(&mut device).unwrap();
        texture.initialize(&mut device).unwrap();
        assert!(texture.view().is_some());
        assert_eq!(device.texture_count(), 1);
    }
}
