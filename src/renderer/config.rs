//! Renderer configuration

use crate::backend::{colors, Color, DriverType, TextureFormat};
use crate::scene::CameraConfig;

/// Configuration for a [`Renderer`](super::Renderer)
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Back buffer clear color
    pub clear_color: Color,
    /// Shadow map clear color; white is "nothing occludes"
    pub shadow_clear_color: Color,
    /// Vertical field of view of the camera projection, in radians
    pub fov_y: f32,
    pub near_plane: f32,
    pub far_plane: f32,
    pub camera: CameraConfig,
    /// Present interval; 0 presents immediately
    pub sync_interval: u32,
    /// Driver types tried in order when creating the device
    pub driver_types: Vec<DriverType>,
    pub shadow_map_format: TextureFormat,
    pub depth_format: TextureFormat,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: colors::MIDNIGHT_BLUE,
            shadow_clear_color: colors::WHITE,
            fov_y: std::f32::consts::FRAC_PI_4,
            near_plane: 0.01,
            far_plane: 1000.0,
            camera: CameraConfig::default(),
            sync_interval: 0,
            driver_types: DriverType::FALLBACK_ORDER.to_vec(),
            shadow_map_format: TextureFormat::Rgba16Float,
            depth_format: TextureFormat::Depth24PlusStencil8,
        }
    }
}

impl RendererConfig {
    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_projection(mut self, fov_y: f32, near_plane: f32, far_plane: f32) -> Self {
        self.fov_y = fov_y;
        self.near_plane = near_plane;
        self.far_plane = far_plane;
        self
    }

    pub fn with_camera(mut self, camera: CameraConfig) -> Self {
        self.camera = camera;
        self
    }

    pub fn with_sync_interval(mut self, sync_interval: u32) -> Self {
        self.sync_interval = sync_interval;
        self
    }

    pub fn with_driver_types(mut self, driver_types: impl Into<Vec<DriverType>>) -> Self {
        self.driver_types = driver_types.into();
        self
    }

    pub fn with_shadow_map_format(mut self, format: TextureFormat) -> Self {
        self.shadow_map_format = format;
        self
    }
}
