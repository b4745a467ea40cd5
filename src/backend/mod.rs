//! Backend abstraction layer
//!
//! Provides the device traits, the command recorder and the device
//! implementations: a recording dummy device and, with the `wgpu-backend`
//! feature, a wgpu device.

pub mod command;
pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use command::{Command, CommandList, DeviceContext, VertexBufferBinding};
pub use dummy::{DummyDevice, DummyFailure, DummyProvider};
pub use traits::*;
pub use types::*;
