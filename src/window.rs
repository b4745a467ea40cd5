//! The window the renderer presents to
//!
//! Window creation and the message pump belong to the application. The
//! renderer only needs raw platform handles and the client-area size.

use raw_window_handle::{
    HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
};

/// Where presented frames go
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowKind {
    /// A native window identified by raw platform handles
    Native {
        window: RawWindowHandle,
        display: RawDisplayHandle,
    },
    /// An off-screen back buffer, for tools and tests
    Headless,
}

/// A presentation target with its client-area size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowTarget {
    pub kind: WindowKind,
    pub width: u32,
    pub height: u32,
}

impl WindowTarget {
    pub fn headless(width: u32, height: u32) -> Self {
        Self {
            kind: WindowKind::Headless,
            width,
            height,
        }
    }

    /// Capture the raw handles of an application window.
    ///
    /// The window must outlive the renderer initialized with this target.
    pub fn from_window<W>(window: &W, width: u32, height: u32) -> Result<Self, HandleError>
    where
        W: HasWindowHandle + HasDisplayHandle,
    {
        Ok(Self {
            kind: WindowKind::Native {
                window: window.window_handle()?.as_raw(),
                display: window.display_handle()?.as_raw(),
            },
            width,
            height,
        })
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn is_headless(&self) -> bool {
        matches!(self.kind, WindowKind::Headless)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_aspect() {
        let target = WindowTarget::headless(800, 600);
        assert!(target.is_headless());
        assert!((target.aspect_ratio() - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_height_does_not_divide_by_zero() {
        let target = WindowTarget::headless(640, 0);
        assert_eq!(target.aspect_ratio(), 640.0);
    }
}
