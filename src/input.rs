//! Per-frame input handed to the camera
//!
//! Key and mouse handling belong to the window layer; it fills these in
//! once per frame.

/// Movement keys held this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectionsInput {
    pub front: bool,
    pub left: bool,
    pub back: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

impl DirectionsInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn any(&self) -> bool {
        self.front || self.left || self.back || self.right || self.up || self.down
    }
}

/// Raw mouse movement since the last reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseRelativeMovement {
    pub x: i32,
    pub y: i32,
}

impl MouseRelativeMovement {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Accumulate a raw delta
    pub fn add(&mut self, dx: i32, dy: i32) {
        self.x = self.x.saturating_add(dx);
        self.y = self.y.saturating_add(dy);
    }

    /// Clear per-frame deltas (call after the camera consumed them)
    pub fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mouse_accumulate_and_reset() {
        let mut mouse = MouseRelativeMovement::default();
        mouse.add(3, -2);
        mouse.add(1, 1);
        assert_eq!(mouse, MouseRelativeMovement::new(4, -1));
        mouse.reset();
        assert!(mouse.is_zero());
    }

    #[test]
    fn test_directions_any() {
        let mut directions = DirectionsInput::new();
        assert!(!directions.any());
        directions.down = true;
        assert!(directions.any());
    }
}
