use bitflags::bitflags;
use glam::Vec2;
use winit::event::{ElementState, MouseScrollDelta};
use winit::keyboard::KeyCode;

bitflags! {
    /// Movement keys held during a frame.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MovementKeys: u8 {
        const FORWARD = 1 << 0;
        const BACKWARD = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const UP = 1 << 4;
        const DOWN = 1 << 5;
    }
}

impl MovementKeys {
    pub fn from_key_code(key: KeyCode) -> Option<Self> {
        match key {
            KeyCode::KeyW => Some(Self::FORWARD),
            KeyCode::KeyS => Some(Self::BACKWARD),
            KeyCode::KeyA => Some(Self::LEFT),
            KeyCode::KeyD => Some(Self::RIGHT),
            KeyCode::Space => Some(Self::UP),
            KeyCode::ShiftLeft => Some(Self::DOWN),
            _ => None,
        }
    }
}

/// Pixel deltas are reported by touchpads; scale them to roughly one line per notch.
const PIXEL_SCROLL_SCALE: f32 = 0.01;

/// Tracks held keys and a virtual cursor fed by raw mouse motion.
///
/// With the cursor grabbed the OS stops reporting meaningful absolute positions, so the
/// relative motion is accumulated instead and handed to the camera as absolute coordinates.
#[derive(Debug, Default)]
pub struct InputState {
    held: MovementKeys,
    cursor: Vec2,
    quit_requested: bool,
}

impl InputState {
    pub fn new(initial_cursor: Vec2) -> Self {
        Self {
            cursor: initial_cursor,
            ..Default::default()
        }
    }

    pub fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        let pressed = state == ElementState::Pressed;
        if key == KeyCode::Escape && pressed {
            self.quit_requested = true;
        }
        if let Some(flag) = MovementKeys::from_key_code(key) {
            self.held.set(flag, pressed);
        }
    }

    /// Accumulates raw motion and returns the new virtual cursor position.
    pub fn handle_mouse_motion(&mut self, delta: (f64, f64)) -> Vec2 {
        self.cursor += Vec2::new(delta.0 as f32, delta.1 as f32);
        self.cursor
    }

    pub fn scroll_lines(delta: MouseScrollDelta) -> f32 {
        match delta {
            MouseScrollDelta::LineDelta(_, y) => y,
            MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * PIXEL_SCROLL_SCALE,
        }
    }

    pub fn held(&self) -> MovementKeys {
        self.held
    }

    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Drops all held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held = MovementKeys::empty();
    }
}
