use std::time::{Duration, Instant};
use winit::event::MouseButton;
use winit::keyboard::{Key, NamedKey};

const DOUBLE_CLICK_INTERVAL: Duration = Duration::from_millis(400);
const DOUBLE_CLICK_DISTANCE: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleFullscreen,
    TogglePanel,
    Close,
}

impl KeyCommand {
    /// Map a logical key press, ignoring case.
    pub fn from_key(key: &Key) -> Option<Self> {
        let text = match key {
            Key::Named(NamedKey::Escape) => return Some(KeyCommand::Close),
            Key::Character(text) => text,
            _ => return None,
        };
        match text.to_lowercase().as_str() {
            "f" => Some(KeyCommand::ToggleFullscreen),
            "h" => Some(KeyCommand::TogglePanel),
            _ => None,
        }
    }
}

/// Recognizes two primary presses close together in time and space.
#[derive(Debug, Default)]
pub struct DoubleClickDetector {
    last_press: Option<(Instant, [f32; 2])>,
}

impl DoubleClickDetector {
    pub fn press(&mut self, at: Instant, position: [f32; 2]) -> bool {
        if let Some((time, previous)) = self.last_press.take() {
            let dx = position[0] - previous[0];
            let dy = position[1] - previous[1];
            let close = (dx * dx + dy * dy).sqrt() <= DOUBLE_CLICK_DISTANCE;
            if close && at.saturating_duration_since(time) <= DOUBLE_CLICK_INTERVAL {
                return true;
            }
        }
        self.last_press = Some((at, position));
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Rotate,
    Pan,
}

/// Cursor position and the drag currently driving the orbit camera.
#[derive(Debug, Default)]
pub struct PointerState {
    pub position: Option<[f32; 2]>,
    drag: Option<DragMode>,
}

impl PointerState {
    pub fn begin_drag(&mut self, button: MouseButton) {
        self.drag = match button {
            MouseButton::Left => Some(DragMode::Rotate),
            MouseButton::Right | MouseButton::Middle => Some(DragMode::Pan),
            _ => self.drag,
        };
    }

    pub fn end_drag(&mut self, button: MouseButton) {
        let released = match button {
            MouseButton::Left => Some(DragMode::Rotate),
            MouseButton::Right | MouseButton::Middle => Some(DragMode::Pan),
            _ => None,
        };
        if released.is_some() && released == self.drag {
            self.drag = None;
        }
    }

    /// Record a cursor move; returns the active drag and its pixel delta.
    pub fn move_to(&mut self, position: [f32; 2]) -> Option<(DragMode, [f32; 2])> {
        let previous = self.position.replace(position);
        let (drag, previous) = (self.drag?, previous?);
        Some((drag, [position[0] - previous[0], position[1] - previous[1]]))
    }

    pub fn leave(&mut self) {
        self.position = None;
        self.drag = None;
    }
}
