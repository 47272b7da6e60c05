use winit::keyboard::{KeyCode, PhysicalKey};

/// Pointer travel, in physical pixels, below which a press/release still counts as a click.
pub const CLICK_SLOP: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    None,
    Quit,
    ClearModel,
    ToggleTint,
    FrameScene,
}

pub fn key_action(key: PhysicalKey) -> InputAction {
    match key {
        PhysicalKey::Code(KeyCode::Escape) => InputAction::Quit,
        PhysicalKey::Code(KeyCode::KeyC) => InputAction::ClearModel,
        PhysicalKey::Code(KeyCode::KeyT) => InputAction::ToggleTint,
        PhysicalKey::Code(KeyCode::KeyF) => InputAction::FrameScene,
        _ => InputAction::None,
    }
}

/// Tells a left click from a left drag.
#[derive(Default, Debug, Clone, Copy)]
pub struct PointerState {
    position: Option<(f32, f32)>,
    pressed_at: Option<(f32, f32)>,
    dragging: bool,
}

impl PointerState {
    /// Records a cursor move and returns the delta to orbit by while dragging.
    pub fn moved(&mut self, x: f32, y: f32) -> Option<(f32, f32)> {
        let previous = self.position.replace((x, y));
        let (start_x, start_y) = self.pressed_at?;
        if !self.dragging {
            let travel = ((x - start_x).powi(2) + (y - start_y).powi(2)).sqrt();
            if travel < CLICK_SLOP {
                return None;
            }
            self.dragging = true;
        }
        let (px, py) = previous.unwrap_or((x, y));
        Some((x - px, y - py))
    }

    pub fn pressed(&mut self) {
        self.pressed_at = self.position;
        self.dragging = false;
    }

    /// Returns the click position when the button went up without a drag.
    pub fn released(&mut self) -> Option<(f32, f32)> {
        let pressed_at = self.pressed_at.take();
        let was_dragging = std::mem::take(&mut self.dragging);
        if was_dragging {
            return None;
        }
        pressed_at.and(self.position)
    }

    pub fn left(&mut self) {
        self.position = None;
        self.pressed_at = None;
        self.dragging = false;
    }
}
