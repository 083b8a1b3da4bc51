use kurbo::{Point, Size};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, TouchPhase};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Pointer event in logical (display) units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum PointerEvent {
    Down(Point),
    Move(Point),
    Up,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HostAction {
    Quit,
    ToggleDebugStop,
    Snapshot,
}

/// Folds mouse and touch input into a single pointer session.
///
/// Only the left button and the first active touch drive the session;
/// other buttons and extra fingers are ignored.
#[derive(Debug, Default)]
pub(crate) struct PointerTracker {
    cursor: Option<Point>,
    mouse_down: bool,
    touch_id: Option<u64>,
}

impl PointerTracker {
    pub(crate) fn cursor_moved(&mut self, at: Point) -> Option<PointerEvent> {
        self.cursor = Some(at);
        self.mouse_down.then_some(PointerEvent::Move(at))
    }

    pub(crate) fn cursor_left(&mut self) {
        self.cursor = None;
    }

    pub(crate) fn mouse_input(
        &mut self,
        button: MouseButton,
        state: ElementState,
    ) -> Option<PointerEvent> {
        if button != MouseButton::Left || self.touch_id.is_some() {
            return None;
        }
        match state {
            ElementState::Pressed if !self.mouse_down => {
                let at = self.cursor?;
                self.mouse_down = true;
                Some(PointerEvent::Down(at))
            }
            ElementState::Released if self.mouse_down => {
                self.mouse_down = false;
                Some(PointerEvent::Up)
            }
            _ => None,
        }
    }

    pub(crate) fn touch(&mut self, id: u64, phase: TouchPhase, at: Point) -> Option<PointerEvent> {
        match phase {
            TouchPhase::Started if self.touch_id.is_none() && !self.mouse_down => {
                self.touch_id = Some(id);
                Some(PointerEvent::Down(at))
            }
            TouchPhase::Moved if self.touch_id == Some(id) => Some(PointerEvent::Move(at)),
            TouchPhase::Ended | TouchPhase::Cancelled if self.touch_id == Some(id) => {
                self.touch_id = None;
                Some(PointerEvent::Up)
            }
            _ => None,
        }
    }
}

pub(crate) fn host_action_for(key: PhysicalKey) -> Option<HostAction> {
    match key {
        PhysicalKey::Code(KeyCode::Escape) => Some(HostAction::Quit),
        PhysicalKey::Code(KeyCode::F3) => Some(HostAction::ToggleDebugStop),
        PhysicalKey::Code(KeyCode::F12) => Some(HostAction::Snapshot),
        _ => None,
    }
}

pub(crate) fn logical_point(position: PhysicalPosition<f64>, scale_factor: f64) -> Point {
    let logical = position.to_logical::<f64>(scale_factor);
    Point::new(logical.x, logical.y)
}

pub(crate) fn logical_size(size: PhysicalSize<u32>, scale_factor: f64) -> Size {
    let logical = size.to_logical::<f64>(scale_factor);
    Size::new(logical.width, logical.height)
}
