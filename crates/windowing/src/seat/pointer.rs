//! Pointer translation

use crate::input_event::{narrow_coordinate, InputEvent, InputType, MouseButton};

use super::SeatOutput;

/// evdev button codes from linux/input-event-codes.h
pub const BTN_LEFT: u32 = 0x110;
pub const BTN_RIGHT: u32 = 0x111;
pub const BTN_MIDDLE: u32 = 0x112;

/// Protocol-independent form of the `wl_pointer` events for the main surface
///
/// Coordinates are surface-local.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Enter { serial: u32, x: f64, y: f64 },
    Leave,
    Motion { x: f64, y: f64 },
    Button { serial: u32, button: u32, pressed: bool },
    /// Scroll; only the sign of `value` is used
    Axis { value: f64 },
}

fn map_button(button: u32) -> Option<MouseButton> {
    match button {
        BTN_LEFT => Some(MouseButton::Left),
        BTN_MIDDLE => Some(MouseButton::Middle),
        BTN_RIGHT => Some(MouseButton::Right),
        _ => None,
    }
}

#[derive(Debug)]
pub struct PointerProcessor {
    coordinate_scale: i32,
    x: u16,
    y: u16,
}

impl PointerProcessor {
    pub fn new(coordinate_scale: i32) -> Self {
        Self {
            coordinate_scale,
            x: 0,
            y: 0,
        }
    }

    pub fn set_coordinate_scale(&mut self, scale: i32) {
        self.coordinate_scale = scale;
    }

    /// Last known position in buffer coordinates
    pub fn position(&self) -> (u16, u16) {
        (self.x, self.y)
    }

    pub fn handle(&mut self, event: PointerEvent, out: &mut Vec<SeatOutput>) {
        match event {
            PointerEvent::Enter { serial, x, y } => {
                out.push(SeatOutput::SetCursor { serial });
                out.push(SeatOutput::Enter(InputType::Pointer));
                self.set_position(x, y);
                out.push(self.motion());
            }
            PointerEvent::Leave => out.push(SeatOutput::Leave(InputType::Pointer)),
            PointerEvent::Motion { x, y } => {
                self.set_position(x, y);
                out.push(self.motion());
            }
            PointerEvent::Button { button, pressed, .. } => {
                let Some(button) = map_button(button) else {
                    tracing::trace!(button, "ignoring unmapped pointer button");
                    return;
                };
                out.push(self.button(button, pressed));
            }
            PointerEvent::Axis { value } => {
                // Negative is up; every axis event is one wheel click
                let button = if value < 0.0 {
                    MouseButton::WheelUp
                } else {
                    MouseButton::WheelDown
                };
                out.push(self.button(button, true));
                out.push(self.button(button, false));
            }
        }
    }

    fn set_position(&mut self, x: f64, y: f64) {
        let scale = self.coordinate_scale as f64;
        self.x = narrow_coordinate(x * scale);
        self.y = narrow_coordinate(y * scale);
    }

    fn motion(&self) -> SeatOutput {
        SeatOutput::Input(InputEvent::Motion {
            x: self.x,
            y: self.y,
        })
    }

    fn button(&self, button: MouseButton, pressed: bool) -> SeatOutput {
        let (x, y) = (self.x, self.y);
        SeatOutput::Input(if pressed {
            InputEvent::ButtonDown { button, x, y }
        } else {
            InputEvent::ButtonUp { button, x, y }
        })
    }
}
