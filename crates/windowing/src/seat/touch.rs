//! Touch translation
//!
//! Each live protocol touch id is mapped to the lowest free application
//! slot. The mapping is released on `up`; `cancel` releases every point.

use std::collections::HashMap;

use crate::input_event::{narrow_coordinate, InputEvent};

use super::SeatOutput;

/// Maximum number of concurrently tracked touch points per seat
pub const MAX_TOUCH_POINTS: usize = 10;

/// Protocol-independent form of the `wl_touch` events (surface-local coordinates)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchEvent {
    Down { id: i32, x: f64, y: f64 },
    Up { id: i32 },
    Motion { id: i32, x: f64, y: f64 },
    /// Contact ellipse axes
    Shape { id: i32, major: f64, minor: f64 },
    Cancel,
}

#[derive(Debug, Clone, Copy)]
struct TouchPoint {
    slot: u8,
    x: u16,
    y: u16,
    size: f32,
}

#[derive(Debug)]
pub struct TouchProcessor {
    coordinate_scale: i32,
    points: HashMap<i32, TouchPoint>,
}

impl TouchProcessor {
    pub fn new(coordinate_scale: i32) -> Self {
        Self {
            coordinate_scale,
            points: HashMap::new(),
        }
    }

    pub fn set_coordinate_scale(&mut self, scale: i32) {
        self.coordinate_scale = scale;
    }

    /// Slot assigned to a live touch id
    pub fn slot_for(&self, id: i32) -> Option<u8> {
        self.points.get(&id).map(|p| p.slot)
    }

    pub fn live_points(&self) -> usize {
        self.points.len()
    }

    pub fn handle(&mut self, event: TouchEvent, out: &mut Vec<SeatOutput>) {
        match event {
            TouchEvent::Down { id, x, y } => {
                let Some(slot) = self.free_slot() else {
                    tracing::debug!(id, "too many touch points, ignoring");
                    return;
                };
                let (x, y) = self.scale(x, y);
                let point = TouchPoint {
                    slot,
                    x,
                    y,
                    size: 0.0,
                };
                self.points.insert(id, point);
                out.push(SeatOutput::Input(InputEvent::TouchDown {
                    slot,
                    x,
                    y,
                    size: point.size,
                }));
            }
            TouchEvent::Motion { id, x, y } => {
                let (x, y) = self.scale(x, y);
                let Some(point) = self.points.get_mut(&id) else {
                    return;
                };
                point.x = x;
                point.y = y;
                out.push(SeatOutput::Input(InputEvent::TouchMotion {
                    slot: point.slot,
                    x,
                    y,
                    size: point.size,
                }));
            }
            TouchEvent::Shape { id, major, minor } => {
                let scale = self.coordinate_scale as f64;
                let Some(point) = self.points.get_mut(&id) else {
                    return;
                };
                point.size = (major.max(minor) * scale) as f32;
                out.push(SeatOutput::Input(InputEvent::TouchMotion {
                    slot: point.slot,
                    x: point.x,
                    y: point.y,
                    size: point.size,
                }));
            }
            TouchEvent::Up { id } => {
                if let Some(point) = self.points.remove(&id) {
                    out.push(SeatOutput::Input(InputEvent::TouchUp {
                        slot: point.slot,
                        x: point.x,
                        y: point.y,
                    }));
                }
            }
            TouchEvent::Cancel => {
                if !self.points.is_empty() {
                    self.points.clear();
                    out.push(SeatOutput::Input(InputEvent::TouchAbort));
                }
            }
        }
    }

    fn free_slot(&self) -> Option<u8> {
        (0..MAX_TOUCH_POINTS as u8).find(|slot| !self.points.values().any(|p| p.slot == *slot))
    }

    fn scale(&self, x: f64, y: f64) -> (u16, u16) {
        let scale = self.coordinate_scale as f64;
        (narrow_coordinate(x * scale), narrow_coordinate(y * scale))
    }
}
