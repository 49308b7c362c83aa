//! Seat input processing
//!
//! A [`Seat`] owns zero or one pointer, keyboard and touch processor. The
//! set of processors follows the capability bitmask the compositor last
//! announced for the seat: [`reconcile`] computes which processors to
//! create and which to drop, and [`Seat::handle_capabilities`] applies the
//! difference. Re-announcing the same capabilities is a no-op.
//!
//! Processors do not talk to the protocol or the application directly.
//! They turn protocol-independent events into [`SeatOutput`] values which
//! the caller routes to the input sink, the focus tracking, the cursor
//! code and the key-repeat timer.

pub mod keyboard;
pub mod pointer;
pub mod touch;

use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use wayland_client::protocol::wl_seat::WlSeat;

use crate::config::KeyboardConfig;
use crate::input_event::{InputEvent, InputType, KeyEvent};
use crate::keymap::KeymapFactory;

pub use keyboard::{KeyboardEvent, KeyboardProcessor, KeymapFormat, RepeatSettings};
pub use pointer::{PointerEvent, PointerProcessor};
pub use touch::{TouchEvent, TouchProcessor, MAX_TOUCH_POINTS};

bitflags! {
    /// `wl_seat.capability` bits
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const POINTER = 1;
        const KEYBOARD = 2;
        const TOUCH = 4;
    }
}

/// Capabilities to attach and to detach
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityDiff {
    pub gained: Capabilities,
    pub lost: Capabilities,
}

impl CapabilityDiff {
    pub fn is_empty(&self) -> bool {
        self.gained.is_empty() && self.lost.is_empty()
    }
}

/// Difference between what is attached and what was announced
pub fn reconcile(current: Capabilities, announced: Capabilities) -> CapabilityDiff {
    CapabilityDiff {
        gained: announced - current,
        lost: current - announced,
    }
}

/// Key-repeat timer instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatCommand {
    /// (Re)arm the timer: fire after `delay`, then every `interval`
    Start {
        delay: Duration,
        interval: Duration,
        event: KeyEvent,
    },
    /// Disarm immediately
    Stop,
}

/// What a seat event resulted in
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeatOutput {
    Input(InputEvent),
    Enter(InputType),
    Leave(InputType),
    /// The pointer entered; the cursor image must be set with this serial
    SetCursor { serial: u32 },
    Repeat(RepeatCommand),
}

/// Synthetic release and press emitted for each repeat tick
pub fn repeat_events(event: KeyEvent) -> [InputEvent; 2] {
    [InputEvent::KeyUp(event), InputEvent::KeyDown(event)]
}

pub struct Seat {
    global_name: u32,
    name: String,
    proxy: Option<WlSeat>,
    coordinate_scale: i32,
    keymap_factory: Arc<dyn KeymapFactory>,
    default_repeat: RepeatSettings,
    pointer: Option<PointerProcessor>,
    keyboard: Option<KeyboardProcessor>,
    touch: Option<TouchProcessor>,
}

impl std::fmt::Debug for Seat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seat")
            .field("global_name", &self.global_name)
            .field("name", &self.name)
            .field("capabilities", &self.capabilities())
            .field("coordinate_scale", &self.coordinate_scale)
            .finish()
    }
}

impl Seat {
    pub fn new(
        global_name: u32,
        proxy: Option<WlSeat>,
        keymap_factory: Arc<dyn KeymapFactory>,
        keyboard_config: &KeyboardConfig,
    ) -> Self {
        Self {
            global_name,
            name: String::new(),
            proxy,
            coordinate_scale: 1,
            keymap_factory,
            default_repeat: keyboard_config.into(),
            pointer: None,
            keyboard: None,
            touch: None,
        }
    }

    pub fn global_name(&self) -> u32 {
        self.global_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn proxy(&self) -> Option<&WlSeat> {
        self.proxy.as_ref()
    }

    /// Capabilities that currently have a processor attached
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::empty();
        caps.set(Capabilities::POINTER, self.pointer.is_some());
        caps.set(Capabilities::KEYBOARD, self.keyboard.is_some());
        caps.set(Capabilities::TOUCH, self.touch.is_some());
        caps
    }

    pub fn has_pointer(&self) -> bool {
        self.pointer.is_some()
    }

    pub fn keyboard(&self) -> Option<&KeyboardProcessor> {
        self.keyboard.as_ref()
    }

    pub fn touch(&self) -> Option<&TouchProcessor> {
        self.touch.as_ref()
    }

    pub fn pointer(&self) -> Option<&PointerProcessor> {
        self.pointer.as_ref()
    }

    /// Attach and detach processors to match `announced`
    pub fn handle_capabilities(&mut self, announced: Capabilities) -> CapabilityDiff {
        let diff = reconcile(self.capabilities(), announced);

        for cap in diff.gained.iter() {
            tracing::debug!(seat = %self.name, global = self.global_name, ?cap, "seat gained capability");
            if cap == Capabilities::POINTER {
                self.pointer = Some(PointerProcessor::new(self.coordinate_scale));
            } else if cap == Capabilities::KEYBOARD {
                self.keyboard = Some(KeyboardProcessor::new(
                    self.keymap_factory.clone(),
                    self.default_repeat,
                ));
            } else if cap == Capabilities::TOUCH {
                self.touch = Some(TouchProcessor::new(self.coordinate_scale));
            }
        }

        for cap in diff.lost.iter() {
            tracing::debug!(seat = %self.name, global = self.global_name, ?cap, "seat lost capability");
            if cap == Capabilities::POINTER {
                self.pointer = None;
            } else if cap == Capabilities::KEYBOARD {
                self.keyboard = None;
            } else if cap == Capabilities::TOUCH {
                self.touch = None;
            }
        }

        assert_eq!(
            self.capabilities(),
            announced & Capabilities::all(),
            "seat processors out of sync with announced capabilities"
        );
        diff
    }

    /// Scale applied to pointer and touch coordinates
    pub fn set_coordinate_scale(&mut self, scale: i32) {
        self.coordinate_scale = scale;
        if let Some(pointer) = self.pointer.as_mut() {
            pointer.set_coordinate_scale(scale);
        }
        if let Some(touch) = self.touch.as_mut() {
            touch.set_coordinate_scale(scale);
        }
    }

    pub fn coordinate_scale(&self) -> i32 {
        self.coordinate_scale
    }

    pub fn handle_pointer(&mut self, event: PointerEvent) -> Vec<SeatOutput> {
        let mut out = Vec::new();
        match self.pointer.as_mut() {
            Some(pointer) => pointer.handle(event, &mut out),
            None => tracing::trace!(global = self.global_name, "pointer event without pointer capability"),
        }
        out
    }

    pub fn handle_keyboard(&mut self, event: KeyboardEvent) -> Vec<SeatOutput> {
        let mut out = Vec::new();
        match self.keyboard.as_mut() {
            Some(keyboard) => keyboard.handle(event, &mut out),
            None => tracing::trace!(global = self.global_name, "keyboard event without keyboard capability"),
        }
        out
    }

    pub fn handle_touch(&mut self, event: TouchEvent) -> Vec<SeatOutput> {
        let mut out = Vec::new();
        match self.touch.as_mut() {
            Some(touch) => touch.handle(event, &mut out),
            None => tracing::trace!(global = self.global_name, "touch event without touch capability"),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keymap::{Keymap, KeymapError};

    struct NoKeymaps;

    impl KeymapFactory for NoKeymaps {
        fn compile(&self, _text: &str) -> Result<Box<dyn Keymap>, KeymapError> {
            Err(KeymapError::Compile)
        }
    }

    fn seat() -> Seat {
        Seat::new(3, None, Arc::new(NoKeymaps), &KeyboardConfig::default())
    }

    #[test]
    fn reconcile_diff() {
        let diff = reconcile(
            Capabilities::POINTER | Capabilities::TOUCH,
            Capabilities::POINTER | Capabilities::KEYBOARD,
        );
        assert_eq!(diff.gained, Capabilities::KEYBOARD);
        assert_eq!(diff.lost, Capabilities::TOUCH);
    }

    #[test]
    fn pointer_then_keyboard_then_keyboard_only() {
        let mut seat = seat();

        let diff = seat.handle_capabilities(Capabilities::POINTER);
        assert_eq!(diff.gained, Capabilities::POINTER);
        assert!(seat.has_pointer());

        let diff = seat.handle_capabilities(Capabilities::POINTER | Capabilities::KEYBOARD);
        assert_eq!(diff.gained, Capabilities::KEYBOARD);
        assert!(diff.lost.is_empty());

        let diff = seat.handle_capabilities(Capabilities::KEYBOARD);
        assert_eq!(diff.lost, Capabilities::POINTER);
        assert!(diff.gained.is_empty());
        assert_eq!(seat.capabilities(), Capabilities::KEYBOARD);
    }

    #[test]
    fn repeated_announcement_is_noop() {
        let mut seat = seat();
        seat.handle_capabilities(Capabilities::all());
        assert!(seat.handle_capabilities(Capabilities::all()).is_empty());
    }

    #[test]
    fn coordinate_scale_reaches_new_processors() {
        let mut seat = seat();
        seat.set_coordinate_scale(2);
        seat.handle_capabilities(Capabilities::POINTER);
        let out = seat.handle_pointer(PointerEvent::Motion { x: 3.0, y: 4.0 });
        assert_eq!(out, vec![SeatOutput::Input(InputEvent::Motion { x: 6, y: 8 })]);

        seat.set_coordinate_scale(1);
        let out = seat.handle_pointer(PointerEvent::Motion { x: 3.0, y: 4.0 });
        assert_eq!(out, vec![SeatOutput::Input(InputEvent::Motion { x: 3, y: 4 })]);
    }

    #[test]
    fn events_without_capability_dropped() {
        let mut seat = seat();
        assert!(seat.handle_pointer(PointerEvent::Leave).is_empty());
        assert!(seat.handle_touch(TouchEvent::Cancel).is_empty());
    }

    #[test]
    fn repeat_emits_release_then_press() {
        let event = KeyEvent {
            scancode: 30,
            key: crate::input_event::Key::Char('a'),
            modifiers: Default::default(),
            unicode: 0x61,
        };
        assert_eq!(
            repeat_events(event),
            [InputEvent::KeyUp(event), InputEvent::KeyDown(event)]
        );
    }
}
