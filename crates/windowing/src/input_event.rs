//! Application-facing input events
//!
//! The application's input manager consumes a small fixed-width event
//! record: coordinates fit in `u16`, scancodes in `u8`, and the translated
//! character in a single UTF-16 unit. Everything produced by the seat
//! processors is narrowed to these widths before it leaves this crate.

use std::collections::VecDeque;
use std::sync::Mutex;

use bitflags::bitflags;

bitflags! {
    /// Modifier state attached to key events
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u16 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
        const CAPS_LOCK = 1 << 4;
        const NUM_LOCK = 1 << 5;
    }
}

/// Symbolic key identity, independent of the hardware scancode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Printable ASCII key, lowercase for letters
    Char(char),
    Escape,
    Return,
    Tab,
    Backspace,
    Delete,
    Insert,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
    /// Function key F1..F24
    F(u8),
    /// Keypad digit 0..9
    Keypad(u8),
    KeypadEnter,
    KeypadPlus,
    KeypadMinus,
    KeypadMultiply,
    KeypadDivide,
    KeypadDecimal,
    ShiftLeft,
    ShiftRight,
    ControlLeft,
    ControlRight,
    AltLeft,
    AltRight,
    SuperLeft,
    SuperRight,
    CapsLock,
    NumLock,
    ScrollLock,
    Print,
    Pause,
    Menu,
    MediaPlayPause,
    MediaStop,
    MediaNext,
    MediaPrevious,
    MediaRewind,
    MediaFastForward,
    MediaRecord,
    VolumeUp,
    VolumeDown,
    VolumeMute,
    Sleep,
    Unknown,
}

/// Logical mouse buttons; wheel directions are delivered as buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
}

/// Which device class an enter/leave or input event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    Pointer,
    Keyboard,
    Touch,
}

/// Payload of a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Hardware scancode, 0 when it does not fit in a byte
    pub scancode: u8,
    pub key: Key,
    pub modifiers: Modifiers,
    /// UTF-16 code unit, 0 when the character is outside the BMP
    pub unicode: u16,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Motion { x: u16, y: u16 },
    ButtonDown { button: MouseButton, x: u16, y: u16 },
    ButtonUp { button: MouseButton, x: u16, y: u16 },
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    TouchDown { slot: u8, x: u16, y: u16, size: f32 },
    TouchMotion { slot: u8, x: u16, y: u16, size: f32 },
    TouchUp { slot: u8, x: u16, y: u16 },
    /// All touch points of a seat were cancelled at once
    TouchAbort,
    FocusChange { focused: bool },
    Resize { width: i32, height: i32 },
    Quit,
}

/// Consumer of translated input events
pub trait InputSink: Send + Sync {
    fn push(&self, event: InputEvent);
}

/// Narrow a scaled coordinate into the event record's width
pub(crate) fn narrow_coordinate(value: f64) -> u16 {
    value.round().clamp(0.0, u16::MAX as f64) as u16
}

/// Narrow a wire scancode; values that do not fit a byte become 0
pub fn narrow_scancode(scancode: u32) -> u8 {
    u8::try_from(scancode).unwrap_or(0)
}

/// Narrow a Unicode scalar; anything outside the BMP becomes 0
pub fn narrow_codepoint(codepoint: u32) -> u16 {
    u16::try_from(codepoint).unwrap_or(0)
}

/// Queue between the event-pump thread and the application thread
///
/// Events are pushed from compositor callbacks and drained by the
/// application's message pump.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<InputEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver queued events one at a time
    ///
    /// The lock is not held while `handler` runs, so the handler may push
    /// further events; those are delivered in the same pump.
    pub fn pump(&self, mut handler: impl FnMut(InputEvent)) -> usize {
        let mut delivered = 0;
        loop {
            let next = match self.events.lock() {
                Ok(mut events) => events.pop_front(),
                Err(poisoned) => poisoned.into_inner().pop_front(),
            };
            let Some(event) = next else {
                return delivered;
            };
            handler(event);
            delivered += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InputSink for EventQueue {
    fn push(&self, event: InputEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push_back(event),
            Err(poisoned) => poisoned.into_inner().push_back(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scancode_narrowing() {
        assert_eq!(narrow_scancode(0), 0);
        assert_eq!(narrow_scancode(255), 255);
        assert_eq!(narrow_scancode(256), 0);
        assert_eq!(narrow_scancode(u32::MAX), 0);
    }

    #[test]
    fn codepoint_narrowing() {
        assert_eq!(narrow_codepoint('a' as u32), 0x61);
        assert_eq!(narrow_codepoint(0xFFFF), 0xFFFF);
        assert_eq!(narrow_codepoint(0x1F600), 0);
    }

    #[test]
    fn coordinate_narrowing_rounds_and_clamps() {
        assert_eq!(narrow_coordinate(10.4), 10);
        assert_eq!(narrow_coordinate(10.5), 11);
        assert_eq!(narrow_coordinate(-3.0), 0);
        assert_eq!(narrow_coordinate(1e9), u16::MAX);
    }

    #[test]
    fn pump_delivers_in_order_and_allows_reentrant_push() {
        let queue = EventQueue::new();
        queue.push(InputEvent::Motion { x: 1, y: 1 });
        queue.push(InputEvent::Quit);

        let mut seen = Vec::new();
        let delivered = queue.pump(|event| {
            if event == (InputEvent::Motion { x: 1, y: 1 }) {
                queue.push(InputEvent::FocusChange { focused: true });
            }
            seen.push(event);
        });

        assert_eq!(delivered, 3);
        assert_eq!(
            seen,
            vec![
                InputEvent::Motion { x: 1, y: 1 },
                InputEvent::Quit,
                InputEvent::FocusChange { focused: true },
            ]
        );
        assert!(queue.is_empty());
    }
}
