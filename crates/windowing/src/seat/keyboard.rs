//! Keyboard translation and key-repeat decisions

use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::time::Duration;

use crate::config::KeyboardConfig;
use crate::input_event::{narrow_codepoint, narrow_scancode, InputEvent, InputType, KeyEvent};
use crate::keymap::{read_keymap_fd, Keymap, KeymapFactory, KEYCODE_OFFSET};

use super::{RepeatCommand, SeatOutput};

/// `wl_keyboard.keymap_format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeymapFormat {
    NoKeymap,
    XkbV1,
    Unknown(u32),
}

/// Protocol-independent form of the `wl_keyboard` events
#[derive(Debug)]
pub enum KeyboardEvent {
    Keymap {
        format: KeymapFormat,
        fd: OwnedFd,
        size: u32,
    },
    Enter,
    Leave,
    Key {
        scancode: u32,
        pressed: bool,
    },
    Modifiers {
        depressed: u32,
        latched: u32,
        locked: u32,
        group: u32,
    },
    /// `rate` in characters per second, `delay` in milliseconds
    RepeatInfo { rate: i32, delay: i32 },
}

/// Current repeat timing; `interval == None` disables repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSettings {
    pub delay: Duration,
    pub interval: Option<Duration>,
}

impl RepeatSettings {
    pub fn from_rate(rate: u32, delay_ms: u32) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms as u64),
            interval: (rate > 0).then(|| Duration::from_millis(1000 / rate as u64)),
        }
    }
}

impl From<&KeyboardConfig> for RepeatSettings {
    fn from(config: &KeyboardConfig) -> Self {
        Self::from_rate(config.repeat_rate, config.repeat_delay)
    }
}

pub struct KeyboardProcessor {
    factory: Arc<dyn KeymapFactory>,
    keymap: Option<Box<dyn Keymap>>,
    repeat: RepeatSettings,
}

impl std::fmt::Debug for KeyboardProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardProcessor")
            .field("has_keymap", &self.keymap.is_some())
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl KeyboardProcessor {
    pub fn new(factory: Arc<dyn KeymapFactory>, repeat: RepeatSettings) -> Self {
        Self {
            factory,
            keymap: None,
            repeat,
        }
    }

    pub fn has_keymap(&self) -> bool {
        self.keymap.is_some()
    }

    pub fn repeat_settings(&self) -> RepeatSettings {
        self.repeat
    }

    pub fn handle(&mut self, event: KeyboardEvent, out: &mut Vec<SeatOutput>) {
        match event {
            KeyboardEvent::Keymap { format, fd, size } => {
                out.push(SeatOutput::Repeat(RepeatCommand::Stop));
                self.keymap = None;
                if format != KeymapFormat::XkbV1 {
                    tracing::warn!(?format, "unsupported keymap format, keyboard input disabled");
                    return;
                }
                match read_keymap_fd(&fd, size as usize)
                    .and_then(|text| self.factory.compile(&text))
                {
                    Ok(keymap) => {
                        tracing::debug!(size, "keymap compiled");
                        self.keymap = Some(keymap);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "could not load keymap, keyboard input disabled");
                    }
                }
            }
            KeyboardEvent::Enter => out.push(SeatOutput::Enter(InputType::Keyboard)),
            KeyboardEvent::Leave => {
                out.push(SeatOutput::Repeat(RepeatCommand::Stop));
                out.push(SeatOutput::Leave(InputType::Keyboard));
            }
            KeyboardEvent::Modifiers {
                depressed,
                latched,
                locked,
                group,
            } => {
                out.push(SeatOutput::Repeat(RepeatCommand::Stop));
                if let Some(keymap) = self.keymap.as_mut() {
                    keymap.update_mask(depressed, latched, locked, group);
                }
            }
            KeyboardEvent::RepeatInfo { rate, delay } => {
                self.repeat = RepeatSettings::from_rate(rate.max(0) as u32, delay.max(0) as u32);
                tracing::debug!(rate, delay, "key repeat info");
            }
            KeyboardEvent::Key { scancode, pressed } => self.handle_key(scancode, pressed, out),
        }
    }

    fn handle_key(&mut self, scancode: u32, pressed: bool, out: &mut Vec<SeatOutput>) {
        let Some(keymap) = self.keymap.as_ref() else {
            tracing::trace!(scancode, "no keymap, dropping key");
            return;
        };

        let Some(code) = scancode.checked_add(KEYCODE_OFFSET) else {
            tracing::warn!(scancode, "scancode out of keycode range, dropping key");
            return;
        };
        let event = KeyEvent {
            scancode: narrow_scancode(scancode),
            key: keymap.key_for_keycode(code),
            modifiers: keymap.active_modifiers(),
            unicode: narrow_codepoint(keymap.unicode_for_keycode(code)),
        };

        if pressed {
            out.push(SeatOutput::Input(InputEvent::KeyDown(event)));
            let command = match self.repeat.interval {
                Some(interval) if keymap.should_repeat(code) => RepeatCommand::Start {
                    delay: self.repeat.delay,
                    interval,
                    event,
                },
                _ => RepeatCommand::Stop,
            };
            out.push(SeatOutput::Repeat(command));
        } else {
            out.push(SeatOutput::Input(InputEvent::KeyUp(event)));
            out.push(SeatOutput::Repeat(RepeatCommand::Stop));
        }
    }
}
