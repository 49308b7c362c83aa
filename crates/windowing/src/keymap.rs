//! Keymap and modifier tracking
//!
//! [`Keymap`] is what the keyboard processor needs from a compiled keymap.
//! The production implementation wraps xkbcommon; tests substitute a table.
//!
//! The modifier state inside a keymap MUST be updated with every
//! `wl_keyboard.modifiers` event before the next key is translated,
//! otherwise keysyms and modifiers come out stale.

use std::os::fd::OwnedFd;

use memmap2::MmapOptions;
use thiserror::Error;
use xkbcommon::xkb;

use crate::input_event::{Key, Modifiers};

/// Offset between `wl_keyboard` scancodes and xkb keycodes
pub const KEYCODE_OFFSET: u32 = 8;

#[derive(Error, Debug)]
pub enum KeymapError {
    #[error("failed to map keymap: {0}")]
    Map(#[from] std::io::Error),

    #[error("keymap is not valid UTF-8")]
    Encoding,

    #[error("xkbcommon could not compile the keymap")]
    Compile,
}

/// A compiled keymap plus its modifier state
pub trait Keymap: Send {
    /// Single keysym for `code`, 0 (NoSymbol) if there is none or several
    fn keysym_for_keycode(&self, code: u32) -> u32;

    fn update_mask(&mut self, depressed: u32, latched: u32, locked: u32, group: u32);

    /// Serialized depressed, latched and locked modifiers
    fn current_modifiers(&self) -> u32;

    fn active_modifiers(&self) -> Modifiers;

    /// Unicode scalar produced by `code`, 0 if none
    fn unicode_for_keycode(&self, code: u32) -> u32;

    fn should_repeat(&self, code: u32) -> bool;

    fn key_for_keycode(&self, code: u32) -> Key {
        key_for_keysym(self.keysym_for_keycode(code))
    }
}

/// Compiles keymap text received from the compositor
pub trait KeymapFactory: Send + Sync {
    fn compile(&self, text: &str) -> Result<Box<dyn Keymap>, KeymapError>;
}

/// Read the keymap text the compositor shared through `fd`
pub fn read_keymap_fd(fd: &OwnedFd, size: usize) -> Result<String, KeymapError> {
    // SAFETY: the compositor hands out a private, read-only mapping that it
    // does not modify after sending the fd.
    let map = unsafe { MmapOptions::new().len(size).map_copy_read_only(fd)? };
    let text = std::str::from_utf8(&map).map_err(|_| KeymapError::Encoding)?;
    Ok(text.trim_end_matches('\0').to_string())
}

/// xkbcommon keymap with its own context and state
///
/// Each instance compiles from a fresh context, so no xkb object it holds
/// is reachable from anywhere else.
pub struct XkbKeymap {
    keymap: xkb::Keymap,
    state: xkb::State,
}

// SAFETY: xkbcommon objects are not thread-safe only because their
// reference counts are not atomic. `compile` creates the context, keymap
// and state together and never clones or returns them, so every reference
// count involved is owned by this value alone. Moving the value moves all
// of them at once; the keyboard processor owning it is only reached through
// the window system's mutex, which rules out concurrent access.
unsafe impl Send for XkbKeymap {}

impl XkbKeymap {
    fn compile(text: &str) -> Result<Self, KeymapError> {
        let context = xkb::Context::new(xkb::CONTEXT_NO_FLAGS);
        let keymap = xkb::Keymap::new_from_string(
            &context,
            text.to_string(),
            xkb::KEYMAP_FORMAT_TEXT_V1,
            xkb::KEYMAP_COMPILE_NO_FLAGS,
        )
        .ok_or(KeymapError::Compile)?;
        let state = xkb::State::new(&keymap);
        Ok(Self { keymap, state })
    }

    fn mod_active(&self, name: &str) -> bool {
        self.state.mod_name_is_active(name, xkb::STATE_MODS_EFFECTIVE)
    }
}

impl Keymap for XkbKeymap {
    fn keysym_for_keycode(&self, code: u32) -> u32 {
        u32::from(self.state.key_get_one_sym(code.into()))
    }

    fn update_mask(&mut self, depressed: u32, latched: u32, locked: u32, group: u32) {
        self.state
            .update_mask(depressed, latched, locked, 0, 0, group);
    }

    fn current_modifiers(&self) -> u32 {
        self.state.serialize_mods(
            xkb::STATE_MODS_DEPRESSED | xkb::STATE_MODS_LATCHED | xkb::STATE_MODS_LOCKED,
        )
    }

    fn active_modifiers(&self) -> Modifiers {
        let mut mods = Modifiers::empty();
        mods.set(Modifiers::SHIFT, self.mod_active(xkb::MOD_NAME_SHIFT));
        mods.set(Modifiers::CTRL, self.mod_active(xkb::MOD_NAME_CTRL));
        mods.set(Modifiers::ALT, self.mod_active(xkb::MOD_NAME_ALT));
        mods.set(Modifiers::SUPER, self.mod_active(xkb::MOD_NAME_LOGO));
        mods.set(Modifiers::CAPS_LOCK, self.mod_active(xkb::MOD_NAME_CAPS));
        mods.set(Modifiers::NUM_LOCK, self.mod_active(xkb::MOD_NAME_NUM));
        mods
    }

    fn unicode_for_keycode(&self, code: u32) -> u32 {
        self.state.key_get_utf32(code.into())
    }

    fn should_repeat(&self, code: u32) -> bool {
        self.keymap.key_repeats(code.into())
    }
}

/// [`KeymapFactory`] backed by xkbcommon
///
/// Keymaps arrive once per keyboard, so every compile gets its own
/// context instead of sharing one across threads.
#[derive(Debug, Default)]
pub struct XkbKeymapFactory;

impl XkbKeymapFactory {
    pub fn new() -> Self {
        Self
    }
}

impl KeymapFactory for XkbKeymapFactory {
    fn compile(&self, text: &str) -> Result<Box<dyn Keymap>, KeymapError> {
        Ok(Box::new(XkbKeymap::compile(text)?))
    }
}

/// Map a keysym to the application's symbolic key
#[allow(non_upper_case_globals)]
pub fn key_for_keysym(sym: u32) -> Key {
    use xkb::keysyms::*;

    match sym {
        // Latin-1 keysyms equal their ASCII code
        0x20..=0x7e => Key::Char((sym as u8 as char).to_ascii_lowercase()),
        KEY_Return => Key::Return,
        KEY_Escape => Key::Escape,
        KEY_Tab | KEY_ISO_Left_Tab => Key::Tab,
        KEY_BackSpace => Key::Backspace,
        KEY_Delete => Key::Delete,
        KEY_Insert => Key::Insert,
        KEY_Home => Key::Home,
        KEY_End => Key::End,
        KEY_Page_Up => Key::PageUp,
        KEY_Page_Down => Key::PageDown,
        KEY_Left => Key::Left,
        KEY_Right => Key::Right,
        KEY_Up => Key::Up,
        KEY_Down => Key::Down,
        KEY_F1..=KEY_F24 => Key::F((sym - KEY_F1 + 1) as u8),
        KEY_KP_0..=KEY_KP_9 => Key::Keypad((sym - KEY_KP_0) as u8),
        KEY_KP_Enter => Key::KeypadEnter,
        KEY_KP_Add => Key::KeypadPlus,
        KEY_KP_Subtract => Key::KeypadMinus,
        KEY_KP_Multiply => Key::KeypadMultiply,
        KEY_KP_Divide => Key::KeypadDivide,
        KEY_KP_Decimal => Key::KeypadDecimal,
        KEY_KP_Home => Key::Home,
        KEY_KP_End => Key::End,
        KEY_KP_Left => Key::Left,
        KEY_KP_Right => Key::Right,
        KEY_KP_Up => Key::Up,
        KEY_KP_Down => Key::Down,
        KEY_KP_Page_Up => Key::PageUp,
        KEY_KP_Page_Down => Key::PageDown,
        KEY_KP_Insert => Key::Insert,
        KEY_KP_Delete => Key::Delete,
        KEY_Shift_L => Key::ShiftLeft,
        KEY_Shift_R => Key::ShiftRight,
        KEY_Control_L => Key::ControlLeft,
        KEY_Control_R => Key::ControlRight,
        KEY_Alt_L => Key::AltLeft,
        KEY_Alt_R | KEY_ISO_Level3_Shift => Key::AltRight,
        KEY_Super_L => Key::SuperLeft,
        KEY_Super_R => Key::SuperRight,
        KEY_Caps_Lock => Key::CapsLock,
        KEY_Num_Lock => Key::NumLock,
        KEY_Scroll_Lock => Key::ScrollLock,
        KEY_Print => Key::Print,
        KEY_Pause => Key::Pause,
        KEY_Menu => Key::Menu,
        KEY_XF86AudioPlay | KEY_XF86AudioPause => Key::MediaPlayPause,
        KEY_XF86AudioStop => Key::MediaStop,
        KEY_XF86AudioNext => Key::MediaNext,
        KEY_XF86AudioPrev => Key::MediaPrevious,
        KEY_XF86AudioRewind => Key::MediaRewind,
        KEY_XF86AudioForward => Key::MediaFastForward,
        KEY_XF86AudioRecord => Key::MediaRecord,
        KEY_XF86AudioRaiseVolume => Key::VolumeUp,
        KEY_XF86AudioLowerVolume => Key::VolumeDown,
        KEY_XF86AudioMute => Key::VolumeMute,
        KEY_XF86Sleep => Key::Sleep,
        _ => Key::Unknown,
    }
}
