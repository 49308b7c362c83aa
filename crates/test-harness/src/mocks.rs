//! Test doubles for the window system's collaborators
//!
//! Every mock records into one shared [`CallLog`] so tests can assert the
//! relative order of calls made to different collaborators (resize before
//! ack, the scale-change cascade, ...).

use std::collections::HashMap;
use std::io::Write;
use std::os::fd::OwnedFd;
use std::sync::{Arc, Mutex};

use windowing::decorator::draw::PixelBuffer;
use windowing::decorator::{DecorationLayout, DecorationSurfaces};
use windowing::geometry::{Point, Size};
use windowing::input_event::{InputEvent, InputSink, Modifiers};
use windowing::keymap::{Keymap, KeymapError, KeymapFactory};
use windowing::output::Output;
use windowing::shell_surface::{ResizeEdge, SeatRef, ShellCapabilities, ShellKind, ShellSurface};
use windowing::winsystem::{
    CursorControl, DispResource, RenderContext, Resolution, ResolutionList, SettingsStore, WindowSurface,
};

/// One call into a mocked collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    // Shell
    Initialize,
    Fullscreen { output: Option<u32> },
    Windowed,
    Maximize,
    Unmaximize,
    Minimize,
    Move { serial: u32 },
    Resizing { edge: ResizeEdge },
    ContextMenu { position: Point },
    Ack(u32),

    // Render
    Resize(Size),
    Swap,

    // Main surface
    BufferScale(i32),
    OpaqueRegion(Size),
    InhibitIdle(bool),

    // Cursor
    ThemeScale(i32),
    Cursor { seat: u32, name: Option<&'static str> },

    // Decorations
    DecorationReconfigure { main_size: Size, scale: i32 },
    DecorationCommit,
    DecorationHide,

    // Application side
    SetCurrentResolution(Resolution),
    VideoResolution { index: usize, force: bool },
    WindowedSize(Size),
    FocusChange(bool),
    LostDisplay,
    ResetDisplay,
}

/// Calls recorded by all mocks of one fixture, in order
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Index of the first call matching `pred`
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.0.lock().unwrap().iter().position(pred)
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

/// Shell surface recording every request
pub struct MockShellSurface {
    log: CallLog,
    kind: ShellKind,
    capabilities: ShellCapabilities,
}

impl MockShellSurface {
    /// Behaves like `xdg_wm_base`
    pub fn xdg(log: CallLog) -> Self {
        Self {
            log,
            kind: ShellKind::Xdg,
            capabilities: ShellCapabilities::all(),
        }
    }

    /// Behaves like the legacy `wl_shell`
    pub fn legacy(log: CallLog) -> Self {
        Self {
            log,
            kind: ShellKind::WlShell,
            capabilities: ShellCapabilities::MOVE,
        }
    }
}

impl ShellSurface for MockShellSurface {
    fn kind(&self) -> ShellKind {
        self.kind
    }

    fn capabilities(&self) -> ShellCapabilities {
        self.capabilities
    }

    fn initialize(&mut self) {
        self.log.record(Call::Initialize);
    }

    fn set_full_screen(&mut self, output: Option<&Output>, _refresh_hz: f32) {
        self.log.record(Call::Fullscreen {
            output: output.map(Output::global_name),
        });
    }

    fn set_windowed(&mut self) {
        self.log.record(Call::Windowed);
    }

    fn set_maximized(&mut self) {
        self.log.record(Call::Maximize);
    }

    fn unset_maximized(&mut self) {
        self.log.record(Call::Unmaximize);
    }

    fn set_minimized(&mut self) {
        self.log.record(Call::Minimize);
    }

    fn start_move(&mut self, _seat: &SeatRef, serial: u32) {
        self.log.record(Call::Move { serial });
    }

    fn start_resize(&mut self, _seat: &SeatRef, _serial: u32, edge: ResizeEdge) {
        self.log.record(Call::Resizing { edge });
    }

    fn show_context_menu(&mut self, _seat: &SeatRef, _serial: u32, position: Point) {
        self.log.record(Call::ContextMenu { position });
    }

    fn ack_configure(&mut self, serial: u32) {
        self.log.record(Call::Ack(serial));
    }
}

/// Render context remembering the size it was last resized to
pub struct MockRenderContext {
    log: CallLog,
    size: Mutex<Size>,
    vsync: Mutex<bool>,
}

impl MockRenderContext {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            size: Mutex::new(Size::default()),
            vsync: Mutex::new(true),
        }
    }

    pub fn vsync(&self) -> bool {
        *self.vsync.lock().unwrap()
    }
}

impl RenderContext for MockRenderContext {
    fn resize(&self, size: Size) {
        *self.size.lock().unwrap() = size;
        self.log.record(Call::Resize(size));
    }

    fn attached_size(&self) -> Size {
        *self.size.lock().unwrap()
    }

    fn swap_buffers(&self) {
        self.log.record(Call::Swap);
    }

    fn set_vsync(&self, enabled: bool) {
        *self.vsync.lock().unwrap() = enabled;
    }
}

/// Main surface requests
pub struct MockWindowSurface {
    log: CallLog,
    can_inhibit: bool,
}

impl MockWindowSurface {
    pub fn new(log: CallLog) -> Self {
        Self { log, can_inhibit: true }
    }

    /// A compositor without the idle-inhibit global
    pub fn without_idle_inhibit(log: CallLog) -> Self {
        Self {
            log,
            can_inhibit: false,
        }
    }
}

impl WindowSurface for MockWindowSurface {
    fn set_buffer_scale(&mut self, scale: i32) {
        self.log.record(Call::BufferScale(scale));
    }

    fn set_opaque_region(&mut self, size: Size) {
        self.log.record(Call::OpaqueRegion(size));
    }

    fn inhibit_idle(&mut self, inhibit: bool) -> bool {
        if self.can_inhibit {
            self.log.record(Call::InhibitIdle(inhibit));
        }
        self.can_inhibit
    }
}

pub struct MockCursor {
    log: CallLog,
}

impl MockCursor {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl CursorControl for MockCursor {
    fn set_theme_scale(&mut self, scale: i32) {
        self.log.record(Call::ThemeScale(scale));
    }

    fn set_cursor(&mut self, seat: u32, _serial: u32, name: Option<&'static str>) {
        self.log.record(Call::Cursor { seat, name });
    }
}

/// Decoration surfaces that keep the last layout and buffers
#[derive(Default)]
pub struct DecorationRecord {
    pub layout: Option<DecorationLayout>,
    pub buffer_sizes: Vec<Size>,
    pub visible: bool,
}

pub struct MockDecorationSurfaces {
    log: CallLog,
    record: Arc<Mutex<DecorationRecord>>,
}

impl MockDecorationSurfaces {
    pub fn new(log: CallLog) -> (Self, Arc<Mutex<DecorationRecord>>) {
        let record = Arc::new(Mutex::new(DecorationRecord::default()));
        (
            Self {
                log,
                record: record.clone(),
            },
            record,
        )
    }
}

impl DecorationSurfaces for MockDecorationSurfaces {
    fn reconfigure(&mut self, layout: &DecorationLayout) {
        self.log.record(Call::DecorationReconfigure {
            main_size: layout.main_size,
            scale: layout.scale,
        });
        self.record.lock().unwrap().layout = Some(*layout);
    }

    fn commit(&mut self, buffers: &[PixelBuffer; 4]) {
        self.log.record(Call::DecorationCommit);
        let mut record = self.record.lock().unwrap();
        record.buffer_sizes = buffers.iter().map(PixelBuffer::size).collect();
        record.visible = true;
    }

    fn hide(&mut self) {
        self.log.record(Call::DecorationHide);
        self.record.lock().unwrap().visible = false;
    }
}

/// In-memory resolution list
#[derive(Debug, Clone, Default)]
pub struct ResolutionState {
    pub desktop: Option<Resolution>,
    pub current: Option<Resolution>,
    pub custom: Vec<Resolution>,
    pub video_resolution: usize,
    pub calibrations_applied: usize,
}

pub struct MockResolutionList {
    log: CallLog,
    state: Arc<Mutex<ResolutionState>>,
}

impl MockResolutionList {
    pub fn new(log: CallLog) -> (Self, Arc<Mutex<ResolutionState>>) {
        let state = Arc::new(Mutex::new(ResolutionState::default()));
        (
            Self {
                log,
                state: state.clone(),
            },
            state,
        )
    }
}

impl ResolutionList for MockResolutionList {
    fn clear_custom(&mut self) {
        self.state.lock().unwrap().custom.clear();
    }

    fn add(&mut self, res: Resolution) {
        self.state.lock().unwrap().custom.push(res);
    }

    fn desktop(&self) -> Option<Resolution> {
        self.state.lock().unwrap().desktop.clone()
    }

    fn set_desktop(&mut self, res: Resolution) {
        self.state.lock().unwrap().desktop = Some(res);
    }

    fn current(&self) -> Option<Resolution> {
        self.state.lock().unwrap().current.clone()
    }

    fn set_current(&mut self, res: Resolution) {
        self.log.record(Call::SetCurrentResolution(res.clone()));
        self.state.lock().unwrap().current = Some(res);
    }

    fn apply_calibrations(&mut self) {
        self.state.lock().unwrap().calibrations_applied += 1;
    }

    fn video_resolution(&self) -> usize {
        self.state.lock().unwrap().video_resolution
    }

    fn set_video_resolution(&mut self, index: usize, force: bool) {
        self.log.record(Call::VideoResolution { index, force });
        self.state.lock().unwrap().video_resolution = index;
    }
}

/// Settings kept in memory
pub struct MemorySettings {
    log: CallLog,
    monitor: String,
    windowed_size: Option<Size>,
}

impl MemorySettings {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            monitor: String::new(),
            windowed_size: None,
        }
    }

    pub fn with_monitor(mut self, monitor: &str) -> Self {
        self.monitor = monitor.to_string();
        self
    }

    pub fn with_windowed_size(mut self, size: Size) -> Self {
        self.windowed_size = Some(size);
        self
    }
}

impl SettingsStore for MemorySettings {
    fn monitor(&self) -> String {
        self.monitor.clone()
    }

    fn windowed_size(&self) -> Option<Size> {
        self.windowed_size
    }

    fn set_windowed_size(&mut self, size: Size) {
        self.log.record(Call::WindowedSize(size));
        self.windowed_size = Some(size);
    }
}

/// Input sink collecting events for inspection
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<InputEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl InputSink for RecordingSink {
    fn push(&self, event: InputEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Display resource recording notifications
pub struct RecordingResource {
    log: CallLog,
}

impl RecordingResource {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl DispResource for RecordingResource {
    fn on_app_focus_change(&self, focused: bool) {
        self.log.record(Call::FocusChange(focused));
    }

    fn on_lost_display(&self) {
        self.log.record(Call::LostDisplay);
    }

    fn on_reset_display(&self) {
        self.log.record(Call::ResetDisplay);
    }
}

/// One key of a [`TableKeymap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableKey {
    pub keysym: u32,
    pub unicode: u32,
    pub repeats: bool,
}

/// Keymap backed by a keycode table; bit 0 of the depressed mask is shift
#[derive(Debug, Clone, Default)]
pub struct TableKeymap {
    keys: HashMap<u32, TableKey>,
    depressed: u32,
    locked: u32,
}

impl TableKeymap {
    pub fn new() -> Self {
        Self::default()
    }

    /// `code` is the keymap keycode (wire scancode + 8)
    pub fn with_key(mut self, code: u32, keysym: u32, unicode: u32, repeats: bool) -> Self {
        self.keys.insert(
            code,
            TableKey {
                keysym,
                unicode,
                repeats,
            },
        );
        self
    }

    /// A handful of evdev keys: a, b, escape, return, left shift
    pub fn basic() -> Self {
        Self::new()
            .with_key(38, 0x61, 'a' as u32, true)
            .with_key(56, 0x62, 'b' as u32, true)
            .with_key(9, 0xff1b, 0x1b, false)
            .with_key(36, 0xff0d, '\r' as u32, true)
            .with_key(50, 0xffe1, 0, false)
    }
}

impl Keymap for TableKeymap {
    fn keysym_for_keycode(&self, code: u32) -> u32 {
        self.keys.get(&code).map_or(0, |k| k.keysym)
    }

    fn update_mask(&mut self, depressed: u32, _latched: u32, locked: u32, _group: u32) {
        self.depressed = depressed;
        self.locked = locked;
    }

    fn current_modifiers(&self) -> u32 {
        self.depressed | self.locked
    }

    fn active_modifiers(&self) -> Modifiers {
        let mut modifiers = Modifiers::empty();
        if self.depressed & 1 != 0 {
            modifiers |= Modifiers::SHIFT;
        }
        if self.depressed & 4 != 0 {
            modifiers |= Modifiers::CTRL;
        }
        if self.locked & 2 != 0 {
            modifiers |= Modifiers::CAPS_LOCK;
        }
        modifiers
    }

    fn unicode_for_keycode(&self, code: u32) -> u32 {
        self.keys.get(&code).map_or(0, |k| k.unicode)
    }

    fn should_repeat(&self, code: u32) -> bool {
        self.keys.get(&code).is_some_and(|k| k.repeats)
    }
}

/// Hands out clones of one table, whatever text the compositor sent
pub struct TableKeymapFactory {
    keymap: TableKeymap,
}

impl TableKeymapFactory {
    pub fn new(keymap: TableKeymap) -> Self {
        Self { keymap }
    }
}

impl KeymapFactory for TableKeymapFactory {
    fn compile(&self, text: &str) -> Result<Box<dyn Keymap>, KeymapError> {
        if text.is_empty() {
            return Err(KeymapError::Compile);
        }
        Ok(Box::new(self.keymap.clone()))
    }
}

/// A memfd holding `text` the way compositors share keymaps
pub fn keymap_fd(text: &str) -> (OwnedFd, u32) {
    let fd = rustix::fs::memfd_create("test-keymap", rustix::fs::MemfdFlags::CLOEXEC).unwrap();
    let mut file = std::fs::File::from(fd);
    file.write_all(text.as_bytes()).unwrap();
    file.write_all(&[0]).unwrap();
    (OwnedFd::from(file), text.len() as u32 + 1)
}
