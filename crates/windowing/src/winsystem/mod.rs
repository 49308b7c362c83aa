//! Window-system orchestration
//!
//! [`WinSystem`] owns the protocol-independent window state: lifecycle,
//! outputs, seats, the shell surface and the decorations. The protocol glue
//! on the event-pump thread feeds it events; the application thread calls
//! into it through the backend facade. Both share it behind one mutex.
//!
//! Three things can change the window size:
//! - a compositor configure, always acked exactly once after the render
//!   buffers have been resized,
//! - replay of the stored windowed size when the compositor leaves the size
//!   to us,
//! - a resolution switch requested by the application, which may only pick
//!   an arbitrary size while the window is neither maximized nor fullscreen.

pub mod interfaces;
pub mod presentation;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use thiserror::Error;
use wayland_client::protocol::wl_seat::WlSeat;

use crate::config::{Config, DecorationConfig, KeyboardConfig, WindowConfig};
use crate::decorator::title::TitleRenderer;
use crate::decorator::{
    BorderSurface, DecorationAction, DecorationSurfaces, Decorator, StateChange, DEFAULT_CURSOR,
};
use crate::geometry::{PointF, Size};
use crate::input_event::{InputEvent, InputSink, InputType};
use crate::keymap::KeymapFactory;
use crate::output::{Output, OutputEvent, OutputRegistry};
use crate::seat::{
    Capabilities, CapabilityDiff, KeyboardEvent, PointerEvent, RepeatCommand, Seat, SeatOutput,
    TouchEvent,
};
use crate::shell_surface::{SeatRef, ShellCapabilities, ShellConfigure, ShellEvent, ShellState, ShellSurface};

pub use interfaces::{
    CursorControl, DispResource, RenderContext, Resolution, ResolutionList, SettingsStore,
    WindowSurface,
};
pub use presentation::{PresentationStats, PresentationTracker, SubmissionState};

#[derive(Error, Debug)]
pub enum WinSystemError {
    #[error("compositor announced no outputs")]
    NoOutputs,

    #[error("not connected to a compositor")]
    NotConnected,

    #[error("window already exists")]
    WindowExists,

    #[error("no window")]
    NoWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Connected,
    /// Window created, first configure not yet handled
    AwaitingInitialConfigure,
    Windowed,
    Fullscreen,
}

/// Which of our surfaces a seat's pointer is over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerTarget {
    Main,
    Decoration(BorderSurface),
}

/// Application-side collaborators, fixed for the window system's lifetime
pub struct Collaborators {
    pub resolutions: Box<dyn ResolutionList>,
    pub settings: Box<dyn SettingsStore>,
    pub sink: Arc<dyn InputSink>,
    pub keymap_factory: Arc<dyn KeymapFactory>,
}

/// Protocol objects making up one window
pub struct WindowParts {
    pub shell: Box<dyn ShellSurface>,
    pub render: Arc<dyn RenderContext>,
    pub surface: Box<dyn WindowSurface>,
    pub cursor: Box<dyn CursorControl>,
    /// `None` when decorations cannot be shown
    pub decorations: Option<Box<dyn DecorationSurfaces>>,
    pub title_renderer: Option<TitleRenderer>,
}

struct Window {
    shell: Box<dyn ShellSurface>,
    render: Arc<dyn RenderContext>,
    surface: Box<dyn WindowSurface>,
    cursor: Box<dyn CursorControl>,
}

pub struct WinSystem {
    lifecycle: Lifecycle,
    window_config: WindowConfig,
    decoration_config: DecorationConfig,
    keyboard_config: KeyboardConfig,

    resolutions: Box<dyn ResolutionList>,
    settings: Box<dyn SettingsStore>,
    sink: Arc<dyn InputSink>,
    keymap_factory: Arc<dyn KeymapFactory>,

    outputs: OutputRegistry,
    seats: HashMap<u32, Seat>,
    window: Option<Window>,
    decorator: Decorator,

    /// Content size in surface coordinates
    size: Size,
    /// Size including decorations, as last applied
    full_size: Option<Size>,
    scale: i32,
    state: ShellState,
    fullscreen_requested: bool,

    /// Global names of the outputs the main surface overlaps
    surface_outputs: BTreeSet<u32>,
    current_output: String,
    refresh_hz: f32,

    pointer_focus: HashMap<u32, PointerTarget>,
    show_os_mouse: bool,
    focused: bool,
    mouse_active: bool,
    idle_inhibited: bool,
    disp_resources: Vec<Arc<dyn DispResource>>,
}

impl WinSystem {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let Collaborators {
            resolutions,
            settings,
            sink,
            keymap_factory,
        } = collaborators;
        Self {
            lifecycle: Lifecycle::Uninitialized,
            window_config: config.window.clone(),
            decoration_config: config.decorations.clone(),
            keyboard_config: config.keyboard.clone(),
            resolutions,
            settings,
            sink,
            keymap_factory,
            outputs: OutputRegistry::new(),
            seats: HashMap::new(),
            window: None,
            decorator: Decorator::new(&config.decorations, None),
            size: Size::default(),
            full_size: None,
            scale: 1,
            state: ShellState::empty(),
            fullscreen_requested: config.window.fullscreen,
            surface_outputs: BTreeSet::new(),
            current_output: String::new(),
            refresh_hz: 0.0,
            pointer_focus: HashMap::new(),
            show_os_mouse: true,
            focused: false,
            mouse_active: false,
            idle_inhibited: false,
            disp_resources: Vec::new(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Content size in surface coordinates
    pub fn size(&self) -> Size {
        self.size
    }

    /// Content size in buffer pixels
    pub fn buffer_size(&self) -> Size {
        self.size * self.scale
    }

    pub fn buffer_scale(&self) -> i32 {
        self.scale
    }

    pub fn state(&self) -> ShellState {
        self.state
    }

    pub fn is_fullscreen(&self) -> bool {
        self.lifecycle == Lifecycle::Fullscreen
    }

    pub fn current_output(&self) -> &str {
        &self.current_output
    }

    pub fn refresh_rate(&self) -> f32 {
        self.refresh_hz
    }

    pub fn is_focused(&self) -> bool {
        self.focused
    }

    pub fn is_mouse_active(&self) -> bool {
        self.mouse_active
    }

    pub fn has_cursor(&self) -> bool {
        self.seats.values().any(Seat::has_pointer)
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn connected_outputs(&self) -> Vec<String> {
        self.outputs.connected_outputs()
    }

    pub fn seat(&self, name: u32) -> Option<&Seat> {
        self.seats.get(&name)
    }

    pub fn decorator(&self) -> &Decorator {
        &self.decorator
    }

    /// Initial globals have been processed
    pub fn mark_connected(&mut self) -> Result<(), WinSystemError> {
        if self.outputs.is_empty() {
            return Err(WinSystemError::NoOutputs);
        }
        if self.lifecycle == Lifecycle::Uninitialized {
            self.lifecycle = Lifecycle::Connected;
        }
        self.update_resolutions();
        Ok(())
    }

    // Outputs

    pub fn add_output(&mut self, output: Output) {
        self.outputs.add(output);
    }

    pub fn handle_output_event(&mut self, name: u32, event: OutputEvent) {
        if self.outputs.handle_event(name, event).is_some() && self.surface_outputs.contains(&name) {
            self.update_current_output();
            self.update_buffer_scale();
        }
    }

    pub fn remove_output(&mut self, name: u32) {
        let Some(output) = self.outputs.remove(name) else {
            return;
        };
        tracing::info!(name, output = %output.user_friendly_name(), "output removed");
        if self.surface_outputs.remove(&name) {
            self.update_current_output();
            self.update_buffer_scale();
        }
    }

    /// The main surface now overlaps output `name`
    pub fn on_surface_enter(&mut self, name: u32) {
        tracing::debug!(name, "surface entered output");
        self.surface_outputs.insert(name);
        self.update_current_output();
        self.update_buffer_scale();
    }

    pub fn on_surface_leave(&mut self, name: u32) {
        tracing::debug!(name, "surface left output");
        if self.surface_outputs.remove(&name) {
            self.update_current_output();
            self.update_buffer_scale();
        }
    }

    /// Prefer the densest overlapped output, then the lowest global name
    fn update_current_output(&mut self) {
        let best = self
            .surface_outputs
            .iter()
            .filter_map(|name| self.outputs.get(*name))
            .min_by_key(|output| (-output.scale(), output.global_name()));
        let Some(output) = best else {
            return;
        };
        self.current_output = output.user_friendly_name();
        if let Ok(mode) = output.current_mode() {
            self.refresh_hz = mode.refresh_hz();
        }
    }

    fn update_buffer_scale(&mut self) {
        let scale = self
            .surface_outputs
            .iter()
            .filter_map(|name| self.outputs.get(*name))
            .map(Output::scale)
            .max();
        // No overlap at all: wait for the compositor to place the surface
        let Some(scale) = scale else {
            return;
        };
        if scale != self.scale {
            self.apply_scale(scale.max(1));
        }
    }

    fn apply_scale(&mut self, scale: i32) {
        tracing::info!(from = self.scale, to = scale, "buffer scale changed");
        self.scale = scale;
        for seat in self.seats.values_mut() {
            seat.set_coordinate_scale(scale);
        }
        if let Some(window) = self.window.as_mut() {
            window.surface.set_buffer_scale(scale);
            window.surface.set_opaque_region(self.size);
            window.cursor.set_theme_scale(scale);
        }
        if let Some(full) = self.full_size {
            self.decorator.set_state(full, scale, self.state);
        }
        for (seat, request) in self.decorator.refresh_cursors() {
            self.set_cursor(seat, request.serial, Some(request.name));
        }
        if self.window.is_some() && !self.size.has_zero_dimension() {
            for resource in &self.disp_resources {
                resource.on_lost_display();
            }
            self.resize_render();
            for resource in &self.disp_resources {
                resource.on_reset_display();
            }
        }
    }

    /// Rebuild the resolution list for the selected output
    pub fn update_resolutions(&mut self) {
        self.resolutions.clear_custom();

        let monitor = self.settings.monitor();
        let output = self
            .outputs
            .find_by_user_friendly_name(&monitor)
            .or_else(|| self.outputs.find_by_user_friendly_name(&self.current_output))
            .or_else(|| self.outputs.ready().into_iter().next());
        let Some(output) = output else {
            tracing::warn!("no outputs to take resolutions from");
            return;
        };
        let name = output.user_friendly_name();
        if !monitor.is_empty() && monitor != name {
            tracing::info!(%monitor, using = %name, "configured monitor not connected");
        }

        let current = output.current_mode().ok();
        for mode in output.modes() {
            let mut res = Resolution::new(mode.size(), mode.refresh_hz(), &name);
            res.pixel_ratio = output.pixel_ratio_for_mode(mode);
            if Some(*mode) == current {
                tracing::debug!(
                    width = mode.width,
                    height = mode.height,
                    refresh = mode.refresh_hz(),
                    "desktop resolution"
                );
                self.resolutions.set_desktop(res);
            } else {
                self.resolutions.add(res);
            }
        }
        self.resolutions.apply_calibrations();
    }

    // Seats

    pub fn add_seat(&mut self, name: u32, proxy: Option<WlSeat>) {
        let mut seat = Seat::new(name, proxy, self.keymap_factory.clone(), &self.keyboard_config);
        seat.set_coordinate_scale(self.scale);
        tracing::debug!(name, "seat added");
        self.seats.insert(name, seat);
    }

    pub fn set_seat_name(&mut self, name: u32, seat_name: String) {
        if let Some(seat) = self.seats.get_mut(&name) {
            seat.set_name(seat_name);
        }
    }

    pub fn remove_seat(&mut self, name: u32) -> Option<Seat> {
        let seat = self.seats.remove(&name)?;
        tracing::info!(name, seat = %seat.name(), "seat removed");
        self.pointer_focus.remove(&name);
        self.decorator.remove_seat(name);
        Some(seat)
    }

    /// Reconcile processors; the caller attaches or releases the devices
    pub fn handle_seat_capabilities(&mut self, name: u32, capabilities: Capabilities) -> CapabilityDiff {
        let Some(seat) = self.seats.get_mut(&name) else {
            tracing::warn!(name, "capabilities for unknown seat");
            return CapabilityDiff::default();
        };
        let diff = seat.handle_capabilities(capabilities);
        if diff.lost.contains(Capabilities::POINTER) {
            self.pointer_focus.remove(&name);
            self.decorator.pointer_leave(name);
        }
        diff
    }

    pub fn pointer_enter(&mut self, seat: u32, target: PointerTarget, serial: u32, position: PointF) {
        self.pointer_focus.insert(seat, target);
        match target {
            PointerTarget::Main => self.route_pointer(
                seat,
                PointerEvent::Enter {
                    serial,
                    x: position.x,
                    y: position.y,
                },
            ),
            PointerTarget::Decoration(surface) => {
                if let Some(request) = self.decorator.pointer_enter(seat, serial, surface, position) {
                    self.set_cursor(seat, request.serial, Some(request.name));
                }
            }
        }
    }

    /// Pointer events after enter go wherever the pointer entered
    pub fn handle_pointer(&mut self, seat: u32, event: PointerEvent) {
        if let PointerEvent::Enter { serial, x, y } = event {
            self.pointer_enter(seat, PointerTarget::Main, serial, PointF::new(x, y));
            return;
        }
        let Some(target) = self.pointer_focus.get(&seat).copied() else {
            tracing::trace!(seat, ?event, "pointer event without focus");
            return;
        };

        match (target, event) {
            (PointerTarget::Main, PointerEvent::Leave) => {
                self.pointer_focus.remove(&seat);
                self.route_pointer(seat, event);
            }
            (PointerTarget::Main, _) => self.route_pointer(seat, event),
            (PointerTarget::Decoration(_), PointerEvent::Leave) => {
                self.pointer_focus.remove(&seat);
                self.decorator.pointer_leave(seat);
            }
            (PointerTarget::Decoration(_), PointerEvent::Motion { x, y }) => {
                if let Some(request) = self.decorator.pointer_motion(seat, PointF::new(x, y)) {
                    self.set_cursor(seat, request.serial, Some(request.name));
                }
            }
            (
                PointerTarget::Decoration(_),
                PointerEvent::Button {
                    serial,
                    button,
                    pressed,
                },
            ) => {
                if let Some(action) = self.decorator.pointer_button(seat, serial, button, pressed) {
                    self.handle_decoration_action(seat, action);
                }
            }
            (PointerTarget::Decoration(_), _) => {}
        }
    }

    fn route_pointer(&mut self, seat: u32, event: PointerEvent) {
        let Some(processor) = self.seats.get_mut(&seat) else {
            return;
        };
        let outputs = processor.handle_pointer(event);
        self.apply_seat_outputs(seat, outputs);
    }

    /// Returns repeat-timer commands for the event-pump thread
    pub fn handle_keyboard(&mut self, seat: u32, event: KeyboardEvent) -> Vec<RepeatCommand> {
        let Some(processor) = self.seats.get_mut(&seat) else {
            return Vec::new();
        };
        let outputs = processor.handle_keyboard(event);
        self.apply_seat_outputs(seat, outputs)
    }

    pub fn handle_touch(&mut self, seat: u32, event: TouchEvent) {
        let Some(processor) = self.seats.get_mut(&seat) else {
            return;
        };
        let outputs = processor.handle_touch(event);
        self.apply_seat_outputs(seat, outputs);
    }

    /// Touch on a decoration surface acts like a left click
    pub fn decoration_touch_down(&mut self, seat: u32, serial: u32, surface: BorderSurface, position: PointF) {
        if let Some(action) = self.decorator.touch_down(serial, surface, position) {
            self.handle_decoration_action(seat, action);
        }
    }

    fn apply_seat_outputs(&mut self, seat: u32, outputs: Vec<SeatOutput>) -> Vec<RepeatCommand> {
        let mut repeats = Vec::new();
        for output in outputs {
            match output {
                SeatOutput::Input(event) => self.sink.push(event),
                SeatOutput::Enter(InputType::Keyboard) => self.set_focus(true),
                SeatOutput::Leave(InputType::Keyboard) => self.set_focus(false),
                SeatOutput::Enter(InputType::Pointer) => self.mouse_active = true,
                SeatOutput::Leave(InputType::Pointer) => self.mouse_active = false,
                SeatOutput::Enter(InputType::Touch) | SeatOutput::Leave(InputType::Touch) => {}
                SeatOutput::SetCursor { serial } => {
                    let name = self.show_os_mouse.then_some(DEFAULT_CURSOR);
                    self.set_cursor(seat, serial, name);
                }
                SeatOutput::Repeat(command) => repeats.push(command),
            }
        }
        repeats
    }

    fn set_cursor(&mut self, seat: u32, serial: u32, name: Option<&'static str>) {
        if let Some(window) = self.window.as_mut() {
            window.cursor.set_cursor(seat, serial, name);
        }
    }

    /// Applies from the next time the pointer enters the main surface
    pub fn show_os_mouse(&mut self, show: bool) {
        self.show_os_mouse = show;
    }

    fn set_focus(&mut self, focused: bool) {
        if self.focused == focused {
            return;
        }
        tracing::debug!(focused, "application focus changed");
        self.focused = focused;
        for resource in &self.disp_resources {
            resource.on_app_focus_change(focused);
        }
        self.sink.push(InputEvent::FocusChange { focused });
    }

    pub fn register(&mut self, resource: Arc<dyn DispResource>) {
        self.disp_resources.push(resource);
    }

    pub fn unregister(&mut self, resource: &Arc<dyn DispResource>) {
        self.disp_resources.retain(|r| !Arc::ptr_eq(r, resource));
    }

    // Window

    pub fn create_window(&mut self, parts: WindowParts, fullscreen: bool, res: &Resolution) -> Result<(), WinSystemError> {
        match self.lifecycle {
            Lifecycle::Uninitialized => return Err(WinSystemError::NotConnected),
            Lifecycle::Connected => {}
            _ => return Err(WinSystemError::WindowExists),
        }

        let WindowParts {
            shell,
            render,
            surface,
            cursor,
            decorations,
            title_renderer,
        } = parts;
        self.decorator = Decorator::new(&self.decoration_config, decorations).with_title_renderer(title_renderer);
        self.decorator.set_title(&self.window_config.title);

        self.fullscreen_requested = fullscreen;
        self.current_output = res.output.clone();
        self.refresh_hz = res.refresh_rate;
        self.size = Size::default();
        self.full_size = None;

        let mut window = Window {
            shell,
            render,
            surface,
            cursor,
        };
        window.surface.set_buffer_scale(self.scale);
        window.cursor.set_theme_scale(self.scale);
        if fullscreen {
            let output = self.outputs.find_by_user_friendly_name(&res.output);
            window.shell.set_full_screen(output, res.refresh_rate);
        } else {
            window.shell.set_windowed();
        }
        window.shell.initialize();
        let has_configure_states = window.shell.capabilities().contains(ShellCapabilities::CONFIGURE_STATES);
        self.window = Some(window);
        self.lifecycle = Lifecycle::AwaitingInitialConfigure;
        tracing::info!(fullscreen, output = %res.output, "window created");

        // The legacy shell never configures on its own
        if !has_configure_states {
            self.handle_configure(ShellConfigure {
                serial: 0,
                size: Size::default(),
                state: ShellState::empty(),
            })?;
        }
        Ok(())
    }

    pub fn destroy_window(&mut self) {
        if self.window.is_none() {
            return;
        }
        // Subsurfaces go before their parent
        self.decorator = Decorator::new(&self.decoration_config, None);
        self.window = None;
        self.pointer_focus.clear();
        self.surface_outputs.clear();
        self.full_size = None;
        self.idle_inhibited = false;
        self.lifecycle = Lifecycle::Connected;
        tracing::info!("window destroyed");
    }

    pub fn set_title(&mut self, title: &str) {
        self.window_config.title = title.to_string();
        self.decorator.set_title(title);
    }

    /// One configure transaction from the shell
    pub fn handle_configure(&mut self, configure: ShellConfigure) -> Result<(), WinSystemError> {
        let Some(window) = self.window.as_ref() else {
            return Err(WinSystemError::NoWindow);
        };
        let previous_state = self.state;
        self.state = if window.shell.capabilities().contains(ShellCapabilities::CONFIGURE_STATES) {
            configure.state
        } else if self.fullscreen_requested {
            ShellState::FULLSCREEN
        } else {
            ShellState::empty()
        };

        let full = self.resolve_configure_size(configure.size, previous_state);
        tracing::debug!(
            serial = configure.serial,
            width = full.width,
            height = full.height,
            state = ?self.state,
            "configure"
        );
        let changed = self.apply_full_size(full);

        self.update_current_output();
        self.lifecycle = if self.state.contains(ShellState::FULLSCREEN) {
            Lifecycle::Fullscreen
        } else {
            Lifecycle::Windowed
        };
        if changed && !is_constrained(self.state) {
            self.settings.set_windowed_size(self.size);
        }

        if let Some(window) = self.window.as_mut() {
            window.shell.ack_configure(configure.serial);
        }
        Ok(())
    }

    /// Fill in dimensions the compositor left to us
    fn resolve_configure_size(&self, requested: Size, previous_state: ShellState) -> Size {
        if !requested.has_zero_dimension() {
            return requested;
        }

        let windowed = || {
            self.settings
                .windowed_size()
                .filter(|size| !size.has_zero_dimension())
                .map(|size| self.decorator.calculate_full_surface_size(size, self.state))
        };
        let leaving_constrained = is_constrained(previous_state) && !is_constrained(self.state);
        let fallback = if leaving_constrained {
            windowed().or(self.full_size)
        } else {
            self.full_size.or_else(windowed)
        }
        .or_else(|| self.current_output_size())
        .unwrap_or_else(|| {
            let initial = Size::new(self.window_config.width, self.window_config.height);
            self.decorator.calculate_full_surface_size(initial, self.state)
        });

        Size::new(
            if requested.width == 0 { fallback.width } else { requested.width },
            if requested.height == 0 { fallback.height } else { requested.height },
        )
    }

    /// Current mode of the current output in surface coordinates
    fn current_output_size(&self) -> Option<Size> {
        let output = self
            .outputs
            .find_by_user_friendly_name(&self.current_output)
            .or_else(|| self.outputs.ready().into_iter().next())?;
        let mode = output.current_mode().ok()?;
        let scale = output.scale().max(1);
        Some(Size::new(mode.width / scale, mode.height / scale))
    }

    /// Apply a new full surface size; returns whether the content size changed
    fn apply_full_size(&mut self, full: Size) -> bool {
        let content = self.decorator.calculate_main_surface_size(full, self.state);
        let attached = self.window.as_ref().map(|w| w.render.attached_size());
        let changed = content != self.size || attached.is_some_and(|a| a != content * self.scale);
        self.full_size = Some(full);

        if changed {
            self.size = content;
            self.resize_render();
        }
        if let StateChange::Reset { .. } = self.decorator.set_state(full, self.scale, self.state) {
            for (seat, request) in self.decorator.refresh_cursors() {
                self.set_cursor(seat, request.serial, Some(request.name));
            }
        }
        if changed {
            if let Some(window) = self.window.as_mut() {
                window.surface.set_opaque_region(content);
            }
        }
        changed
    }

    fn resize_render(&mut self) {
        let buffer = self.buffer_size();
        let Some(window) = self.window.as_ref() else {
            return;
        };
        tracing::debug!(width = buffer.width, height = buffer.height, scale = self.scale, "resizing render buffers");
        window.render.resize(buffer);
        self.update_current_resolution();
        self.sink.push(InputEvent::Resize {
            width: buffer.width,
            height: buffer.height,
        });
    }

    fn update_current_resolution(&mut self) {
        let mut res = self.resolutions.current().unwrap_or_default();
        res.set_size(self.buffer_size());
        res.refresh_rate = self.refresh_hz;
        res.output = self.current_output.clone();
        res.fullscreen = self.state.contains(ShellState::FULLSCREEN);
        self.resolutions.set_current(res);
        self.resolutions.apply_calibrations();
        let index = self.resolutions.video_resolution();
        self.resolutions.set_video_resolution(index, true);
    }

    /// Resolution switch requested by the application
    ///
    /// The output named in `res` is only a hint; output and refresh rate are
    /// taken from the next configure and surface-enter events.
    pub fn set_full_screen(&mut self, fullscreen: bool, res: &Resolution) -> Result<(), WinSystemError> {
        if self.window.is_none() {
            return Err(WinSystemError::NoWindow);
        }
        let requested = res.size();
        if self.fullscreen_requested == fullscreen
            && self.current_output == res.output
            && self.buffer_size() == requested
            && self.refresh_hz == res.refresh_rate
        {
            tracing::debug!("resolution unchanged");
            return Ok(());
        }

        tracing::info!(
            fullscreen,
            output = %res.output,
            width = res.width,
            height = res.height,
            refresh = res.refresh_rate,
            "switching resolution"
        );
        self.fullscreen_requested = fullscreen;

        if fullscreen {
            let output = self.outputs.find_by_user_friendly_name(&res.output);
            if output.is_none() {
                tracing::warn!(output = %res.output, "requested output not connected");
            }
            if let Some(window) = self.window.as_mut() {
                window.shell.set_full_screen(output, res.refresh_rate);
            }
            return Ok(());
        }

        if let Some(window) = self.window.as_mut() {
            window.shell.set_windowed();
        }
        if is_constrained(self.state) {
            // The compositor dictates the size until it lifts the constraint
            return Ok(());
        }
        let scale = self.scale.max(1);
        let content = Size::new(requested.width / scale, requested.height / scale);
        if content.has_zero_dimension() {
            return Ok(());
        }
        let full = self.decorator.calculate_full_surface_size(content, self.state);
        self.apply_full_size(full);
        Ok(())
    }

    /// Interactive request from the decorations
    pub fn handle_decoration_action(&mut self, seat: u32, action: DecorationAction) {
        let seat_ref = SeatRef {
            global_name: seat,
            proxy: self.seats.get(&seat).and_then(|s| s.proxy().cloned()),
        };
        let maximized = self.state.contains(ShellState::MAXIMIZED);
        if action == DecorationAction::Close {
            self.handle_close();
            return;
        }
        let Some(window) = self.window.as_mut() else {
            return;
        };
        tracing::debug!(seat, ?action, "decoration action");
        match action {
            DecorationAction::Move { serial } => window.shell.start_move(&seat_ref, serial),
            DecorationAction::Resize { serial, edge } => window.shell.start_resize(&seat_ref, serial, edge),
            DecorationAction::Minimize => window.shell.set_minimized(),
            DecorationAction::Maximize if maximized => window.shell.unset_maximized(),
            DecorationAction::Maximize => window.shell.set_maximized(),
            DecorationAction::ContextMenu { serial, position } => {
                window.shell.show_context_menu(&seat_ref, serial, position)
            }
            DecorationAction::Close => {}
        }
    }

    pub fn handle_shell_event(&mut self, event: ShellEvent) -> Result<(), WinSystemError> {
        match event {
            ShellEvent::Configure(configure) => self.handle_configure(configure),
            ShellEvent::Close => {
                self.handle_close();
                Ok(())
            }
        }
    }

    /// The compositor or the user asked the window to close
    pub fn handle_close(&mut self) {
        tracing::info!("close requested");
        self.sink.push(InputEvent::Quit);
    }

    /// Returns false when idle inhibition is unavailable
    pub fn inhibit_idle(&mut self, inhibit: bool) -> bool {
        let Some(window) = self.window.as_mut() else {
            return false;
        };
        if self.idle_inhibited == inhibit {
            return true;
        }
        let supported = window.surface.inhibit_idle(inhibit);
        if supported {
            self.idle_inhibited = inhibit;
        }
        supported
    }
}

fn is_constrained(state: ShellState) -> bool {
    state.intersects(ShellState::MAXIMIZED | ShellState::FULLSCREEN)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::geometry::Point;
    use crate::keymap::{Keymap, KeymapError};
    use crate::output::Mode;
    use crate::shell_surface::{ResizeEdge, ShellKind};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Resize(Size),
        Ack(u32),
        Fullscreen(Option<u32>),
        Windowed,
        Maximize,
        Unmaximize,
        Move(u32),
        Resizing(ResizeEdge),
        Menu(Point),
        BufferScale(i32),
        Opaque(Size),
        ThemeScale(i32),
        Cursor(u32, Option<&'static str>),
        WindowedSize(Size),
        Lost,
        Reset,
        Focus(bool),
    }

    type Log = Arc<Mutex<Vec<Call>>>;

    fn record(log: &Log, call: Call) {
        log.lock().unwrap().push(call);
    }

    struct Shell {
        log: Log,
        capabilities: ShellCapabilities,
    }

    impl ShellSurface for Shell {
        fn kind(&self) -> ShellKind {
            ShellKind::Xdg
        }
        fn capabilities(&self) -> ShellCapabilities {
            self.capabilities
        }
        fn initialize(&mut self) {}
        fn set_full_screen(&mut self, output: Option<&Output>, _refresh_hz: f32) {
            record(&self.log, Call::Fullscreen(output.map(Output::global_name)));
        }
        fn set_windowed(&mut self) {
            record(&self.log, Call::Windowed);
        }
        fn set_maximized(&mut self) {
            record(&self.log, Call::Maximize);
        }
        fn unset_maximized(&mut self) {
            record(&self.log, Call::Unmaximize);
        }
        fn set_minimized(&mut self) {}
        fn start_move(&mut self, _seat: &SeatRef, serial: u32) {
            record(&self.log, Call::Move(serial));
        }
        fn start_resize(&mut self, _seat: &SeatRef, _serial: u32, edge: ResizeEdge) {
            record(&self.log, Call::Resizing(edge));
        }
        fn show_context_menu(&mut self, _seat: &SeatRef, _serial: u32, position: Point) {
            record(&self.log, Call::Menu(position));
        }
        fn ack_configure(&mut self, serial: u32) {
            record(&self.log, Call::Ack(serial));
        }
    }

    struct Surface(Log);

    impl WindowSurface for Surface {
        fn set_buffer_scale(&mut self, scale: i32) {
            record(&self.0, Call::BufferScale(scale));
        }
        fn set_opaque_region(&mut self, size: Size) {
            record(&self.0, Call::Opaque(size));
        }
        fn inhibit_idle(&mut self, _inhibit: bool) -> bool {
            false
        }
    }

    struct Cursor(Log);

    impl CursorControl for Cursor {
        fn set_theme_scale(&mut self, scale: i32) {
            record(&self.0, Call::ThemeScale(scale));
        }
        fn set_cursor(&mut self, seat: u32, _serial: u32, name: Option<&'static str>) {
            record(&self.0, Call::Cursor(seat, name));
        }
    }

    struct Render {
        log: Log,
        size: Mutex<Size>,
    }

    impl RenderContext for Render {
        fn resize(&self, size: Size) {
            *self.size.lock().unwrap() = size;
            record(&self.log, Call::Resize(size));
        }
        fn attached_size(&self) -> Size {
            *self.size.lock().unwrap()
        }
        fn swap_buffers(&self) {}
        fn set_vsync(&self, _enabled: bool) {}
    }

    #[derive(Default)]
    struct Resolutions {
        current: Option<Resolution>,
        desktop: Option<Resolution>,
        added: Vec<Resolution>,
    }

    impl ResolutionList for Resolutions {
        fn clear_custom(&mut self) {
            self.added.clear();
        }
        fn add(&mut self, res: Resolution) {
            self.added.push(res);
        }
        fn desktop(&self) -> Option<Resolution> {
            self.desktop.clone()
        }
        fn set_desktop(&mut self, res: Resolution) {
            self.desktop = Some(res);
        }
        fn current(&self) -> Option<Resolution> {
            self.current.clone()
        }
        fn set_current(&mut self, res: Resolution) {
            self.current = Some(res);
        }
        fn apply_calibrations(&mut self) {}
        fn video_resolution(&self) -> usize {
            0
        }
        fn set_video_resolution(&mut self, _index: usize, _force: bool) {}
    }

    struct Settings {
        log: Log,
        windowed: Option<Size>,
    }

    impl SettingsStore for Settings {
        fn monitor(&self) -> String {
            String::new()
        }
        fn windowed_size(&self) -> Option<Size> {
            self.windowed
        }
        fn set_windowed_size(&mut self, size: Size) {
            self.windowed = Some(size);
            record(&self.log, Call::WindowedSize(size));
        }
    }

    #[derive(Default)]
    struct Sink(Mutex<Vec<InputEvent>>);

    impl InputSink for Sink {
        fn push(&self, event: InputEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    struct Resource(Log);

    impl DispResource for Resource {
        fn on_app_focus_change(&self, focused: bool) {
            record(&self.0, Call::Focus(focused));
        }
        fn on_lost_display(&self) {
            record(&self.0, Call::Lost);
        }
        fn on_reset_display(&self) {
            record(&self.0, Call::Reset);
        }
    }

    struct NoKeymaps;

    impl KeymapFactory for NoKeymaps {
        fn compile(&self, _text: &str) -> Result<Box<dyn Keymap>, KeymapError> {
            Err(KeymapError::Compile)
        }
    }

    struct Fixture {
        winsys: WinSystem,
        log: Log,
        sink: Arc<Sink>,
    }

    impl Fixture {
        fn calls(&self) -> Vec<Call> {
            self.log.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.log.lock().unwrap().clear();
        }

        fn events(&self) -> Vec<InputEvent> {
            self.sink.0.lock().unwrap().clone()
        }
    }

    fn fixture(capabilities: ShellCapabilities, windowed: Option<Size>) -> Fixture {
        let log: Log = Arc::default();
        let sink = Arc::new(Sink::default());
        let mut winsys = WinSystem::new(
            &Config::default(),
            Collaborators {
                resolutions: Box::new(Resolutions::default()),
                settings: Box::new(Settings {
                    log: log.clone(),
                    windowed,
                }),
                sink: sink.clone(),
                keymap_factory: Arc::new(NoKeymaps),
            },
        );
        for (name, scale, model) in [(10, 1, "U2415"), (11, 2, "P2715Q")] {
            winsys.add_output(Output::new(name, None));
            for event in output_events(model, scale) {
                winsys.handle_output_event(name, event);
            }
        }
        winsys.mark_connected().unwrap();
        winsys
            .create_window(
                WindowParts {
                    shell: Box::new(Shell {
                        log: log.clone(),
                        capabilities,
                    }),
                    render: Arc::new(Render {
                        log: log.clone(),
                        size: Mutex::new(Size::default()),
                    }),
                    surface: Box::new(Surface(log.clone())),
                    cursor: Box::new(Cursor(log.clone())),
                    decorations: None,
                    title_renderer: None,
                },
                false,
                &Resolution::new(Size::new(1280, 720), 60.0, "Dell U2415"),
            )
            .unwrap();
        winsys.register(Arc::new(Resource(log.clone())));
        Fixture { winsys, log, sink }
    }

    fn output_events(model: &str, scale: i32) -> Vec<OutputEvent> {
        vec![
            OutputEvent::Geometry {
                x: 0,
                y: 0,
                physical_width: 509,
                physical_height: 286,
                make: "Dell".to_string(),
                model: model.to_string(),
            },
            OutputEvent::Mode {
                mode: Mode::new(1920, 1080, 60000),
                current: true,
                preferred: true,
            },
            OutputEvent::Scale(scale),
            OutputEvent::Done,
        ]
    }

    fn configure(serial: u32, width: i32, height: i32, state: ShellState) -> ShellConfigure {
        ShellConfigure {
            serial,
            size: Size::new(width, height),
            state,
        }
    }

    #[test]
    fn resize_precedes_ack_and_unchanged_configure_only_acks() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.clear();

        f.winsys.handle_configure(configure(5, 800, 600, ShellState::ACTIVATED)).unwrap();
        let calls = f.calls();
        let resize = calls.iter().position(|c| *c == Call::Resize(Size::new(800, 600)));
        let ack = calls.iter().position(|c| *c == Call::Ack(5));
        assert!(resize.is_some() && ack.is_some());
        assert!(resize < ack);
        assert_eq!(f.winsys.lifecycle(), Lifecycle::Windowed);

        f.clear();
        f.winsys.handle_configure(configure(6, 800, 600, ShellState::ACTIVATED)).unwrap();
        let calls = f.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Resize(_))));
        assert_eq!(calls.iter().filter(|c| **c == Call::Ack(6)).count(), 1);
    }

    #[test]
    fn zero_size_uses_windowed_preference_first_time() {
        let mut f = fixture(ShellCapabilities::all(), Some(Size::new(1024, 576)));
        f.winsys.handle_configure(configure(1, 0, 0, ShellState::empty())).unwrap();
        assert_eq!(f.winsys.size(), Size::new(1024, 576));
    }

    #[test]
    fn zero_size_keeps_current_size() {
        let mut f = fixture(ShellCapabilities::all(), Some(Size::new(1024, 576)));
        f.winsys.handle_configure(configure(1, 800, 600, ShellState::empty())).unwrap();
        f.winsys.handle_configure(configure(2, 0, 0, ShellState::empty())).unwrap();
        assert_eq!(f.winsys.size(), Size::new(800, 600));
    }

    #[test]
    fn zero_size_falls_back_to_output_mode() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys.handle_configure(configure(1, 0, 0, ShellState::empty())).unwrap();
        assert_eq!(f.winsys.size(), Size::new(1920, 1080));
    }

    #[test]
    fn leaving_fullscreen_replays_windowed_size() {
        let mut f = fixture(ShellCapabilities::all(), Some(Size::new(1024, 576)));
        f.winsys
            .handle_configure(configure(1, 1920, 1080, ShellState::FULLSCREEN))
            .unwrap();
        assert_eq!(f.winsys.lifecycle(), Lifecycle::Fullscreen);

        f.winsys.handle_configure(configure(2, 0, 0, ShellState::empty())).unwrap();
        assert_eq!(f.winsys.size(), Size::new(1024, 576));
        assert_eq!(f.winsys.lifecycle(), Lifecycle::Windowed);
    }

    #[test]
    fn windowed_resize_is_persisted() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.clear();
        f.winsys.handle_configure(configure(1, 900, 700, ShellState::empty())).unwrap();
        assert!(f.calls().contains(&Call::WindowedSize(Size::new(900, 700))));

        f.clear();
        f.winsys
            .handle_configure(configure(2, 1920, 1080, ShellState::MAXIMIZED))
            .unwrap();
        assert!(!f.calls().iter().any(|c| matches!(c, Call::WindowedSize(_))));
    }

    #[test]
    fn scale_follows_densest_overlapped_output() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys.handle_configure(configure(1, 800, 600, ShellState::empty())).unwrap();

        f.winsys.on_surface_enter(10);
        assert_eq!(f.winsys.buffer_scale(), 1);
        f.clear();
        f.winsys.on_surface_enter(11);
        assert_eq!(f.winsys.buffer_scale(), 2);
        assert_eq!(f.winsys.current_output(), "Dell P2715Q");
        let calls = f.calls();
        assert!(calls.contains(&Call::BufferScale(2)));
        assert!(calls.contains(&Call::ThemeScale(2)));
        assert!(calls.contains(&Call::Resize(Size::new(1600, 1200))));

        f.clear();
        f.winsys.on_surface_leave(11);
        assert_eq!(f.winsys.buffer_scale(), 1);
        assert_eq!(
            f.calls(),
            vec![
                Call::BufferScale(1),
                Call::Opaque(Size::new(800, 600)),
                Call::ThemeScale(1),
                Call::Lost,
                Call::Resize(Size::new(800, 600)),
                Call::Reset,
            ]
        );
    }

    #[test]
    fn removed_output_drops_out_of_overlap() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys.handle_configure(configure(1, 800, 600, ShellState::empty())).unwrap();
        f.winsys.on_surface_enter(10);
        f.winsys.on_surface_enter(11);
        f.winsys.remove_output(11);
        assert_eq!(f.winsys.buffer_scale(), 1);
        assert_eq!(f.winsys.connected_outputs(), vec!["Dell U2415".to_string()]);
    }

    #[test]
    fn fullscreen_request_hints_output() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.clear();
        let res = Resolution::new(Size::new(1920, 1080), 60.0, "Dell P2715Q");
        f.winsys.set_full_screen(true, &res).unwrap();
        assert_eq!(f.calls(), vec![Call::Fullscreen(Some(11))]);
    }

    #[test]
    fn windowed_request_picks_size_only_when_unconstrained() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys
            .handle_configure(configure(1, 1920, 1080, ShellState::MAXIMIZED))
            .unwrap();
        f.clear();
        let res = Resolution::new(Size::new(1280, 720), 60.0, "Dell U2415");
        f.winsys.set_full_screen(false, &res).unwrap();
        assert!(!f.calls().iter().any(|c| matches!(c, Call::Resize(_))));

        f.winsys.handle_configure(configure(2, 800, 600, ShellState::empty())).unwrap();
        f.clear();
        f.winsys.set_full_screen(false, &res).unwrap();
        assert!(f.calls().contains(&Call::Resize(Size::new(1280, 720))));
        assert_eq!(f.winsys.size(), Size::new(1280, 720));
    }

    #[test]
    fn legacy_shell_is_configured_immediately() {
        let f = fixture(ShellCapabilities::MOVE, Some(Size::new(640, 480)));
        assert_eq!(f.winsys.lifecycle(), Lifecycle::Windowed);
        assert_eq!(f.winsys.size(), Size::new(640, 480));
    }

    #[test]
    fn desktop_resolution_from_current_mode() {
        let f = fixture(ShellCapabilities::all(), None);
        let res = f.winsys.resolutions.desktop().unwrap();
        assert_eq!(res.size(), Size::new(1920, 1080));
        assert_eq!(res.output, "Dell U2415");
        assert!((res.pixel_ratio - 0.9945).abs() < 0.001);
    }

    #[test]
    fn keyboard_focus_reaches_disp_resources() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys.add_seat(1, None);
        f.winsys.handle_seat_capabilities(1, Capabilities::KEYBOARD);
        f.clear();
        f.winsys.handle_keyboard(1, KeyboardEvent::Enter);
        f.winsys.handle_keyboard(1, KeyboardEvent::Leave);
        assert_eq!(f.calls(), vec![Call::Focus(true), Call::Focus(false)]);
        assert!(f.events().contains(&InputEvent::FocusChange { focused: false }));
    }

    #[test]
    fn hidden_os_mouse_sets_null_cursor() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys.add_seat(1, None);
        f.winsys.handle_seat_capabilities(1, Capabilities::POINTER);
        f.winsys.pointer_enter(1, PointerTarget::Main, 3, PointF::new(1.0, 1.0));
        f.winsys.handle_pointer(1, PointerEvent::Leave);
        f.winsys.show_os_mouse(false);
        f.clear();
        f.winsys.pointer_enter(1, PointerTarget::Main, 4, PointF::new(1.0, 1.0));
        assert_eq!(f.calls(), vec![Call::Cursor(1, None)]);
        assert!(f.winsys.is_mouse_active());
    }

    #[test]
    fn maximize_button_toggles() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.clear();
        f.winsys.handle_decoration_action(1, DecorationAction::Maximize);
        f.winsys
            .handle_configure(configure(1, 1920, 1080, ShellState::MAXIMIZED))
            .unwrap();
        f.winsys.handle_decoration_action(1, DecorationAction::Maximize);
        let calls = f.calls();
        assert_eq!(calls.first(), Some(&Call::Maximize));
        assert!(calls.contains(&Call::Unmaximize));
    }

    #[test]
    fn close_becomes_quit() {
        let mut f = fixture(ShellCapabilities::all(), None);
        f.winsys.handle_decoration_action(1, DecorationAction::Close);
        assert_eq!(f.events().last(), Some(&InputEvent::Quit));
    }

    #[test]
    fn second_window_rejected() {
        let mut f = fixture(ShellCapabilities::all(), None);
        let log = f.log.clone();
        let result = f.winsys.create_window(
            WindowParts {
                shell: Box::new(Shell {
                    log: log.clone(),
                    capabilities: ShellCapabilities::all(),
                }),
                render: Arc::new(Render {
                    log: log.clone(),
                    size: Mutex::new(Size::default()),
                }),
                surface: Box::new(Surface(log.clone())),
                cursor: Box::new(Cursor(log)),
                decorations: None,
                title_renderer: None,
            },
            false,
            &Resolution::default(),
        );
        assert!(matches!(result, Err(WinSystemError::WindowExists)));
    }
}
