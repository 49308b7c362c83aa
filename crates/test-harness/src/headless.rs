//! Window system wired to mocks, for testing without a compositor

use std::sync::{Arc, Mutex};

use windowing::config::Config;
use windowing::decorator::DecorationSurfaces;
use windowing::geometry::{PointF, Size};
use windowing::input_event::InputEvent;
use windowing::output::Output;
use windowing::seat::{Capabilities, CapabilityDiff, KeyboardEvent, PointerEvent, TouchEvent};
use windowing::shell_surface::{ShellConfigure, ShellEvent, ShellState};
use windowing::winsystem::{
    Collaborators, Lifecycle, PointerTarget, RenderContext, Resolution, WinSystem, WinSystemError,
    WindowParts,
};

use crate::fixtures::OutputDescription;
use crate::mocks::{
    Call, CallLog, DecorationRecord, MemorySettings, MockCursor, MockDecorationSurfaces, MockRenderContext,
    MockResolutionList, MockShellSurface, MockWindowSurface, RecordingResource, RecordingSink, ResolutionState,
    TableKeymap, TableKeymapFactory,
};

/// Which shell protocol the mock window pretends to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShellFlavor {
    #[default]
    Xdg,
    Legacy,
}

/// How to build a [`TestWinSystem`]
#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub config: Config,
    pub shell: ShellFlavor,
    /// Give the window decoration surfaces
    pub decorations: bool,
    pub idle_inhibit: bool,
    pub monitor: String,
    pub windowed_size: Option<Size>,
    pub keymap: TableKeymap,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            config: Config::default(),
            shell: ShellFlavor::Xdg,
            decorations: false,
            idle_inhibit: true,
            monitor: String::new(),
            windowed_size: None,
            keymap: TableKeymap::basic(),
        }
    }
}

/// Snapshot of window-system state for assertions
#[derive(Debug, Clone, PartialEq)]
pub struct WinSystemSnapshot {
    pub lifecycle: Lifecycle,
    /// Content size in surface coordinates
    pub size: Size,
    pub buffer_size: Size,
    pub buffer_scale: i32,
    pub state: ShellState,
    pub current_output: String,
    pub refresh_rate: f32,
    pub focused: bool,
}

/// Window system plus handles to everything its mocks recorded
pub struct TestWinSystem {
    pub winsys: WinSystem,
    pub log: CallLog,
    pub sink: Arc<RecordingSink>,
    pub render: Arc<MockRenderContext>,
    pub resolutions: Arc<Mutex<ResolutionState>>,
    pub decorations: Option<Arc<Mutex<DecorationRecord>>>,
    options: HarnessOptions,
}

impl TestWinSystem {
    /// Unconnected window system without outputs
    pub fn new(options: HarnessOptions) -> Self {
        let log = CallLog::new();
        let sink = Arc::new(RecordingSink::new());
        let (resolution_list, resolutions) = MockResolutionList::new(log.clone());
        let mut settings = MemorySettings::new(log.clone()).with_monitor(&options.monitor);
        if let Some(size) = options.windowed_size {
            settings = settings.with_windowed_size(size);
        }

        let mut winsys = WinSystem::new(
            &options.config,
            Collaborators {
                resolutions: Box::new(resolution_list),
                settings: Box::new(settings),
                sink: sink.clone(),
                keymap_factory: Arc::new(TableKeymapFactory::new(options.keymap.clone())),
            },
        );
        winsys.register(Arc::new(RecordingResource::new(log.clone())));

        Self {
            winsys,
            render: Arc::new(MockRenderContext::new(log.clone())),
            log,
            sink,
            resolutions,
            decorations: None,
            options,
        }
    }

    /// Connected window system with `outputs` announced, named 1, 2, ...
    pub fn connected(options: HarnessOptions, outputs: &[OutputDescription]) -> Self {
        let mut tw = Self::new(options);
        for (index, output) in outputs.iter().enumerate() {
            tw.announce_output(index as u32 + 1, output);
        }
        tw.winsys.mark_connected().unwrap();
        tw
    }

    /// Connected, windowed and configured at `size`
    pub fn windowed(options: HarnessOptions, outputs: &[OutputDescription], size: Size) -> Self {
        let mut tw = Self::connected(options, outputs);
        tw.create_window(false).unwrap();
        tw.configure(1, size.width, size.height, ShellState::ACTIVATED);
        tw.clear_calls();
        tw.sink.take();
        tw
    }

    pub fn announce_output(&mut self, name: u32, output: &OutputDescription) {
        self.winsys.add_output(Output::new(name, None));
        for event in output.events() {
            self.winsys.handle_output_event(name, event);
        }
    }

    pub fn create_window(&mut self, fullscreen: bool) -> Result<(), WinSystemError> {
        let shell = match self.options.shell {
            ShellFlavor::Xdg => MockShellSurface::xdg(self.log.clone()),
            ShellFlavor::Legacy => MockShellSurface::legacy(self.log.clone()),
        };
        let surface = if self.options.idle_inhibit {
            MockWindowSurface::new(self.log.clone())
        } else {
            MockWindowSurface::without_idle_inhibit(self.log.clone())
        };
        let decorations: Option<Box<dyn DecorationSurfaces>> = if self.options.decorations {
            let (surfaces, record) = MockDecorationSurfaces::new(self.log.clone());
            self.decorations = Some(record);
            Some(Box::new(surfaces))
        } else {
            None
        };

        let output = self.winsys.connected_outputs().into_iter().next().unwrap_or_default();
        let res = Resolution::new(
            Size::new(self.options.config.window.width, self.options.config.window.height),
            60.0,
            &output,
        );
        self.winsys.create_window(
            WindowParts {
                shell: Box::new(shell),
                render: self.render.clone(),
                surface: Box::new(surface),
                cursor: Box::new(MockCursor::new(self.log.clone())),
                decorations,
                title_renderer: None,
            },
            fullscreen,
            &res,
        )
    }

    pub fn configure(&mut self, serial: u32, width: i32, height: i32, state: ShellState) {
        tracing::trace!(serial, width, height, ?state, "injecting configure");
        self.winsys
            .handle_shell_event(ShellEvent::Configure(ShellConfigure {
                serial,
                size: Size::new(width, height),
                state,
            }))
            .unwrap();
    }

    pub fn enter_output(&mut self, name: u32) {
        self.winsys.on_surface_enter(name);
    }

    pub fn leave_output(&mut self, name: u32) {
        self.winsys.on_surface_leave(name);
    }

    /// Seat `name` announcing `capabilities`
    pub fn seat_capabilities(&mut self, name: u32, capabilities: Capabilities) -> CapabilityDiff {
        if self.winsys.seat(name).is_none() {
            self.winsys.add_seat(name, None);
        }
        self.winsys.handle_seat_capabilities(name, capabilities)
    }

    pub fn pointer_enter(&mut self, seat: u32, target: PointerTarget, serial: u32, x: f64, y: f64) {
        self.winsys.pointer_enter(seat, target, serial, PointF::new(x, y));
    }

    pub fn pointer(&mut self, seat: u32, event: PointerEvent) {
        self.winsys.handle_pointer(seat, event);
    }

    pub fn keyboard(&mut self, seat: u32, event: KeyboardEvent) {
        self.winsys.handle_keyboard(seat, event);
    }

    pub fn touch(&mut self, seat: u32, event: TouchEvent) {
        self.winsys.handle_touch(seat, event);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.log.calls()
    }

    pub fn clear_calls(&self) {
        self.log.clear();
    }

    /// Size the render context was last resized to
    pub fn render_size(&self) -> Size {
        self.render.attached_size()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.sink.events()
    }

    pub fn snapshot(&self) -> WinSystemSnapshot {
        WinSystemSnapshot {
            lifecycle: self.winsys.lifecycle(),
            size: self.winsys.size(),
            buffer_size: self.winsys.buffer_size(),
            buffer_scale: self.winsys.buffer_scale(),
            state: self.winsys.state(),
            current_output: self.winsys.current_output().to_string(),
            refresh_rate: self.winsys.refresh_rate(),
            focused: self.winsys.is_focused(),
        }
    }
}
