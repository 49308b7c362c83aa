//! Wayland protocol glue
//!
//! [`BackendState`] is the dispatch target of the event queue and lives on
//! the event-pump thread. It binds globals, turns protocol events into
//! protocol-independent ones and hands them to the shared [`WinSystem`].
//! [`WaylandWindowSystem`] is what the application holds on its own thread.

mod dispatch;
pub mod surfaces;

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use wayland_client::backend::{ObjectId, WaylandError};
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_data_device_manager::WlDataDeviceManager;
use wayland_client::protocol::wl_keyboard::WlKeyboard;
use wayland_client::protocol::wl_output::WlOutput;
use wayland_client::protocol::wl_pointer::WlPointer;
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::protocol::wl_shell::WlShell;
use wayland_client::protocol::wl_shm::WlShm;
use wayland_client::protocol::wl_subcompositor::WlSubcompositor;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::protocol::wl_touch::WlTouch;
use wayland_client::{Connection, Proxy, QueueHandle};
use wayland_protocols::wp::idle_inhibit::zv1::client::zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1;
use wayland_protocols::wp::presentation_time::client::wp_presentation::WpPresentation;
use wayland_protocols::xdg::shell::client::xdg_wm_base::XdgWmBase;

use crate::config::Config;
use crate::connection::{self, ConnectionError, Established};
use crate::cursor::CursorManager;
use crate::decorator::shm::PendingBuffers;
use crate::decorator::title::TitleRenderer;
use crate::decorator::{BorderSurface, DecorationSurfaces};
use crate::event_pump::EventPump;
use crate::registry::{Registry, RegistryError};
use crate::seat::RepeatCommand;
use crate::shell_surface::{ShellSurface, WlShellSurface, XdgConfigureAccumulator, XdgShellSurface};
use crate::winsystem::{
    Collaborators, DispResource, Lifecycle, PresentationTracker, RenderContext, Resolution, WinSystem,
    WinSystemError, WindowParts,
};

use surfaces::{MainSurface, WaylandCursor, WaylandDecorationSurfaces};

/// How long window creation waits for the first configure
pub const INITIAL_CONFIGURE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum BackendError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    WinSystem(#[from] WinSystemError),

    #[error("compositor did not configure the window within {0:?}")]
    NoInitialConfigure(Duration),

    #[error("no shell global bound")]
    NoShell,

    #[error("failed to start the event pump: {0}")]
    Pump(#[source] std::io::Error),

    #[error("failed to flush requests: {0}")]
    Flush(#[from] WaylandError),
}

/// User data of every `wl_surface` we create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceRole {
    Main,
    Decoration(BorderSurface),
    Cursor,
}

pub type SharedPendingBuffers = Arc<Mutex<PendingBuffers<ObjectId, WlBuffer>>>;
pub type SharedPointers = Arc<Mutex<HashMap<u32, WlPointer>>>;

/// Lock, recovering the data if another thread panicked while holding it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bound singleton globals
#[derive(Debug, Clone, Default)]
pub struct Globals {
    pub compositor: Option<WlCompositor>,
    pub shm: Option<WlShm>,
    pub subcompositor: Option<WlSubcompositor>,
    pub wm_base: Option<XdgWmBase>,
    pub wl_shell: Option<WlShell>,
    pub presentation: Option<WpPresentation>,
    pub idle_inhibit: Option<ZwpIdleInhibitManagerV1>,
    pub data_device_manager: Option<WlDataDeviceManager>,
}

/// Input devices obtained from one seat
#[derive(Debug)]
pub(crate) struct SeatDevices {
    seat: WlSeat,
    pointer: Option<WlPointer>,
    keyboard: Option<WlKeyboard>,
    touch: Option<WlTouch>,
}

impl SeatDevices {
    fn new(seat: WlSeat) -> Self {
        Self {
            seat,
            pointer: None,
            keyboard: None,
            touch: None,
        }
    }

    fn release_pointer(&mut self) {
        if let Some(pointer) = self.pointer.take() {
            if pointer.version() >= 3 {
                pointer.release();
            }
        }
    }

    fn release_keyboard(&mut self) {
        if let Some(keyboard) = self.keyboard.take() {
            if keyboard.version() >= 3 {
                keyboard.release();
            }
        }
    }

    fn release_touch(&mut self) {
        if let Some(touch) = self.touch.take() {
            if touch.version() >= 3 {
                touch.release();
            }
        }
    }

    fn release(mut self) {
        self.release_pointer();
        self.release_keyboard();
        self.release_touch();
        if self.seat.version() >= 5 {
            self.seat.release();
        }
    }
}

/// Dispatch target of the event queue
pub struct BackendState {
    pub(crate) registry: Registry,
    pub(crate) globals: Globals,
    pub(crate) winsys: Arc<Mutex<WinSystem>>,
    /// Signalled after every configure so window creation can wait for it
    pub(crate) configured: Arc<Condvar>,
    pub(crate) devices: HashMap<u32, SeatDevices>,
    pub(crate) outputs: HashMap<u32, WlOutput>,
    pub(crate) pointers: SharedPointers,
    pub(crate) pending_buffers: SharedPendingBuffers,
    pub(crate) presentation: Arc<Mutex<PresentationTracker>>,
    pub(crate) xdg_configure: XdgConfigureAccumulator,
    /// Key-repeat commands for the pump loop, applied after each dispatch
    pub(crate) repeat_commands: Vec<(u32, RepeatCommand)>,
    /// First registry error during the initial round trips
    pub(crate) fatal: Option<RegistryError>,
}

impl BackendState {
    pub fn new(winsys: Arc<Mutex<WinSystem>>, presentation: Arc<Mutex<PresentationTracker>>) -> Self {
        let mut registry = Registry::new();
        connection::register_interests(&mut registry);
        Self {
            registry,
            globals: Globals::default(),
            winsys,
            configured: Arc::new(Condvar::new()),
            devices: HashMap::new(),
            outputs: HashMap::new(),
            pointers: Arc::default(),
            pending_buffers: Arc::default(),
            presentation,
            xdg_configure: XdgConfigureAccumulator::new(),
            repeat_commands: Vec::new(),
            fatal: None,
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn winsys(&self) -> &Arc<Mutex<WinSystem>> {
        &self.winsys
    }

    /// Drain repeat commands queued by keyboard dispatch
    pub fn take_repeat_commands(&mut self) -> Vec<(u32, RepeatCommand)> {
        std::mem::take(&mut self.repeat_commands)
    }
}

/// What a render context needs to draw into the main surface
pub struct RenderTarget<'a> {
    pub connection: &'a Connection,
    pub surface: &'a WlSurface,
    pub shm: &'a WlShm,
    pub qh: &'a QueueHandle<BackendState>,
    /// Buffers attached to the surface must be registered here
    pub pending_buffers: &'a SharedPendingBuffers,
}

/// The window system as seen from the application thread
pub struct WaylandWindowSystem {
    config: Config,
    connection: Connection,
    qh: QueueHandle<BackendState>,
    globals: Globals,
    winsys: Arc<Mutex<WinSystem>>,
    configured: Arc<Condvar>,
    pointers: SharedPointers,
    pending_buffers: SharedPendingBuffers,
    presentation: Arc<Mutex<PresentationTracker>>,
    render: Option<Arc<dyn RenderContext>>,
    main_surface: Option<WlSurface>,
    next_frame: u64,
    pump: Option<EventPump>,
}

impl WaylandWindowSystem {
    /// Connect, collect globals, outputs and seats, then start the event pump
    pub fn connect(config: Config, collaborators: Collaborators) -> Result<Self, BackendError> {
        let sink = collaborators.sink.clone();
        let winsys = Arc::new(Mutex::new(WinSystem::new(&config, collaborators)));
        let presentation = Arc::new(Mutex::new(PresentationTracker::new(&config.presentation)));

        let Established {
            connection,
            queue,
            state,
        } = connection::establish(winsys.clone(), presentation.clone())?;

        let qh = queue.handle();
        let globals = state.globals.clone();
        let configured = state.configured.clone();
        let pointers = state.pointers.clone();
        let pending_buffers = state.pending_buffers.clone();

        let pump = EventPump::start(connection.clone(), queue, state, sink).map_err(BackendError::Pump)?;

        Ok(Self {
            config,
            connection,
            qh,
            globals,
            winsys,
            configured,
            pointers,
            pending_buffers,
            presentation,
            render: None,
            main_surface: None,
            next_frame: 0,
            pump: Some(pump),
        })
    }

    /// Create the main window and wait for its first configure
    ///
    /// `make_render` builds the render context once the surface exists.
    pub fn create_window<F>(&mut self, fullscreen: bool, res: &Resolution, make_render: F) -> Result<(), BackendError>
    where
        F: FnOnce(&RenderTarget<'_>) -> Arc<dyn RenderContext>,
    {
        let (Some(compositor), Some(shm)) = (self.globals.compositor.clone(), self.globals.shm.clone()) else {
            return Err(ConnectionError::Registry(RegistryError::MissingGlobal("wl_compositor".to_string())).into());
        };
        let window = &self.config.window;
        let surface = compositor.create_surface(&self.qh, SurfaceRole::Main);

        let shell: Box<dyn ShellSurface> = if let Some(wm_base) = self.globals.wm_base.as_ref() {
            Box::new(XdgShellSurface::new(wm_base, &surface, &window.title, &window.app_id, &self.qh))
        } else if let Some(wl_shell) = self.globals.wl_shell.as_ref() {
            Box::new(WlShellSurface::new(wl_shell, &surface, &window.title, &window.app_id, &self.qh))
        } else {
            surface.destroy();
            return Err(BackendError::NoShell);
        };

        let decorations: Option<Box<dyn DecorationSurfaces>> =
            match (self.globals.subcompositor.as_ref(), self.globals.wm_base.as_ref()) {
                (Some(subcompositor), Some(_)) => Some(Box::new(WaylandDecorationSurfaces::new(
                    &compositor,
                    subcompositor,
                    &shm,
                    &surface,
                    &self.qh,
                    self.pending_buffers.clone(),
                ))),
                _ => {
                    tracing::info!("compositor cannot host client-side decorations");
                    None
                }
            };

        let cursor = WaylandCursor::new(
            CursorManager::new(&self.connection, &compositor, &shm, &self.config.cursor, &self.qh),
            self.pointers.clone(),
        );
        let render = make_render(&RenderTarget {
            connection: &self.connection,
            surface: &surface,
            shm: &shm,
            qh: &self.qh,
            pending_buffers: &self.pending_buffers,
        });

        let parts = WindowParts {
            shell,
            render: render.clone(),
            surface: Box::new(MainSurface::new(
                &surface,
                &compositor,
                self.globals.idle_inhibit.clone(),
                &self.qh,
            )),
            cursor: Box::new(cursor),
            decorations,
            title_renderer: TitleRenderer::load(),
        };
        lock(&self.winsys).create_window(parts, fullscreen, res)?;
        self.connection.flush()?;

        let winsys = lock(&self.winsys);
        let (winsys, wait) = self
            .configured
            .wait_timeout_while(winsys, INITIAL_CONFIGURE_TIMEOUT, |w| {
                w.lifecycle() == Lifecycle::AwaitingInitialConfigure
            })
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() {
            drop(winsys);
            self.destroy_window();
            return Err(BackendError::NoInitialConfigure(INITIAL_CONFIGURE_TIMEOUT));
        }
        tracing::info!(
            width = winsys.size().width,
            height = winsys.size().height,
            scale = winsys.buffer_scale(),
            "window configured"
        );
        drop(winsys);

        self.render = Some(render);
        self.main_surface = Some(surface);
        Ok(())
    }

    pub fn destroy_window(&mut self) {
        lock(&self.winsys).destroy_window();
        self.render = None;
        self.main_surface = None;
        self.flush();
    }

    pub fn set_full_screen(&self, fullscreen: bool, res: &Resolution) -> Result<(), WinSystemError> {
        let result = lock(&self.winsys).set_full_screen(fullscreen, res);
        self.flush();
        result
    }

    pub fn update_resolutions(&self) {
        lock(&self.winsys).update_resolutions();
    }

    pub fn connected_outputs(&self) -> Vec<String> {
        lock(&self.winsys).connected_outputs()
    }

    pub fn set_title(&self, title: &str) {
        lock(&self.winsys).set_title(title);
        self.flush();
    }

    pub fn show_os_mouse(&self, show: bool) {
        lock(&self.winsys).show_os_mouse(show);
    }

    pub fn has_cursor(&self) -> bool {
        lock(&self.winsys).has_cursor()
    }

    /// Returns false without idle-inhibit support
    pub fn inhibit_screensaver(&self, inhibit: bool) -> bool {
        let supported = lock(&self.winsys).inhibit_idle(inhibit);
        self.flush();
        supported
    }

    pub fn has_clipboard(&self) -> bool {
        self.globals.data_device_manager.is_some()
    }

    pub fn register(&self, resource: Arc<dyn DispResource>) {
        lock(&self.winsys).register(resource);
    }

    pub fn unregister(&self, resource: &Arc<dyn DispResource>) {
        lock(&self.winsys).unregister(resource);
    }

    /// Present the next frame, requesting presentation feedback for it
    pub fn swap_buffers(&mut self) {
        let Some(render) = self.render.clone() else {
            return;
        };
        if let (Some(presentation), Some(surface)) = (self.globals.presentation.as_ref(), self.main_surface.as_ref()) {
            self.next_frame += 1;
            let id = self.next_frame;
            // Applies to the commit the swap is about to make
            presentation.feedback(surface, &self.qh, id);
            lock(&self.presentation).submit(id, presentation_clock_now());
        }
        render.swap_buffers();
        self.flush();
    }

    /// Average time from swap to scan-out
    pub fn latency(&self) -> Option<Duration> {
        let mut tracker = lock(&self.presentation);
        tracker.evict_expired(presentation_clock_now());
        tracker.latency()
    }

    pub fn winsys(&self) -> &Arc<Mutex<WinSystem>> {
        &self.winsys
    }

    fn flush(&self) {
        if let Err(e) = self.connection.flush() {
            tracing::warn!(error = %e, "failed to flush requests");
        }
    }
}

impl Drop for WaylandWindowSystem {
    fn drop(&mut self) {
        self.destroy_window();
        if let Some(mut pump) = self.pump.take() {
            pump.stop();
        }
    }
}

/// `CLOCK_MONOTONIC`, the clock compositors announce in `wp_presentation.clock_id`
fn presentation_clock_now() -> Duration {
    let now = rustix::time::clock_gettime(rustix::time::ClockId::Monotonic);
    Duration::new(now.tv_sec as u64, now.tv_nsec as u32)
}
