//! `xdg_wm_base` shell surface

use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Dispatch, QueueHandle};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::geometry::{Point, Size};
use crate::output::Output;

use super::{
    ResizeEdge, SeatRef, ShellCapabilities, ShellConfigure, ShellKind, ShellState, ShellSurface,
};

/// Collects `xdg_toplevel.configure` until the matching `xdg_surface.configure`
///
/// The toplevel event carries size and states, the surface event carries
/// the serial that makes them one transaction.
#[derive(Debug, Default)]
pub struct XdgConfigureAccumulator {
    size: Size,
    state: ShellState,
}

impl XdgConfigureAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// `states` is the raw `wl_array` of native-endian u32 state values
    pub fn toplevel_configure(&mut self, width: i32, height: i32, states: &[u8]) {
        self.size = Size::new(width, height);
        self.state = ShellState::empty();
        for chunk in states.chunks_exact(4) {
            let value = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            match state_flag(value) {
                Some(flag) => self.state |= flag,
                None => tracing::debug!(value, "ignoring unknown xdg_toplevel state"),
            }
        }
    }

    pub fn surface_configure(&self, serial: u32) -> ShellConfigure {
        ShellConfigure {
            serial,
            size: self.size,
            state: self.state,
        }
    }
}

fn state_flag(value: u32) -> Option<ShellState> {
    match xdg_toplevel::State::try_from(value).ok()? {
        xdg_toplevel::State::Maximized => Some(ShellState::MAXIMIZED),
        xdg_toplevel::State::Fullscreen => Some(ShellState::FULLSCREEN),
        xdg_toplevel::State::Resizing => Some(ShellState::RESIZING),
        xdg_toplevel::State::Activated => Some(ShellState::ACTIVATED),
        _ => None,
    }
}

fn to_xdg_edge(edge: ResizeEdge) -> xdg_toplevel::ResizeEdge {
    match edge {
        ResizeEdge::Top => xdg_toplevel::ResizeEdge::Top,
        ResizeEdge::Bottom => xdg_toplevel::ResizeEdge::Bottom,
        ResizeEdge::Left => xdg_toplevel::ResizeEdge::Left,
        ResizeEdge::Right => xdg_toplevel::ResizeEdge::Right,
        ResizeEdge::TopLeft => xdg_toplevel::ResizeEdge::TopLeft,
        ResizeEdge::TopRight => xdg_toplevel::ResizeEdge::TopRight,
        ResizeEdge::BottomLeft => xdg_toplevel::ResizeEdge::BottomLeft,
        ResizeEdge::BottomRight => xdg_toplevel::ResizeEdge::BottomRight,
    }
}

pub struct XdgShellSurface {
    surface: WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
    /// Output of the last `set_fullscreen`; `Some(None)` means no output hint
    fullscreen_output: Option<Option<u32>>,
}

impl XdgShellSurface {
    pub fn new<D>(
        wm_base: &xdg_wm_base::XdgWmBase,
        surface: &WlSurface,
        title: &str,
        app_id: &str,
        qh: &QueueHandle<D>,
    ) -> Self
    where
        D: Dispatch<xdg_surface::XdgSurface, ()> + Dispatch<xdg_toplevel::XdgToplevel, ()> + 'static,
    {
        let xdg_surface = wm_base.get_xdg_surface(surface, qh, ());
        let toplevel = xdg_surface.get_toplevel(qh, ());
        toplevel.set_app_id(app_id.to_string());
        toplevel.set_title(title.to_string());
        Self {
            surface: surface.clone(),
            xdg_surface,
            toplevel,
            fullscreen_output: None,
        }
    }

    pub fn toplevel(&self) -> &xdg_toplevel::XdgToplevel {
        &self.toplevel
    }

    pub fn xdg_surface(&self) -> &xdg_surface::XdgSurface {
        &self.xdg_surface
    }
}

impl ShellSurface for XdgShellSurface {
    fn kind(&self) -> ShellKind {
        ShellKind::Xdg
    }

    fn capabilities(&self) -> ShellCapabilities {
        ShellCapabilities::all()
    }

    fn initialize(&mut self) {
        // Commit without a buffer to make the role effective
        self.surface.commit();
    }

    fn set_full_screen(&mut self, output: Option<&Output>, _refresh_hz: f32) {
        // Some compositors misbehave when set_fullscreen repeats the same output
        let target = output.map(|o| o.global_name());
        if self.fullscreen_output == Some(target) {
            tracing::debug!(?target, "already fullscreen on requested output");
            return;
        }
        self.toplevel.set_fullscreen(output.and_then(|o| o.proxy()));
        self.fullscreen_output = Some(target);
    }

    fn set_windowed(&mut self) {
        self.fullscreen_output = None;
        self.toplevel.unset_fullscreen();
    }

    fn set_maximized(&mut self) {
        self.toplevel.set_maximized();
    }

    fn unset_maximized(&mut self) {
        self.toplevel.unset_maximized();
    }

    fn set_minimized(&mut self) {
        self.toplevel.set_minimized();
    }

    fn start_move(&mut self, seat: &SeatRef, serial: u32) {
        if let Some(proxy) = seat.proxy.as_ref() {
            self.toplevel._move(proxy, serial);
        }
    }

    fn start_resize(&mut self, seat: &SeatRef, serial: u32, edge: ResizeEdge) {
        if let Some(proxy) = seat.proxy.as_ref() {
            self.toplevel.resize(proxy, serial, to_xdg_edge(edge));
        }
    }

    fn show_context_menu(&mut self, seat: &SeatRef, serial: u32, position: Point) {
        if let Some(proxy) = seat.proxy.as_ref() {
            self.toplevel
                .show_window_menu(proxy, serial, position.x, position.y);
        }
    }

    fn ack_configure(&mut self, serial: u32) {
        self.xdg_surface.ack_configure(serial);
    }
}

impl Drop for XdgShellSurface {
    fn drop(&mut self) {
        // The role object must go before the xdg_surface
        self.toplevel.destroy();
        self.xdg_surface.destroy();
    }
}
