//! Legacy `wl_shell` shell surface
//!
//! Only fullscreen/windowed switching and interactive move are available.
//! Configures carry no serial and no state, so acknowledging is a no-op.

use wayland_client::protocol::wl_shell::WlShell;
use wayland_client::protocol::wl_shell_surface::{self, WlShellSurface as WlShellSurfaceProxy};
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Dispatch, QueueHandle};

use crate::geometry::{Point, Size};
use crate::output::Output;

use super::{
    ResizeEdge, SeatRef, ShellCapabilities, ShellConfigure, ShellKind, ShellState, ShellSurface,
};

/// Translate a `wl_shell_surface.configure` into a transaction with serial 0
pub fn configure_from_wl_shell(width: i32, height: i32) -> ShellConfigure {
    ShellConfigure {
        serial: 0,
        size: Size::new(width, height),
        state: ShellState::empty(),
    }
}

/// Refresh rate in mHz as `set_fullscreen` expects it
pub fn framerate_mhz(refresh_hz: f32) -> u32 {
    (refresh_hz * 1000.0).round().max(0.0) as u32
}

pub struct WlShellSurface {
    shell_surface: WlShellSurfaceProxy,
}

impl WlShellSurface {
    pub fn new<D>(
        shell: &WlShell,
        surface: &WlSurface,
        title: &str,
        class: &str,
        qh: &QueueHandle<D>,
    ) -> Self
    where
        D: Dispatch<WlShellSurfaceProxy, ()> + 'static,
    {
        let shell_surface = shell.get_shell_surface(surface, qh, ());
        shell_surface.set_class(class.to_string());
        shell_surface.set_title(title.to_string());
        Self { shell_surface }
    }
}

impl ShellSurface for WlShellSurface {
    fn kind(&self) -> ShellKind {
        ShellKind::WlShell
    }

    fn capabilities(&self) -> ShellCapabilities {
        ShellCapabilities::MOVE
    }

    fn initialize(&mut self) {}

    fn set_full_screen(&mut self, output: Option<&Output>, refresh_hz: f32) {
        self.shell_surface.set_fullscreen(
            wl_shell_surface::FullscreenMethod::Driver,
            framerate_mhz(refresh_hz),
            output.and_then(|o| o.proxy()),
        );
    }

    fn set_windowed(&mut self) {
        self.shell_surface.set_toplevel();
    }

    fn set_maximized(&mut self) {}

    fn unset_maximized(&mut self) {}

    fn set_minimized(&mut self) {}

    fn start_move(&mut self, seat: &SeatRef, serial: u32) {
        if let Some(proxy) = seat.proxy.as_ref() {
            self.shell_surface._move(proxy, serial);
        }
    }

    fn start_resize(&mut self, _seat: &SeatRef, _serial: u32, _edge: ResizeEdge) {}

    fn show_context_menu(&mut self, _seat: &SeatRef, _serial: u32, _position: Point) {}

    fn ack_configure(&mut self, _serial: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_has_no_serial_or_state() {
        let configure = configure_from_wl_shell(1024, 768);
        assert_eq!(configure.serial, 0);
        assert_eq!(configure.size, Size::new(1024, 768));
        assert!(configure.state.is_empty());
    }

    #[test]
    fn framerate_rounds_to_millihertz() {
        assert_eq!(framerate_mhz(59.94), 59940);
        assert_eq!(framerate_mhz(60.0), 60000);
        assert_eq!(framerate_mhz(0.0), 0);
    }
}
