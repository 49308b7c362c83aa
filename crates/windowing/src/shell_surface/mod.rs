//! Shell surface abstraction
//!
//! The main window surface gets its toplevel role from either `xdg_wm_base`
//! or the legacy `wl_shell`. Both are driven through [`ShellSurface`]; the
//! legacy protocol simply cannot do some of it (see
//! [`ShellSurface::capabilities`]).
//!
//! Configure events are not delivered through the trait. The protocol glue
//! turns them into [`ShellConfigure`] values and hands them to the window
//! system, which answers with [`ShellSurface::ack_configure`].

pub mod wl_shell;
pub mod xdg;

use bitflags::bitflags;
use wayland_client::protocol::wl_seat::WlSeat;

use crate::geometry::{Point, Size};
use crate::output::Output;

pub use wl_shell::WlShellSurface;
pub use xdg::{XdgConfigureAccumulator, XdgShellSurface};

bitflags! {
    /// Toplevel state as reported by the compositor
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ShellState: u8 {
        const MAXIMIZED = 1 << 0;
        const FULLSCREEN = 1 << 1;
        const RESIZING = 1 << 2;
        const ACTIVATED = 1 << 3;
    }
}

bitflags! {
    /// Optional operations a shell protocol actually implements
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ShellCapabilities: u8 {
        const MINIMIZE = 1 << 0;
        const MAXIMIZE = 1 << 1;
        const MOVE = 1 << 2;
        const RESIZE = 1 << 3;
        const WINDOW_MENU = 1 << 4;
        /// Configure events carry serials and states
        const CONFIGURE_STATES = 1 << 5;
    }
}

/// One configure transaction
///
/// `size` includes decorations; a zero dimension means the compositor has
/// no preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellConfigure {
    pub serial: u32,
    pub size: Size,
    pub state: ShellState,
}

/// Edge or corner grabbed for an interactive resize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResizeEdge {
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// What a shell surface reports to the window system
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellEvent {
    Configure(ShellConfigure),
    Close,
}

/// Seat identity passed to interactive requests
#[derive(Debug, Clone, PartialEq)]
pub struct SeatRef {
    pub global_name: u32,
    pub proxy: Option<WlSeat>,
}

/// Which shell protocol backs the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Xdg,
    WlShell,
}

pub trait ShellSurface: Send {
    fn kind(&self) -> ShellKind;

    fn capabilities(&self) -> ShellCapabilities;

    /// Make the role effective; the caller round-trips afterwards so the
    /// initial configure arrives before rendering starts
    fn initialize(&mut self);

    /// `output` is a hint, the compositor may pick another one
    fn set_full_screen(&mut self, output: Option<&Output>, refresh_hz: f32);

    fn set_windowed(&mut self);

    fn set_maximized(&mut self);

    fn unset_maximized(&mut self);

    fn set_minimized(&mut self);

    fn start_move(&mut self, seat: &SeatRef, serial: u32);

    fn start_resize(&mut self, seat: &SeatRef, serial: u32, edge: ResizeEdge);

    /// `position` is relative to the main surface origin
    fn show_context_menu(&mut self, seat: &SeatRef, serial: u32, position: Point);

    fn ack_configure(&mut self, serial: u32);
}
