//! Wayland windowing backend for a media-center application
//!
//! The protocol-independent core ([`winsystem`], [`seat`], [`decorator`],
//! [`output`], ...) is exposed for testing; [`backend`] binds it to a live
//! compositor.

pub mod backend;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod decorator;
pub mod event_pump;
pub mod geometry;
pub mod input_event;
pub mod key_repeat;
pub mod keymap;
pub mod output;
pub mod registry;
pub mod seat;
pub mod shell_surface;
pub mod winsystem;

pub use backend::{BackendError, RenderTarget, WaylandWindowSystem};
pub use config::Config;
