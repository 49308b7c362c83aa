//! OS cursor for the main window and the decorations
//!
//! The theme is loaded lazily at `base size * buffer scale` and dropped on
//! scale changes so the next cursor request reloads it. A theme or cursor
//! that cannot be loaded leaves the pointer without an OS cursor.

use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_pointer::WlPointer;
use wayland_client::protocol::wl_shm::WlShm;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, Proxy, QueueHandle};
use wayland_cursor::CursorTheme;

use crate::backend::SurfaceRole;
use crate::config::CursorConfig;

/// Pixel size to load the theme at
pub fn theme_size(base_size: u32, scale: i32) -> u32 {
    base_size * scale.max(1) as u32
}

/// Hotspot in surface coordinates for an image loaded at `scale`
pub fn surface_hotspot(hotspot: (u32, u32), scale: i32) -> (i32, i32) {
    let scale = scale.max(1);
    (hotspot.0 as i32 / scale, hotspot.1 as i32 / scale)
}

pub struct CursorManager {
    connection: Connection,
    shm: WlShm,
    surface: WlSurface,
    theme_name: String,
    base_size: u32,
    scale: i32,
    theme: Option<CursorTheme>,
    /// Set after a failed load so the warning is logged once per scale
    load_failed: bool,
}

impl CursorManager {
    pub fn new<D>(
        connection: &Connection,
        compositor: &WlCompositor,
        shm: &WlShm,
        config: &CursorConfig,
        qh: &QueueHandle<D>,
    ) -> Self
    where
        D: Dispatch<WlSurface, SurfaceRole> + 'static,
    {
        Self {
            connection: connection.clone(),
            shm: shm.clone(),
            surface: compositor.create_surface(qh, SurfaceRole::Cursor),
            theme_name: config.theme.clone(),
            base_size: config.size,
            scale: 1,
            theme: None,
            load_failed: false,
        }
    }

    pub fn surface(&self) -> &WlSurface {
        &self.surface
    }

    /// Drop the loaded theme; the next request loads it for `scale`
    pub fn set_scale(&mut self, scale: i32) {
        if scale == self.scale {
            return;
        }
        tracing::debug!(scale, "reloading cursor theme for new scale");
        self.scale = scale;
        self.theme = None;
        self.load_failed = false;
    }

    pub fn hide(&self, pointer: &WlPointer, serial: u32) {
        pointer.set_cursor(serial, None, 0, 0);
    }

    /// Show the named cursor, or none at all if it is not available
    pub fn set_named(&mut self, pointer: &WlPointer, serial: u32, name: &str) {
        let scale = self.scale;
        if self.theme.is_none() && !self.load_failed {
            self.load_theme();
        }
        let Some(theme) = self.theme.as_mut() else {
            pointer.set_cursor(serial, None, 0, 0);
            return;
        };
        let Some(cursor) = theme.get_cursor(name) else {
            tracing::warn!(name, "cursor theme has no such cursor");
            pointer.set_cursor(serial, None, 0, 0);
            return;
        };

        let image = &cursor[0];
        let (width, height) = image.dimensions();
        let (hx, hy) = surface_hotspot(image.hotspot(), scale);
        let buffer: &WlBuffer = image;

        pointer.set_cursor(serial, Some(&self.surface), hx, hy);
        if self.surface.version() >= 3 {
            self.surface.set_buffer_scale(scale);
        }
        self.surface.attach(Some(buffer), 0, 0);
        self.surface
            .damage(0, 0, width as i32 / scale.max(1), height as i32 / scale.max(1));
        self.surface.commit();
    }

    fn load_theme(&mut self) {
        let size = theme_size(self.base_size, self.scale);
        match CursorTheme::load_from_name(&self.connection, self.shm.clone(), &self.theme_name, size) {
            Ok(theme) => {
                tracing::debug!(theme = %self.theme_name, size, "loaded cursor theme");
                self.theme = Some(theme);
            }
            Err(e) => {
                tracing::warn!(
                    theme = %self.theme_name,
                    error = %e,
                    "could not load cursor theme, continuing without OS cursor"
                );
                self.load_failed = true;
            }
        }
    }
}

impl Drop for CursorManager {
    fn drop(&mut self) {
        self.surface.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn theme_size_scales_with_buffer() {
        assert_eq!(theme_size(16, 1), 16);
        assert_eq!(theme_size(16, 2), 32);
        assert_eq!(theme_size(24, 0), 24);
    }

    #[test]
    fn hotspot_in_surface_coordinates() {
        assert_eq!(surface_hotspot((8, 6), 1), (8, 6));
        assert_eq!(surface_hotspot((16, 12), 2), (8, 6));
    }
}
