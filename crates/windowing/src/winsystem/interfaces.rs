//! Collaborators of the window system
//!
//! The application side (rendering, resolution bookkeeping, settings,
//! display-resource observers) and the protocol side (main surface, cursor)
//! are both reached through these traits so the orchestration logic can run
//! against test doubles.

use crate::geometry::Size;

/// The render layer drawing into the main surface
///
/// Shared between the window system, which resizes it, and the render
/// thread, which swaps it; implementations synchronize internally.
pub trait RenderContext: Send + Sync {
    /// Resize the drawable to `size` buffer pixels
    fn resize(&self, size: Size);

    /// Size of the currently attached buffers in buffer pixels
    fn attached_size(&self) -> Size;

    fn swap_buffers(&self);

    fn set_vsync(&self, enabled: bool);
}

/// One entry of the application's resolution list
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Buffer pixels
    pub width: i32,
    pub height: i32,
    pub screen_width: i32,
    pub screen_height: i32,
    /// Subtitle baseline
    pub subtitles: i32,
    pub pixel_ratio: f32,
    /// Hz
    pub refresh_rate: f32,
    /// User-friendly output name
    pub output: String,
    pub fullscreen: bool,
}

impl Resolution {
    pub fn new(size: Size, refresh_rate: f32, output: &str) -> Self {
        let mut res = Self {
            width: 0,
            height: 0,
            screen_width: 0,
            screen_height: 0,
            subtitles: 0,
            pixel_ratio: 1.0,
            refresh_rate,
            output: output.to_string(),
            fullscreen: true,
        };
        res.set_size(size);
        res
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Set all size-derived fields
    pub fn set_size(&mut self, size: Size) {
        self.width = size.width;
        self.height = size.height;
        self.screen_width = size.width;
        self.screen_height = size.height;
        self.subtitles = (0.965 * size.height as f64) as i32;
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(Size::default(), 0.0, "")
    }
}

/// The application's list of selectable resolutions
///
/// Implementations must not call back into the window system from inside
/// these methods; they run with window-system state locked.
pub trait ResolutionList: Send {
    fn clear_custom(&mut self);

    fn add(&mut self, res: Resolution);

    fn desktop(&self) -> Option<Resolution>;

    fn set_desktop(&mut self, res: Resolution);

    fn current(&self) -> Option<Resolution>;

    fn set_current(&mut self, res: Resolution);

    fn apply_calibrations(&mut self);

    /// Index of the resolution currently in use
    fn video_resolution(&self) -> usize;

    /// Switch to resolution `index`; `force` re-applies an unchanged index
    fn set_video_resolution(&mut self, index: usize, force: bool);
}

/// Persistent settings consumed by the window system
pub trait SettingsStore: Send {
    /// User-friendly name of the output to use for fullscreen
    fn monitor(&self) -> String;

    /// Last windowed content size
    fn windowed_size(&self) -> Option<Size>;

    fn set_windowed_size(&mut self, size: Size);
}

/// Observer of display-level changes
pub trait DispResource: Send + Sync {
    fn on_app_focus_change(&self, focused: bool) {
        let _ = focused;
    }

    /// The render buffers are about to be recreated
    fn on_lost_display(&self) {}

    /// The render buffers were recreated
    fn on_reset_display(&self) {}
}

/// Requests on the main `wl_surface`
pub trait WindowSurface: Send {
    fn set_buffer_scale(&mut self, scale: i32);

    /// Mark `size` (surface coordinates) opaque from the origin
    fn set_opaque_region(&mut self, size: Size);

    /// Returns false when the compositor cannot inhibit idling
    fn inhibit_idle(&mut self, inhibit: bool) -> bool;
}

/// The OS cursor shown over our surfaces
pub trait CursorControl: Send {
    /// Load cursor images for a new buffer scale
    fn set_theme_scale(&mut self, scale: i32);

    /// Show the named cursor for `seat`, or hide it with `None`
    fn set_cursor(&mut self, seat: u32, serial: u32, name: Option<&'static str>);
}
