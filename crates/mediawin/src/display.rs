//! Application-side collaborators of the window system

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use windowing::config::Config;
use windowing::geometry::Size;
use windowing::winsystem::{DispResource, Resolution, ResolutionList, SettingsStore};

/// Resolutions known to the application
#[derive(Debug, Default)]
pub struct ResolutionTable {
    pub desktop: Option<Resolution>,
    pub current: Option<Resolution>,
    pub custom: Vec<Resolution>,
    pub video_resolution: usize,
}

/// [`ResolutionList`] the application can read back
#[derive(Debug, Clone, Default)]
pub struct SharedResolutions(Arc<Mutex<ResolutionTable>>);

impl SharedResolutions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self) -> MutexGuard<'_, ResolutionTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResolutionList for SharedResolutions {
    fn clear_custom(&mut self) {
        self.table().custom.clear();
    }

    fn add(&mut self, res: Resolution) {
        self.table().custom.push(res);
    }

    fn desktop(&self) -> Option<Resolution> {
        self.table().desktop.clone()
    }

    fn set_desktop(&mut self, res: Resolution) {
        self.table().desktop = Some(res);
    }

    fn current(&self) -> Option<Resolution> {
        self.table().current.clone()
    }

    fn set_current(&mut self, res: Resolution) {
        self.table().current = Some(res);
    }

    fn apply_calibrations(&mut self) {
        // Overscan and subtitle positions are left at their defaults
        let table = self.table();
        tracing::trace!(custom = table.custom.len(), "resolution list updated");
    }

    fn video_resolution(&self) -> usize {
        self.table().video_resolution
    }

    fn set_video_resolution(&mut self, index: usize, force: bool) {
        tracing::debug!(index, force, "video resolution");
        self.table().video_resolution = index;
    }
}

/// Settings for the lifetime of the process
pub struct SessionSettings {
    monitor: String,
    windowed_size: Option<Size>,
}

impl SessionSettings {
    pub fn new(config: &Config) -> Self {
        Self {
            monitor: config.window.monitor.clone(),
            windowed_size: None,
        }
    }
}

impl SettingsStore for SessionSettings {
    fn monitor(&self) -> String {
        self.monitor.clone()
    }

    fn windowed_size(&self) -> Option<Size> {
        self.windowed_size
    }

    fn set_windowed_size(&mut self, size: Size) {
        self.windowed_size = Some(size);
    }
}

/// Logs display-level notifications
pub struct DisplayLog;

impl DispResource for DisplayLog {
    fn on_app_focus_change(&self, focused: bool) {
        tracing::debug!(focused, "application focus");
    }

    fn on_lost_display(&self) {
        tracing::info!("display lost, render buffers being recreated");
    }

    fn on_reset_display(&self) {
        tracing::info!("display reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolutions_readable_after_handing_out_clone() {
        let shared = SharedResolutions::new();
        let mut list: Box<dyn ResolutionList> = Box::new(shared.clone());

        list.set_desktop(Resolution::new(Size::new(1920, 1080), 60.0, "Dell U2415"));
        list.add(Resolution::new(Size::new(1280, 720), 60.0, "Dell U2415"));
        list.clear_custom();
        list.add(Resolution::new(Size::new(1024, 768), 60.0, "Dell U2415"));

        let table = shared.table();
        assert_eq!(table.desktop.as_ref().map(Resolution::size), Some(Size::new(1920, 1080)));
        assert_eq!(table.custom.len(), 1);
        assert_eq!(table.custom[0].size(), Size::new(1024, 768));
    }

    #[test]
    fn settings_take_monitor_from_config() {
        let mut config = Config::default();
        config.window.monitor = "Dell U2415".to_string();
        let mut settings = SessionSettings::new(&config);

        assert_eq!(settings.monitor(), "Dell U2415");
        assert_eq!(settings.windowed_size(), None);
        settings.set_windowed_size(Size::new(800, 600));
        assert_eq!(settings.windowed_size(), Some(Size::new(800, 600)));
    }
}
