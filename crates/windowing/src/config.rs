//! Runtime configuration

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Windowing backend configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub keyboard: KeyboardConfig,
    pub decorations: DecorationConfig,
    pub presentation: PresentationConfig,
    pub cursor: CursorConfig,
}

/// Main window configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title shown by the compositor and in the title bar
    pub title: String,

    /// Application id (xdg_toplevel.set_app_id / wl_shell_surface.set_class)
    pub app_id: String,

    /// Initial windowed width (surface coordinates)
    pub width: i32,

    /// Initial windowed height (surface coordinates)
    pub height: i32,

    /// Request fullscreen on startup
    pub fullscreen: bool,

    /// Preferred monitor by user-friendly name ("make model" or "make model@XxY").
    /// Empty means the output the window ends up on.
    pub monitor: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Media Center".to_string(),
            app_id: "mediawin".to_string(),
            width: 1280,
            height: 720,
            fullscreen: false,
            monitor: String::new(),
        }
    }
}

/// Keyboard configuration
///
/// Compositors normally announce their repeat settings with `repeat_info`;
/// these values apply until they do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    /// Key repeat delay (ms)
    pub repeat_delay: u32,

    /// Key repeat rate (keys per second, 0 = no repeat)
    pub repeat_rate: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            repeat_delay: 1000,
            repeat_rate: 20,
        }
    }
}

/// Client-side decoration metrics (surface coordinates) and colors (ARGB8888)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecorationConfig {
    pub border_width: i32,
    pub top_bar_height: i32,

    /// How far from a corner a resize still grabs both edges
    pub resize_corner_distance: i32,

    /// Distance of the button row from the right and top border
    pub buttons_edge_distance: i32,

    /// Padding inside a button before the symbol is drawn
    pub button_inner_separation: i32,

    pub button_size: i32,

    pub border_color: u32,
    pub button_color_active: u32,
    pub button_color_inactive: u32,
}

impl Default for DecorationConfig {
    fn default() -> Self {
        Self {
            border_width: 5,
            top_bar_height: 33,
            resize_corner_distance: 5,
            buttons_edge_distance: 6,
            button_inner_separation: 4,
            button_size: 21,
            border_color: 0xFF00_0000,
            button_color_active: 0xFFFF_FFFF,
            button_color_inactive: 0xFF77_7777,
        }
    }
}

/// Presentation feedback bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Number of presented frames averaged for the latency estimate
    pub latency_window: usize,

    /// Maximum outstanding feedback objects before the oldest is evicted
    pub max_pending: usize,

    /// Outstanding feedback older than this is evicted (ms)
    pub pending_timeout_ms: u64,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            latency_window: 30,
            max_pending: 16,
            pending_timeout_ms: 1000,
        }
    }
}

/// Cursor theme used for the OS pointer and the decorations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Theme name, "default" lets wayland-cursor pick XCURSOR_THEME
    pub theme: String,

    /// Base cursor size in surface coordinates, multiplied by the buffer scale
    pub size: u32,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            theme: "default".to_string(),
            size: 16,
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("mediawin/config.toml")),
            Some(std::path::PathBuf::from("/etc/mediawin/config.toml")),
        ];

        for path in config_paths.into_iter().flatten() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(content) => match Self::from_toml_str(&content) {
                        Ok(config) => {
                            tracing::info!(?path, monitor = %config.window.monitor, "loaded configuration");
                            return config;
                        }
                        Err(e) => {
                            tracing::warn!(?path, error = %e, "failed to parse config");
                        }
                    },
                    Err(e) => {
                        tracing::warn!(?path, error = %e, "failed to read config");
                    }
                }
            }
        }

        tracing::info!("using default configuration");
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.decorations;
        if d.border_width < 0
            || d.top_bar_height < 0
            || d.button_size < 0
            || d.resize_corner_distance < 0
            || d.buttons_edge_distance < 0
            || d.button_inner_separation < 0
        {
            return Err(ConfigError::Invalid(
                "decoration metrics must not be negative".to_string(),
            ));
        }
        if d.border_width == 0 {
            return Err(ConfigError::Invalid(
                "decorations.border_width must be at least 1".to_string(),
            ));
        }
        if d.button_size + 2 * d.buttons_edge_distance > d.top_bar_height {
            return Err(ConfigError::Invalid(format!(
                "buttons of size {} do not fit a top bar of height {}",
                d.button_size, d.top_bar_height
            )));
        }
        if 2 * d.button_inner_separation >= d.button_size {
            return Err(ConfigError::Invalid(
                "decorations.button_inner_separation leaves no room for the symbol".to_string(),
            ));
        }
        if self.window.width < 0 || self.window.height < 0 {
            return Err(ConfigError::Invalid(format!(
                "negative window size {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.presentation.latency_window == 0 {
            return Err(ConfigError::Invalid(
                "presentation.latency_window must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Helper for getting XDG directories
mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }
}
