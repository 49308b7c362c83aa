//! Output (monitor) tracking
//!
//! `wl_output` delivers its state as a burst of geometry/mode/scale events
//! terminated by `done`. An [`Output`] accumulates the burst; the
//! [`OutputRegistry`] keeps outputs out of sight until their first `done`
//! and reports every later `done` as an update so dependent values (buffer
//! scale, resolution list) can be recomputed.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use wayland_client::protocol::wl_output::WlOutput;

use crate::geometry::{Point, Size};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("output {0} has not announced a qualifying mode yet")]
    NoModeSet(u32),
}

/// Display mode; ordered by width, then height, then refresh rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mode {
    pub width: i32,
    pub height: i32,
    pub refresh_mhz: i32,
}

impl Mode {
    pub const fn new(width: i32, height: i32, refresh_mhz: i32) -> Self {
        Self {
            width,
            height,
            refresh_mhz,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn refresh_hz(&self) -> f32 {
        self.refresh_mhz as f32 / 1000.0
    }
}

/// Protocol-independent form of the `wl_output` events
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    Geometry {
        x: i32,
        y: i32,
        physical_width: i32,
        physical_height: i32,
        make: String,
        model: String,
    },
    Mode {
        mode: Mode,
        current: bool,
        preferred: bool,
    },
    Scale(i32),
    Done,
}

pub const FALLBACK_DPI: f32 = 96.0;

const MM_PER_INCH: f32 = 25.4;

#[derive(Debug, Clone)]
pub struct Output {
    global_name: u32,
    proxy: Option<WlOutput>,
    position: Point,
    physical_size: Size,
    make: String,
    model: String,
    scale: i32,
    modes: BTreeSet<Mode>,
    current_mode: Option<Mode>,
    preferred_mode: Option<Mode>,
}

impl Output {
    /// `proxy` is `None` for outputs that exist only in tests
    pub fn new(global_name: u32, proxy: Option<WlOutput>) -> Self {
        Self {
            global_name,
            proxy,
            position: Point::default(),
            physical_size: Size::default(),
            make: String::new(),
            model: String::new(),
            scale: 1,
            modes: BTreeSet::new(),
            current_mode: None,
            preferred_mode: None,
        }
    }

    /// Apply one event; returns true when the burst is complete
    pub fn handle(&mut self, event: OutputEvent) -> bool {
        match event {
            OutputEvent::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                make,
                model,
            } => {
                self.position = Point::new(x, y);
                self.physical_size = Size::new(physical_width, physical_height);
                self.make = make;
                self.model = model;
                false
            }
            OutputEvent::Mode {
                mode,
                current,
                preferred,
            } => {
                self.modes.insert(mode);
                // The last mode flagged current (or preferred) wins
                if current {
                    self.current_mode = Some(mode);
                }
                if preferred {
                    self.preferred_mode = Some(mode);
                }
                false
            }
            OutputEvent::Scale(scale) => {
                self.scale = scale.max(1);
                false
            }
            OutputEvent::Done => true,
        }
    }

    pub fn global_name(&self) -> u32 {
        self.global_name
    }

    pub fn proxy(&self) -> Option<&WlOutput> {
        self.proxy.as_ref()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Physical size in millimeters, 0 when unknown
    pub fn physical_size(&self) -> Size {
        self.physical_size
    }

    pub fn make(&self) -> &str {
        &self.make
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub fn modes(&self) -> impl Iterator<Item = &Mode> {
        self.modes.iter()
    }

    pub fn current_mode(&self) -> Result<Mode, OutputError> {
        self.current_mode
            .ok_or(OutputError::NoModeSet(self.global_name))
    }

    pub fn preferred_mode(&self) -> Result<Mode, OutputError> {
        self.preferred_mode
            .ok_or(OutputError::NoModeSet(self.global_name))
    }

    /// Pixel aspect ratio of `mode` on this output's physical panel
    pub fn pixel_ratio_for_mode(&self, mode: &Mode) -> f32 {
        let Size {
            width: pw,
            height: ph,
        } = self.physical_size;
        if pw == 0 || ph == 0 || mode.width == 0 || mode.height == 0 {
            return 1.0;
        }
        (pw as f32 / mode.width as f32) / (ph as f32 / mode.height as f32)
    }

    /// Horizontal DPI of `mode`, [`FALLBACK_DPI`] when the panel size is unknown
    pub fn dpi_for_mode(&self, mode: &Mode) -> f32 {
        if self.physical_size.width <= 0 || mode.width <= 0 {
            return FALLBACK_DPI;
        }
        mode.width as f32 / (self.physical_size.width as f32 / MM_PER_INCH)
    }

    /// Name shown to the user and stored in the monitor setting
    pub fn user_friendly_name(&self) -> String {
        let mut parts: Vec<String> = [&self.make, &self.model]
            .into_iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        if parts.is_empty() {
            parts.push("Unknown".to_string());
        }
        if self.position != Point::default() {
            parts.push(format!("@{}x{}", self.position.x, self.position.y));
        }
        parts.join(" ")
    }
}

/// Result of routing an event through the [`OutputRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputChange {
    /// First `done`: the output just became visible
    Added(u32),
    /// A later `done` on an already visible output
    Updated(u32),
}

/// All outputs, split by whether they have completed their first burst
#[derive(Debug, Default)]
pub struct OutputRegistry {
    in_preparation: HashMap<u32, Output>,
    ready: HashMap<u32, Output>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, output: Output) {
        tracing::debug!(name = output.global_name(), "output announced");
        self.in_preparation.insert(output.global_name(), output);
    }

    pub fn handle_event(&mut self, name: u32, event: OutputEvent) -> Option<OutputChange> {
        if let Some(output) = self.ready.get_mut(&name) {
            return output.handle(event).then_some(OutputChange::Updated(name));
        }

        let output = self.in_preparation.get_mut(&name)?;
        if !output.handle(event) {
            return None;
        }

        let output = self.in_preparation.remove(&name)?;
        tracing::info!(
            name,
            output = %output.user_friendly_name(),
            scale = output.scale(),
            "output ready"
        );
        self.ready.insert(name, output);
        Some(OutputChange::Added(name))
    }

    /// Forget an output; returns it if it had been visible
    pub fn remove(&mut self, name: u32) -> Option<Output> {
        self.in_preparation.remove(&name);
        self.ready.remove(&name)
    }

    pub fn get(&self, name: u32) -> Option<&Output> {
        self.ready.get(&name)
    }

    /// Look up a visible output by its `wl_output` proxy
    pub fn find_by_proxy(&self, proxy: &WlOutput) -> Option<&Output> {
        self.ready.values().find(|o| o.proxy() == Some(proxy))
    }

    pub fn find_by_user_friendly_name(&self, name: &str) -> Option<&Output> {
        self.ready.values().find(|o| o.user_friendly_name() == name)
    }

    /// User-friendly names of all visible outputs, sorted by global name
    pub fn connected_outputs(&self) -> Vec<String> {
        let mut outputs: Vec<&Output> = self.ready.values().collect();
        outputs.sort_by_key(|o| o.global_name());
        outputs.iter().map(|o| o.user_friendly_name()).collect()
    }

    /// Visible outputs ordered by global name
    pub fn ready(&self) -> Vec<&Output> {
        let mut outputs: Vec<&Output> = self.ready.values().collect();
        outputs.sort_by_key(|o| o.global_name());
        outputs
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }
}
