//! Test fixtures for common scenarios

use windowing::geometry::Size;
use windowing::output::{Mode, OutputEvent};

use crate::headless::{HarnessOptions, TestWinSystem};

/// Standard windowed content size
pub const TEST_WIDTH: i32 = 1280;
pub const TEST_HEIGHT: i32 = 720;

/// What an output tells us about itself before its first `done`
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescription {
    pub make: String,
    pub model: String,
    pub position: (i32, i32),
    /// Millimeters
    pub physical_size: (i32, i32),
    /// (mode, current, preferred)
    pub modes: Vec<(Mode, bool, bool)>,
    pub scale: i32,
}

impl OutputDescription {
    pub fn new(make: &str, model: &str) -> Self {
        Self {
            make: make.to_string(),
            model: model.to_string(),
            position: (0, 0),
            physical_size: (0, 0),
            modes: Vec::new(),
            scale: 1,
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = (x, y);
        self
    }

    pub fn physical(mut self, width_mm: i32, height_mm: i32) -> Self {
        self.physical_size = (width_mm, height_mm);
        self
    }

    pub fn mode(mut self, mode: Mode, current: bool, preferred: bool) -> Self {
        self.modes.push((mode, current, preferred));
        self
    }

    pub fn scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    /// Geometry, modes, scale and `done`, in the order compositors send them
    pub fn events(&self) -> Vec<OutputEvent> {
        let mut events = vec![OutputEvent::Geometry {
            x: self.position.0,
            y: self.position.1,
            physical_width: self.physical_size.0,
            physical_height: self.physical_size.1,
            make: self.make.clone(),
            model: self.model.clone(),
        }];
        events.extend(self.modes.iter().map(|&(mode, current, preferred)| OutputEvent::Mode {
            mode,
            current,
            preferred,
        }));
        events.push(OutputEvent::Scale(self.scale));
        events.push(OutputEvent::Done);
        events
    }
}

/// 24" 1080p monitor at the origin, scale 1
pub fn lowdpi_output() -> OutputDescription {
    OutputDescription::new("Dell", "U2415")
        .physical(509, 286)
        .mode(Mode::new(1920, 1080, 60000), true, true)
}

/// 27" 4k monitor right of [`lowdpi_output`], scale 2
pub fn hidpi_output() -> OutputDescription {
    OutputDescription::new("Dell", "P2715Q")
        .at(1920, 0)
        .physical(597, 336)
        .mode(Mode::new(3840, 2160, 60000), true, true)
        .mode(Mode::new(1920, 1080, 60000), false, false)
        .scale(2)
}

/// Both monitors side by side
pub fn dual_outputs() -> Vec<OutputDescription> {
    vec![lowdpi_output(), hidpi_output()]
}

/// A configured window on the low-dpi output
pub fn windowed() -> TestWinSystem {
    TestWinSystem::windowed(
        HarnessOptions::default(),
        &[lowdpi_output()],
        Size::new(TEST_WIDTH, TEST_HEIGHT),
    )
}

/// Like [`windowed`] but with client-side decorations
pub fn decorated() -> TestWinSystem {
    TestWinSystem::windowed(
        HarnessOptions {
            decorations: true,
            ..HarnessOptions::default()
        },
        &dual_outputs(),
        Size::new(TEST_WIDTH, TEST_HEIGHT),
    )
}

/// A configured window spanning both outputs
pub fn windowed_on_dual_outputs() -> TestWinSystem {
    TestWinSystem::windowed(
        HarnessOptions::default(),
        &dual_outputs(),
        Size::new(TEST_WIDTH, TEST_HEIGHT),
    )
}
