//! mediawin - Drive the Wayland window system without a media center
//!
//! Opens a window through the windowing backend, draws a moving bar with a
//! software renderer and logs everything the window system reports.
//!
//! # Keys
//!
//! - `f`: toggle fullscreen on the desktop resolution
//! - `Escape` or closing the window: quit
//!
//! Logging follows `RUST_LOG`; `NO_COLOR` disables ANSI colors.

mod display;
mod renderer;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use windowing::geometry::Size;
use windowing::input_event::{EventQueue, InputEvent, Key, KeyEvent};
use windowing::keymap::XkbKeymapFactory;
use windowing::winsystem::{Collaborators, DispResource, RenderContext, Resolution};
use windowing::{Config, WaylandWindowSystem};

use crate::display::{DisplayLog, SessionSettings, SharedResolutions};
use crate::renderer::ShmRenderer;

const DEFAULT_REFRESH_HZ: f32 = 60.0;
const LATENCY_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> anyhow::Result<()> {
    setup_logging();

    tracing::info!("starting mediawin");

    let config = Config::load();
    let events = Arc::new(EventQueue::new());
    let resolutions = SharedResolutions::new();

    let collaborators = Collaborators {
        resolutions: Box::new(resolutions.clone()),
        settings: Box::new(SessionSettings::new(&config)),
        sink: events.clone(),
        keymap_factory: Arc::new(XkbKeymapFactory::new()),
    };

    let mut system =
        WaylandWindowSystem::connect(config.clone(), collaborators).context("connecting to the Wayland display")?;
    let display_log: Arc<dyn DispResource> = Arc::new(DisplayLog);
    system.register(display_log.clone());

    let outputs = system.connected_outputs();
    tracing::info!(?outputs, "connected outputs");
    system.update_resolutions();

    let desktop = resolutions.table().desktop.clone();
    let windowed = Resolution {
        fullscreen: false,
        ..Resolution::new(
            Size::new(config.window.width, config.window.height),
            DEFAULT_REFRESH_HZ,
            outputs.first().map(String::as_str).unwrap_or_default(),
        )
    };
    let initial = match (&desktop, config.window.fullscreen) {
        (Some(desktop), true) => desktop.clone(),
        _ => windowed.clone(),
    };

    let mut renderer = None;
    system.create_window(initial.fullscreen, &initial, |target| {
        let shm = ShmRenderer::new(target);
        renderer = Some(shm.clone());
        shm as Arc<dyn RenderContext>
    })
    .context("creating the main window")?;
    let renderer = renderer.ok_or_else(|| anyhow::anyhow!("window created without a renderer"))?;

    system.set_title(&config.window.title);
    if !system.inhibit_screensaver(true) {
        tracing::info!("idle inhibition unavailable, screensaver may activate");
    }

    let frame_interval = Duration::from_secs_f32(1.0 / refresh_rate(&initial));
    let mut fullscreen = initial.fullscreen;
    let mut last_latency_log = Instant::now();

    'running: loop {
        let mut quit = false;
        let mut toggle = false;
        events.pump(|event| match event {
            InputEvent::Quit
            | InputEvent::KeyDown(KeyEvent {
                key: Key::Escape, ..
            }) => quit = true,
            InputEvent::KeyDown(KeyEvent {
                key: Key::Char('f'), ..
            }) => toggle = true,
            InputEvent::Resize { width, height } => {
                tracing::info!(width, height, "window resized");
            }
            InputEvent::FocusChange { focused } => {
                tracing::info!(focused, "focus changed");
            }
            other => tracing::trace!(?other, "input"),
        });

        if quit {
            tracing::info!("quit requested");
            break 'running;
        }

        if toggle {
            fullscreen = !fullscreen;
            let target = match (&desktop, fullscreen) {
                (Some(desktop), true) => desktop,
                _ => &windowed,
            };
            if let Err(e) = system.set_full_screen(fullscreen, target) {
                tracing::warn!(error = %e, fullscreen, "could not change window mode");
                fullscreen = !fullscreen;
            }
        }

        system.swap_buffers();

        if renderer.vsync() {
            std::thread::sleep(frame_interval);
        }

        if last_latency_log.elapsed() >= LATENCY_LOG_INTERVAL {
            last_latency_log = Instant::now();
            match system.latency() {
                Some(latency) => tracing::info!(?latency, "presentation latency"),
                None => tracing::debug!("no presentation feedback yet"),
            }
        }
    }

    system.unregister(&display_log);
    system.destroy_window();
    Ok(())
}

fn refresh_rate(res: &Resolution) -> f32 {
    if res.refresh_rate > 0.0 {
        res.refresh_rate
    } else {
        DEFAULT_REFRESH_HZ
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,windowing=debug"));

    // Respect NO_COLOR environment variable for testing
    let use_ansi = std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_ansi(use_ansi),
        )
        .with(filter)
        .init();
}
