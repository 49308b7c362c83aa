//! Initial, synchronous part of talking to the compositor
//!
//! Connects through `WAYLAND_DISPLAY`, binds the globals we are interested
//! in and waits until at least one output has described itself. After that
//! the queue is handed to the event pump.

use std::sync::{Arc, Mutex};

use thiserror::Error;
use wayland_client::{ConnectError, Connection, DispatchError, EventQueue};

use crate::backend::{lock, BackendState};
use crate::registry::{Registry, RegistryError};
use crate::winsystem::{PresentationTracker, WinSystem, WinSystemError};

/// Round trips spent waiting for outputs to finish describing themselves
pub const OUTPUT_ROUND_TRIPS: u32 = 5;

/// Interfaces either shell can be bound through
const SHELLS: &str = "xdg_wm_base|wl_shell";

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("failed to connect to the compositor: {0}")]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("failed to dispatch events: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("no output finished describing itself after {0} round trips")]
    NoOutputs(u32),

    #[error(transparent)]
    WinSystem(#[from] WinSystemError),
}

/// Declare the globals this backend binds, with supported version ranges
pub fn register_interests(registry: &mut Registry) {
    registry.request_singleton("wl_compositor", 1, 4, true);
    registry.request_singleton("wl_shm", 1, 1, true);
    registry.request_singleton("wl_subcompositor", 1, 1, false);
    registry.request_singleton("xdg_wm_base", 1, 5, false);
    registry.request_singleton("wl_shell", 1, 1, false);
    registry.request_singleton("wp_presentation", 1, 1, false);
    registry.request_singleton("zwp_idle_inhibit_manager_v1", 1, 1, false);
    registry.request_singleton("wl_data_device_manager", 1, 3, false);
    registry.request("wl_seat", 1, 5);
    registry.request("wl_output", 2, 3);
}

/// Fail unless the required globals and one of the shells are bound
pub fn check_globals(registry: &Registry) -> Result<(), RegistryError> {
    registry.check_required()?;
    if !registry.is_bound("xdg_wm_base") && !registry.is_bound("wl_shell") {
        return Err(RegistryError::MissingGlobal(SHELLS.to_string()));
    }
    if !registry.is_bound("xdg_wm_base") {
        tracing::warn!("compositor only offers wl_shell, window management is limited");
    }
    Ok(())
}

/// Log what is lost without each optional global
pub fn warn_missing_optional(registry: &Registry) {
    let optional = [
        ("wl_subcompositor", "no window decorations"),
        ("wp_presentation", "no presentation latency"),
        ("zwp_idle_inhibit_manager_v1", "no screensaver inhibition"),
        ("wl_data_device_manager", "no clipboard"),
    ];
    for (interface, consequence) in optional {
        if !registry.is_bound(interface) {
            tracing::warn!(interface, "optional global missing: {consequence}");
        }
    }
}

/// Everything the event pump takes over after setup
pub struct Established {
    pub connection: Connection,
    pub queue: EventQueue<BackendState>,
    pub state: BackendState,
}

pub fn establish(
    winsys: Arc<Mutex<WinSystem>>,
    presentation: Arc<Mutex<PresentationTracker>>,
) -> Result<Established, ConnectionError> {
    let connection = Connection::connect_to_env()?;
    let mut queue = connection.new_event_queue();
    let qh = queue.handle();
    let _registry = connection.display().get_registry(&qh, ());

    let mut state = BackendState::new(winsys, presentation);
    queue.roundtrip(&mut state)?;
    if let Some(e) = state.fatal.take() {
        return Err(e.into());
    }
    check_globals(&state.registry)?;
    warn_missing_optional(&state.registry);

    // Output and seat descriptions arrive in response to the binds
    let mut round_trips = 0;
    loop {
        queue.roundtrip(&mut state)?;
        round_trips += 1;
        if !lock(&state.winsys).outputs().ready().is_empty() {
            break;
        }
        if round_trips >= OUTPUT_ROUND_TRIPS {
            return Err(ConnectionError::NoOutputs(round_trips));
        }
        tracing::debug!(round_trips, "waiting for outputs");
    }

    lock(&state.winsys).mark_connected()?;
    tracing::info!(
        outputs = lock(&state.winsys).outputs().ready().len(),
        seats = state.devices.len(),
        "connected to compositor"
    );
    Ok(Established {
        connection,
        queue,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bound(registry: &mut Registry, name: u32, interface: &str, version: u32) {
        let entry = registry
            .announce(name, interface, version)
            .unwrap()
            .expect("interface of interest");
        registry.mark_bound(entry.name).unwrap();
    }

    #[test]
    fn versions_follow_interest_ranges() {
        let mut registry = Registry::new();
        register_interests(&mut registry);

        let compositor = registry.announce(1, "wl_compositor", 6).unwrap().unwrap();
        assert_eq!(compositor.version, 4);
        let seat = registry.announce(2, "wl_seat", 9).unwrap().unwrap();
        assert_eq!(seat.version, 5);
        let output = registry.announce(3, "wl_output", 4).unwrap().unwrap();
        assert_eq!(output.version, 3);
        assert!(registry.announce(4, "zwlr_layer_shell_v1", 4).unwrap().is_none());
    }

    #[test]
    fn outputs_below_version_two_are_rejected() {
        let mut registry = Registry::new();
        register_interests(&mut registry);
        assert!(matches!(
            registry.announce(7, "wl_output", 1),
            Err(RegistryError::ProtocolVersion { min: 2, .. })
        ));
    }

    #[test]
    fn either_shell_satisfies_the_check() {
        let mut registry = Registry::new();
        register_interests(&mut registry);
        bound(&mut registry, 1, "wl_compositor", 4);
        bound(&mut registry, 2, "wl_shm", 1);
        assert_eq!(
            check_globals(&registry),
            Err(RegistryError::MissingGlobal(SHELLS.to_string()))
        );

        bound(&mut registry, 3, "wl_shell", 1);
        assert_eq!(check_globals(&registry), Ok(()));
    }

    #[test]
    fn missing_compositor_reported_first() {
        let mut registry = Registry::new();
        register_interests(&mut registry);
        bound(&mut registry, 2, "wl_shm", 1);
        bound(&mut registry, 3, "xdg_wm_base", 5);
        assert_eq!(
            check_globals(&registry),
            Err(RegistryError::MissingGlobal("wl_compositor".to_string()))
        );
    }
}
