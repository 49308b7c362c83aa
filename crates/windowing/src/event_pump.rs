//! Dedicated thread dispatching Wayland events
//!
//! The thread owns a calloop loop with the Wayland queue, the key-repeat
//! timers and a ping source used to wake it up for shutdown. Every
//! callback runs sequentially on this thread.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use calloop::ping::{make_ping, Ping, PingSource};
use calloop::EventLoop;
use calloop_wayland_source::WaylandSource;
use wayland_client::{Connection, EventQueue};

use crate::backend::BackendState;
use crate::input_event::InputSink;
use crate::key_repeat::KeyRepeat;

/// Loop data of the pump thread
pub struct PumpData {
    pub state: BackendState,
    pub repeat: KeyRepeat<PumpData>,
}

pub struct EventPump {
    ping: Ping,
    thread: Option<JoinHandle<()>>,
}

impl EventPump {
    pub fn start(
        connection: Connection,
        queue: EventQueue<BackendState>,
        state: BackendState,
        sink: Arc<dyn InputSink>,
    ) -> io::Result<Self> {
        let (ping, ping_source) = make_ping()?;
        let thread = std::thread::Builder::new()
            .name("wayland-events".to_string())
            .spawn(move || run(connection, queue, state, sink, ping_source))?;
        tracing::debug!("event pump started");
        Ok(Self {
            ping,
            thread: Some(thread),
        })
    }

    /// Wake the thread, let it leave its loop and wait for it
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.ping.ping();
        if thread.join().is_err() {
            tracing::error!("event pump thread panicked");
        }
        tracing::debug!("event pump stopped");
    }
}

impl Drop for EventPump {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fatal(what: &str, error: impl std::fmt::Display) -> ! {
    tracing::error!(error = %error, "{what}");
    std::process::exit(1);
}

fn run(
    connection: Connection,
    queue: EventQueue<BackendState>,
    state: BackendState,
    sink: Arc<dyn InputSink>,
    ping_source: PingSource,
) {
    let mut event_loop: EventLoop<'static, PumpData> = match EventLoop::try_new() {
        Ok(event_loop) => event_loop,
        Err(e) => fatal("failed to create event loop", e),
    };
    let handle = event_loop.handle();

    let signal = event_loop.get_signal();
    if let Err(e) = handle.insert_source(ping_source, move |_, _, _| signal.stop()) {
        fatal("failed to insert wake-up source", e);
    }

    let source = WaylandSource::new(connection, queue);
    if let Err(e) = handle.insert_source(source, |_, queue, data: &mut PumpData| {
        queue.dispatch_pending(&mut data.state)
    }) {
        fatal("failed to insert wayland source", e);
    }

    let mut data = PumpData {
        state,
        repeat: KeyRepeat::new(handle, sink),
    };

    let result = event_loop.run(None, &mut data, |data| {
        for (seat, command) in data.state.take_repeat_commands() {
            data.repeat.apply(seat, command);
        }
    });
    if let Err(e) = result {
        fatal("lost connection to the compositor", e);
    }
    data.repeat.stop_all();
}
