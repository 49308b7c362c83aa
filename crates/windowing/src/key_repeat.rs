//! Software key repeat on the event-pump loop
//!
//! Compositors only report repeat parameters; the client generates the
//! repeated events. One timer per seat is registered with the pump's
//! calloop loop, so it fires on the same thread that processes keyboard
//! events and can never race with a modifier or keymap change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};

use crate::input_event::{InputSink, KeyEvent};
use crate::seat::{repeat_events, RepeatCommand};

pub struct KeyRepeat<Data: 'static> {
    handle: LoopHandle<'static, Data>,
    sink: Arc<dyn InputSink>,
    timers: HashMap<u32, RegistrationToken>,
}

impl<Data: 'static> KeyRepeat<Data> {
    pub fn new(handle: LoopHandle<'static, Data>, sink: Arc<dyn InputSink>) -> Self {
        Self {
            handle,
            sink,
            timers: HashMap::new(),
        }
    }

    pub fn apply(&mut self, seat: u32, command: RepeatCommand) {
        match command {
            RepeatCommand::Start {
                delay,
                interval,
                event,
            } => self.start(seat, delay, interval, event),
            RepeatCommand::Stop => self.stop(seat),
        }
    }

    /// Replace any running timer for `seat` with a new one
    pub fn start(&mut self, seat: u32, delay: Duration, interval: Duration, event: KeyEvent) {
        self.stop(seat);

        let sink = self.sink.clone();
        let timer = Timer::from_duration(delay);
        match self.handle.insert_source(timer, move |_, _, _| {
            for repeated in repeat_events(event) {
                sink.push(repeated);
            }
            TimeoutAction::ToDuration(interval)
        }) {
            Ok(token) => {
                self.timers.insert(seat, token);
            }
            Err(e) => {
                tracing::warn!(seat, error = %e, "failed to arm key repeat timer");
            }
        }
    }

    /// Remove the timer for `seat`; no repeat fires after this returns
    pub fn stop(&mut self, seat: u32) {
        if let Some(token) = self.timers.remove(&seat) {
            self.handle.remove(token);
        }
    }

    pub fn is_running(&self, seat: u32) -> bool {
        self.timers.contains_key(&seat)
    }

    pub fn stop_all(&mut self) {
        for (_, token) in self.timers.drain() {
            self.handle.remove(token);
        }
    }
}
