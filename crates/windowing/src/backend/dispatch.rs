//! Protocol event handlers
//!
//! Every handler locks the shared window system only for as long as it
//! takes to hand over one event.

use std::time::Duration;

use wayland_client::protocol::{
    wl_buffer, wl_compositor, wl_data_device_manager, wl_keyboard, wl_output, wl_pointer, wl_region,
    wl_registry, wl_seat, wl_shell, wl_shell_surface, wl_shm, wl_shm_pool, wl_subcompositor, wl_subsurface,
    wl_surface, wl_touch,
};
use wayland_client::{delegate_noop, Connection, Dispatch, Proxy, QueueHandle, WEnum};
use wayland_protocols::wp::idle_inhibit::zv1::client::{zwp_idle_inhibit_manager_v1, zwp_idle_inhibitor_v1};
use wayland_protocols::wp::presentation_time::client::{wp_presentation, wp_presentation_feedback};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::geometry::PointF;
use crate::output::{Mode, Output, OutputEvent};
use crate::registry::GlobalEntry;
use crate::seat::{Capabilities, KeyboardEvent, KeymapFormat, PointerEvent, RepeatCommand, TouchEvent};
use crate::shell_surface::wl_shell::configure_from_wl_shell;
use crate::shell_surface::ShellEvent;
use crate::winsystem::PointerTarget;

use super::{lock, BackendState, SeatDevices, SurfaceRole};

/// `CLOCK_MONOTONIC`
const CLOCK_MONOTONIC: u32 = 1;

impl BackendState {
    fn bind(&mut self, registry: &wl_registry::WlRegistry, entry: GlobalEntry, qh: &QueueHandle<Self>) {
        let GlobalEntry {
            name,
            interface,
            version,
            ..
        } = entry;
        match interface {
            "wl_compositor" => self.globals.compositor = Some(registry.bind(name, version, qh, ())),
            "wl_shm" => self.globals.shm = Some(registry.bind(name, version, qh, ())),
            "wl_subcompositor" => self.globals.subcompositor = Some(registry.bind(name, version, qh, ())),
            "xdg_wm_base" => self.globals.wm_base = Some(registry.bind(name, version, qh, ())),
            "wl_shell" => self.globals.wl_shell = Some(registry.bind(name, version, qh, ())),
            "wp_presentation" => self.globals.presentation = Some(registry.bind(name, version, qh, ())),
            "zwp_idle_inhibit_manager_v1" => self.globals.idle_inhibit = Some(registry.bind(name, version, qh, ())),
            "wl_data_device_manager" => {
                self.globals.data_device_manager = Some(registry.bind(name, version, qh, ()))
            }
            "wl_seat" => {
                let seat: wl_seat::WlSeat = registry.bind(name, version, qh, name);
                self.devices.insert(name, SeatDevices::new(seat.clone()));
                lock(&self.winsys).add_seat(name, Some(seat));
            }
            "wl_output" => {
                let output: wl_output::WlOutput = registry.bind(name, version, qh, name);
                self.outputs.insert(name, output.clone());
                lock(&self.winsys).add_output(Output::new(name, Some(output)));
            }
            _ => return,
        }
        if let Err(e) = self.registry.mark_bound(name) {
            tracing::warn!(error = %e, "registry out of sync");
        }
    }

    fn remove_global(&mut self, name: u32) {
        let Some(removed) = self.registry.remove(name) else {
            return;
        };
        match removed.interface {
            "wl_seat" => {
                if let Some(devices) = self.devices.remove(&name) {
                    lock(&self.pointers).remove(&name);
                    devices.release();
                }
                lock(&self.winsys).remove_seat(name);
                self.repeat_commands.push((name, RepeatCommand::Stop));
                tracing::info!(name, "seat removed");
            }
            "wl_output" => {
                lock(&self.winsys).remove_output(name);
                if let Some(output) = self.outputs.remove(&name) {
                    if output.version() >= 3 {
                        output.release();
                    }
                }
            }
            interface => tracing::warn!(name, interface, "compositor removed a singleton global"),
        }
    }

    fn shell_event(&mut self, event: ShellEvent) {
        let is_configure = matches!(event, ShellEvent::Configure(_));
        if let Err(e) = lock(&self.winsys).handle_shell_event(event) {
            tracing::warn!(error = %e, "ignoring shell event");
        }
        if is_configure {
            self.configured.notify_all();
        }
    }
}

impl Dispatch<wl_registry::WlRegistry, ()> for BackendState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => match state.registry.announce(name, &interface, version) {
                Ok(Some(entry)) => state.bind(registry, entry, qh),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "unusable global");
                    state.fatal.get_or_insert(e);
                }
            },
            wl_registry::Event::GlobalRemove { name } => state.remove_global(name),
            _ => {}
        }
    }
}

// --- Shell ---

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for BackendState {
    fn event(
        _: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for BackendState {
    fn event(
        state: &mut Self,
        _: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            let configure = state.xdg_configure.surface_configure(serial);
            state.shell_event(ShellEvent::Configure(configure));
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for BackendState {
    fn event(
        state: &mut Self,
        _: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, states } => {
                state.xdg_configure.toplevel_configure(width, height, &states);
            }
            xdg_toplevel::Event::Close => state.shell_event(ShellEvent::Close),
            _ => {}
        }
    }
}

impl Dispatch<wl_shell_surface::WlShellSurface, ()> for BackendState {
    fn event(
        state: &mut Self,
        shell_surface: &wl_shell_surface::WlShellSurface,
        event: wl_shell_surface::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wl_shell_surface::Event::Ping { serial } => shell_surface.pong(serial),
            wl_shell_surface::Event::Configure { width, height, .. } => {
                state.shell_event(ShellEvent::Configure(configure_from_wl_shell(width, height)));
            }
            _ => {}
        }
    }
}

// --- Surfaces and buffers ---

impl Dispatch<wl_surface::WlSurface, SurfaceRole> for BackendState {
    fn event(
        state: &mut Self,
        _: &wl_surface::WlSurface,
        event: wl_surface::Event,
        role: &SurfaceRole,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if *role != SurfaceRole::Main {
            return;
        }
        match event {
            wl_surface::Event::Enter { output } => {
                if let Some(&name) = output.data::<u32>() {
                    lock(&state.winsys).on_surface_enter(name);
                }
            }
            wl_surface::Event::Leave { output } => {
                if let Some(&name) = output.data::<u32>() {
                    lock(&state.winsys).on_surface_leave(name);
                }
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_buffer::WlBuffer, ()> for BackendState {
    fn event(
        state: &mut Self,
        buffer: &wl_buffer::WlBuffer,
        event: wl_buffer::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            let retired = lock(&state.pending_buffers).release(&buffer.id());
            if let Some(retired) = retired {
                retired.destroy();
            }
        }
    }
}

// --- Outputs ---

impl Dispatch<wl_output::WlOutput, u32> for BackendState {
    fn event(
        state: &mut Self,
        _: &wl_output::WlOutput,
        event: wl_output::Event,
        name: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_output::Event::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                make,
                model,
                ..
            } => OutputEvent::Geometry {
                x,
                y,
                physical_width,
                physical_height,
                make,
                model,
            },
            wl_output::Event::Mode {
                flags,
                width,
                height,
                refresh,
            } => {
                let flags = match flags {
                    WEnum::Value(flags) => flags,
                    WEnum::Unknown(_) => wl_output::Mode::empty(),
                };
                OutputEvent::Mode {
                    mode: Mode::new(width, height, refresh),
                    current: flags.contains(wl_output::Mode::Current),
                    preferred: flags.contains(wl_output::Mode::Preferred),
                }
            }
            wl_output::Event::Scale { factor } => OutputEvent::Scale(factor),
            wl_output::Event::Done => OutputEvent::Done,
            _ => return,
        };
        lock(&state.winsys).handle_output_event(*name, event);
    }
}

// --- Seats ---

impl Dispatch<wl_seat::WlSeat, u32> for BackendState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        name: &u32,
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let name = *name;
        match event {
            wl_seat::Event::Capabilities { capabilities } => {
                let announced = match capabilities {
                    WEnum::Value(caps) => Capabilities::from_bits_truncate(caps.bits()),
                    WEnum::Unknown(bits) => Capabilities::from_bits_truncate(bits),
                };
                let diff = lock(&state.winsys).handle_seat_capabilities(name, announced);
                let Some(devices) = state.devices.get_mut(&name) else {
                    return;
                };

                if diff.lost.contains(Capabilities::POINTER) {
                    lock(&state.pointers).remove(&name);
                    devices.release_pointer();
                }
                if diff.lost.contains(Capabilities::KEYBOARD) {
                    devices.release_keyboard();
                    state.repeat_commands.push((name, RepeatCommand::Stop));
                }
                if diff.lost.contains(Capabilities::TOUCH) {
                    devices.release_touch();
                }

                if diff.gained.contains(Capabilities::POINTER) {
                    let pointer = seat.get_pointer(qh, name);
                    lock(&state.pointers).insert(name, pointer.clone());
                    devices.pointer = Some(pointer);
                }
                if diff.gained.contains(Capabilities::KEYBOARD) {
                    devices.keyboard = Some(seat.get_keyboard(qh, name));
                }
                if diff.gained.contains(Capabilities::TOUCH) {
                    devices.touch = Some(seat.get_touch(qh, name));
                }
            }
            wl_seat::Event::Name { name: seat_name } => lock(&state.winsys).set_seat_name(name, seat_name),
            _ => {}
        }
    }
}

impl Dispatch<wl_pointer::WlPointer, u32> for BackendState {
    fn event(
        state: &mut Self,
        _: &wl_pointer::WlPointer,
        event: wl_pointer::Event,
        seat: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let seat = *seat;
        let mut winsys = lock(&state.winsys);
        match event {
            wl_pointer::Event::Enter {
                serial,
                surface,
                surface_x,
                surface_y,
            } => {
                let target = match surface.data::<SurfaceRole>() {
                    Some(SurfaceRole::Main) => PointerTarget::Main,
                    Some(SurfaceRole::Decoration(border)) => PointerTarget::Decoration(*border),
                    _ => return,
                };
                winsys.pointer_enter(seat, target, serial, PointF::new(surface_x, surface_y));
            }
            wl_pointer::Event::Leave { .. } => winsys.handle_pointer(seat, PointerEvent::Leave),
            wl_pointer::Event::Motion {
                surface_x, surface_y, ..
            } => winsys.handle_pointer(
                seat,
                PointerEvent::Motion {
                    x: surface_x,
                    y: surface_y,
                },
            ),
            wl_pointer::Event::Button {
                serial,
                button,
                state: button_state,
                ..
            } => winsys.handle_pointer(
                seat,
                PointerEvent::Button {
                    serial,
                    button,
                    pressed: button_state == WEnum::Value(wl_pointer::ButtonState::Pressed),
                },
            ),
            wl_pointer::Event::Axis { axis, value, .. } => winsys.handle_pointer(seat, axis_event(axis, value)),
            _ => {}
        }
    }
}

/// Scrolling on either axis is one wheel click
fn axis_event(axis: WEnum<wl_pointer::Axis>, value: f64) -> PointerEvent {
    tracing::trace!(?axis, value, "pointer axis");
    PointerEvent::Axis { value }
}

impl Dispatch<wl_keyboard::WlKeyboard, u32> for BackendState {
    fn event(
        state: &mut Self,
        _: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        seat: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let event = match event {
            wl_keyboard::Event::Keymap { format, fd, size } => KeyboardEvent::Keymap {
                format: match format {
                    WEnum::Value(wl_keyboard::KeymapFormat::XkbV1) => KeymapFormat::XkbV1,
                    WEnum::Value(wl_keyboard::KeymapFormat::NoKeymap) => KeymapFormat::NoKeymap,
                    WEnum::Value(other) => KeymapFormat::Unknown(other.into()),
                    WEnum::Unknown(value) => KeymapFormat::Unknown(value),
                },
                fd,
                size,
            },
            wl_keyboard::Event::Enter { .. } => KeyboardEvent::Enter,
            wl_keyboard::Event::Leave { .. } => KeyboardEvent::Leave,
            wl_keyboard::Event::Key {
                key,
                state: key_state,
                ..
            } => KeyboardEvent::Key {
                scancode: key,
                pressed: key_state == WEnum::Value(wl_keyboard::KeyState::Pressed),
            },
            wl_keyboard::Event::Modifiers {
                mods_depressed,
                mods_latched,
                mods_locked,
                group,
                ..
            } => KeyboardEvent::Modifiers {
                depressed: mods_depressed,
                latched: mods_latched,
                locked: mods_locked,
                group,
            },
            wl_keyboard::Event::RepeatInfo { rate, delay } => KeyboardEvent::RepeatInfo { rate, delay },
            _ => return,
        };
        let commands = lock(&state.winsys).handle_keyboard(*seat, event);
        state
            .repeat_commands
            .extend(commands.into_iter().map(|command| (*seat, command)));
    }
}

impl Dispatch<wl_touch::WlTouch, u32> for BackendState {
    fn event(
        state: &mut Self,
        _: &wl_touch::WlTouch,
        event: wl_touch::Event,
        seat: &u32,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        let seat = *seat;
        let mut winsys = lock(&state.winsys);
        match event {
            wl_touch::Event::Down {
                serial,
                surface,
                id,
                x,
                y,
                ..
            } => match surface.data::<SurfaceRole>() {
                Some(SurfaceRole::Main) => winsys.handle_touch(seat, TouchEvent::Down { id, x, y }),
                Some(SurfaceRole::Decoration(border)) => {
                    winsys.decoration_touch_down(seat, serial, *border, PointF::new(x, y))
                }
                _ => {}
            },
            wl_touch::Event::Up { id, .. } => winsys.handle_touch(seat, TouchEvent::Up { id }),
            wl_touch::Event::Motion { id, x, y, .. } => winsys.handle_touch(seat, TouchEvent::Motion { id, x, y }),
            wl_touch::Event::Shape { id, major, minor } => {
                winsys.handle_touch(seat, TouchEvent::Shape { id, major, minor })
            }
            wl_touch::Event::Cancel => winsys.handle_touch(seat, TouchEvent::Cancel),
            _ => {}
        }
    }
}

// --- Presentation time ---

impl Dispatch<wp_presentation::WpPresentation, ()> for BackendState {
    fn event(
        _: &mut Self,
        _: &wp_presentation::WpPresentation,
        event: wp_presentation::Event,
        _: &(),
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wp_presentation::Event::ClockId { clk_id } = event {
            if clk_id != CLOCK_MONOTONIC {
                tracing::warn!(clk_id, "presentation clock is not CLOCK_MONOTONIC, latency will be off");
            }
        }
    }
}

impl Dispatch<wp_presentation_feedback::WpPresentationFeedback, u64> for BackendState {
    fn event(
        state: &mut Self,
        _: &wp_presentation_feedback::WpPresentationFeedback,
        event: wp_presentation_feedback::Event,
        id: &u64,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        match event {
            wp_presentation_feedback::Event::Presented {
                tv_sec_hi,
                tv_sec_lo,
                tv_nsec,
                ..
            } => {
                let secs = (u64::from(tv_sec_hi) << 32) | u64::from(tv_sec_lo);
                let presented_at = Duration::new(secs, tv_nsec);
                if let Some(latency) = lock(&state.presentation).presented(*id, presented_at) {
                    tracing::trace!(id, ?latency, "frame presented");
                }
            }
            wp_presentation_feedback::Event::Discarded => {
                lock(&state.presentation).discarded(*id);
            }
            _ => {}
        }
    }
}

delegate_noop!(BackendState: ignore wl_compositor::WlCompositor);
delegate_noop!(BackendState: ignore wl_shm::WlShm);
delegate_noop!(BackendState: ignore wl_shm_pool::WlShmPool);
delegate_noop!(BackendState: ignore wl_subcompositor::WlSubcompositor);
delegate_noop!(BackendState: ignore wl_subsurface::WlSubsurface);
delegate_noop!(BackendState: ignore wl_region::WlRegion);
delegate_noop!(BackendState: ignore wl_shell::WlShell);
delegate_noop!(BackendState: ignore wl_data_device_manager::WlDataDeviceManager);
delegate_noop!(BackendState: ignore zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1);
delegate_noop!(BackendState: ignore zwp_idle_inhibitor_v1::ZwpIdleInhibitorV1);
