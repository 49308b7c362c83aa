//! Configure handling and application-driven resolution switches
//!
//! Every configure is acked exactly once, after the render buffers have
//! been resized to whatever it asked for.

use proptest::prelude::*;
use test_harness::assertions::{assert_acked_once, assert_no_resize, assert_resized_before_ack};
use test_harness::fixtures::{self, lowdpi_output, TEST_HEIGHT, TEST_WIDTH};
use test_harness::{Call, HarnessOptions, ShellFlavor, TestWinSystem};
use windowing::geometry::Size;
use windowing::input_event::InputEvent;
use windowing::shell_surface::{ShellConfigure, ShellEvent, ShellState};
use windowing::winsystem::{Lifecycle, Resolution, WinSystemError};

fn created(options: HarnessOptions) -> TestWinSystem {
    let mut tw = TestWinSystem::connected(options, &fixtures::dual_outputs());
    tw.create_window(false).unwrap();
    tw.clear_calls();
    tw
}

#[test]
fn configure_resizes_then_acks() {
    let mut tw = created(HarnessOptions::default());
    assert_eq!(tw.snapshot().lifecycle, Lifecycle::AwaitingInitialConfigure);

    tw.configure(5, 800, 600, ShellState::ACTIVATED);

    assert_resized_before_ack(&tw, Size::new(800, 600), 5);
    assert_acked_once(&tw, 5);
    assert_eq!(tw.snapshot().lifecycle, Lifecycle::Windowed);
    assert_eq!(tw.render_size(), Size::new(800, 600));
    assert!(tw.events().contains(&InputEvent::Resize { width: 800, height: 600 }));
}

#[test]
fn unchanged_configure_is_acked_without_resize() {
    let mut tw = created(HarnessOptions::default());
    tw.configure(5, 800, 600, ShellState::ACTIVATED);
    tw.clear_calls();

    tw.configure(6, 800, 600, ShellState::ACTIVATED);

    assert_acked_once(&tw, 6);
    assert_no_resize(&tw);
}

#[test]
fn resize_updates_current_resolution() {
    let mut tw = created(HarnessOptions::default());
    tw.configure(5, 800, 600, ShellState::ACTIVATED);

    let state = tw.resolutions.lock().unwrap();
    let current = state.current.clone().unwrap();
    assert_eq!((current.width, current.height), (800, 600));
    assert_eq!(current.output, "Dell U2415");
    assert!(!current.fullscreen);
    drop(state);

    let force = tw.calls().iter().any(|c| matches!(c, Call::VideoResolution { force: true, .. }));
    assert!(force, "video resolution not re-applied: {:?}", tw.calls());
}

#[test]
fn windowed_size_remembered_only_when_unconstrained() {
    let mut tw = fixtures::windowed();

    tw.configure(2, 1024, 768, ShellState::ACTIVATED);
    assert!(tw.calls().contains(&Call::WindowedSize(Size::new(1024, 768))));

    tw.clear_calls();
    tw.configure(3, 1920, 1080, ShellState::ACTIVATED | ShellState::MAXIMIZED);
    assert!(!tw.calls().iter().any(|c| matches!(c, Call::WindowedSize(_))));
}

#[test]
fn zero_size_keeps_current_size() {
    let mut tw = fixtures::windowed();

    tw.configure(2, 0, 0, ShellState::ACTIVATED);

    assert_acked_once(&tw, 2);
    assert_no_resize(&tw);
    assert_eq!(tw.snapshot().size, Size::new(TEST_WIDTH, TEST_HEIGHT));
}

#[test]
fn zero_dimension_filled_from_current_size() {
    let mut tw = fixtures::windowed();

    tw.configure(2, 0, 500, ShellState::ACTIVATED);

    assert_resized_before_ack(&tw, Size::new(TEST_WIDTH, 500), 2);
}

#[test]
fn leaving_maximized_restores_windowed_size() {
    let mut tw = fixtures::windowed();
    tw.configure(2, 1920, 1080, ShellState::ACTIVATED | ShellState::MAXIMIZED);
    assert_eq!(tw.snapshot().size, Size::new(1920, 1080));

    tw.clear_calls();
    tw.configure(3, 0, 0, ShellState::ACTIVATED);

    assert_resized_before_ack(&tw, Size::new(TEST_WIDTH, TEST_HEIGHT), 3);
    assert_eq!(tw.snapshot().size, Size::new(TEST_WIDTH, TEST_HEIGHT));
}

#[test]
fn initial_zero_configure_uses_stored_windowed_size() {
    let options = HarnessOptions {
        windowed_size: Some(Size::new(1024, 576)),
        ..HarnessOptions::default()
    };
    let mut tw = created(options);

    tw.configure(1, 0, 0, ShellState::ACTIVATED);

    assert_resized_before_ack(&tw, Size::new(1024, 576), 1);
}

#[test]
fn initial_zero_configure_without_history_uses_output_size() {
    let mut tw = created(HarnessOptions::default());

    tw.configure(1, 0, 0, ShellState::ACTIVATED);

    assert_eq!(tw.snapshot().size, Size::new(1920, 1080));
}

#[test]
fn fullscreen_configure_changes_lifecycle() {
    let mut tw = fixtures::windowed();

    tw.configure(2, 1920, 1080, ShellState::ACTIVATED | ShellState::FULLSCREEN);

    let snapshot = tw.snapshot();
    assert_eq!(snapshot.lifecycle, Lifecycle::Fullscreen);
    assert!(tw.winsys.is_fullscreen());
    assert!(tw.resolutions.lock().unwrap().current.as_ref().unwrap().fullscreen);
}

#[test]
fn legacy_shell_configures_itself() {
    let options = HarnessOptions {
        shell: ShellFlavor::Legacy,
        windowed_size: Some(Size::new(1024, 576)),
        ..HarnessOptions::default()
    };
    let mut tw = TestWinSystem::connected(options, &[lowdpi_output()]);
    tw.create_window(false).unwrap();

    let snapshot = tw.snapshot();
    assert_eq!(snapshot.lifecycle, Lifecycle::Windowed);
    assert_eq!(snapshot.size, Size::new(1024, 576));
    assert_eq!(tw.render_size(), Size::new(1024, 576));
}

#[test]
fn legacy_shell_state_follows_request() {
    let options = HarnessOptions {
        shell: ShellFlavor::Legacy,
        ..HarnessOptions::default()
    };
    let mut tw = TestWinSystem::connected(options, &[lowdpi_output()]);
    tw.create_window(true).unwrap();

    let snapshot = tw.snapshot();
    assert_eq!(snapshot.lifecycle, Lifecycle::Fullscreen);
    assert_eq!(snapshot.state, ShellState::FULLSCREEN);
    assert_eq!(snapshot.size, Size::new(1920, 1080));
}

#[test]
fn create_window_requires_connection_and_no_window() {
    let mut tw = TestWinSystem::new(HarnessOptions::default());
    assert!(matches!(tw.create_window(false), Err(WinSystemError::NotConnected)));

    let mut tw = fixtures::windowed();
    assert!(matches!(tw.create_window(false), Err(WinSystemError::WindowExists)));
}

#[test]
fn configure_without_window_is_an_error() {
    let mut tw = TestWinSystem::connected(HarnessOptions::default(), &[lowdpi_output()]);
    let result = tw.winsys.handle_configure(ShellConfigure {
        serial: 1,
        size: Size::new(800, 600),
        state: ShellState::ACTIVATED,
    });
    assert!(matches!(result, Err(WinSystemError::NoWindow)));
}

#[test]
fn destroyed_window_can_be_recreated() {
    let mut tw = fixtures::windowed();
    tw.winsys.destroy_window();
    assert_eq!(tw.snapshot().lifecycle, Lifecycle::Connected);

    tw.create_window(true).unwrap();
    assert_eq!(tw.snapshot().lifecycle, Lifecycle::AwaitingInitialConfigure);
}

#[test]
fn create_fullscreen_targets_requested_output() {
    let mut tw = TestWinSystem::connected(HarnessOptions::default(), &[lowdpi_output()]);
    tw.create_window(true).unwrap();

    let calls = tw.calls();
    let fullscreen = calls.iter().position(|c| *c == Call::Fullscreen { output: Some(1) });
    let initialize = calls.iter().position(|c| *c == Call::Initialize);
    assert!(
        matches!((fullscreen, initialize), (Some(f), Some(i)) if f < i),
        "fullscreen must be requested before the initial commit: {:?}",
        calls
    );
}

#[test]
fn switch_to_fullscreen_waits_for_compositor() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    let res = Resolution::new(Size::new(3840, 2160), 60.0, "Dell P2715Q @1920x0");

    tw.winsys.set_full_screen(true, &res).unwrap();

    assert_eq!(tw.calls(), vec![Call::Fullscreen { output: Some(2) }]);
    assert_no_resize(&tw);
}

#[test]
fn switch_windowed_size_applies_immediately() {
    let mut tw = fixtures::windowed();
    let res = Resolution::new(Size::new(1024, 768), 60.0, "Dell U2415");

    tw.winsys.set_full_screen(false, &res).unwrap();

    let calls = tw.calls();
    assert_eq!(calls.first(), Some(&Call::Windowed));
    assert!(calls.contains(&Call::Resize(Size::new(1024, 768))));
    assert_eq!(tw.snapshot().size, Size::new(1024, 768));
}

#[test]
fn switch_while_maximized_only_requests_windowed() {
    let mut tw = fixtures::windowed();
    tw.configure(2, 1920, 1080, ShellState::ACTIVATED | ShellState::MAXIMIZED);
    tw.clear_calls();
    let res = Resolution::new(Size::new(1024, 768), 60.0, "Dell U2415");

    tw.winsys.set_full_screen(false, &res).unwrap();

    assert_eq!(tw.calls(), vec![Call::Windowed]);
    assert_eq!(tw.snapshot().size, Size::new(1920, 1080));
}

#[test]
fn switch_to_same_resolution_is_ignored() {
    let mut tw = fixtures::windowed();
    tw.enter_output(1);
    tw.clear_calls();
    let res = Resolution::new(Size::new(TEST_WIDTH, TEST_HEIGHT), 60.0, "Dell U2415");

    tw.winsys.set_full_screen(false, &res).unwrap();

    assert!(tw.calls().is_empty(), "calls: {:?}", tw.calls());
}

#[test]
fn close_request_becomes_quit() {
    let mut tw = fixtures::windowed();

    tw.winsys.handle_shell_event(ShellEvent::Close).unwrap();

    assert_eq!(tw.events(), vec![InputEvent::Quit]);
    assert!(tw.calls().is_empty(), "close must not touch the window: {:?}", tw.calls());
}

#[test]
fn shell_configure_event_without_window_is_an_error() {
    let mut tw = TestWinSystem::connected(HarnessOptions::default(), &[lowdpi_output()]);
    let result = tw.winsys.handle_shell_event(ShellEvent::Configure(ShellConfigure {
        serial: 4,
        size: Size::new(800, 600),
        state: ShellState::empty(),
    }));
    assert!(matches!(result, Err(WinSystemError::NoWindow)));
    assert!(tw.events().is_empty());
}

fn configure_size() -> impl Strategy<Value = (i32, i32)> {
    prop_oneof![
        1 => Just((0, 0)),
        1 => (0i32..4000).prop_map(|h| (0, h)),
        4 => (1i32..4000, 1i32..4000),
    ]
}

fn configure_state() -> impl Strategy<Value = ShellState> {
    prop_oneof![
        Just(ShellState::ACTIVATED),
        Just(ShellState::empty()),
        Just(ShellState::ACTIVATED | ShellState::MAXIMIZED),
        Just(ShellState::ACTIVATED | ShellState::FULLSCREEN),
    ]
}

proptest! {
    /// Each serial is acked once, as the last thing its configure does
    #[test]
    fn every_configure_acked_once_and_last(
        configures in prop::collection::vec((configure_size(), configure_state()), 1..15),
    ) {
        let mut tw = fixtures::windowed();

        for (index, ((width, height), state)) in configures.into_iter().enumerate() {
            let serial = index as u32 + 2;
            tw.clear_calls();
            tw.configure(serial, width, height, state);

            let calls = tw.calls();
            prop_assert_eq!(calls.last(), Some(&Call::Ack(serial)));
            prop_assert_eq!(tw.log.count(|c| matches!(c, Call::Ack(_))), 1);
            prop_assert_eq!(tw.render_size(), tw.snapshot().buffer_size);
        }
    }

    /// Content plus decorations gives back the configured size
    #[test]
    fn decorated_size_round_trips(width in 1i32..4000, height in 1i32..4000) {
        let mut tw = fixtures::decorated();
        let decorations = tw.winsys.decorator().decoration_size();
        let full = Size::new(width, height) + decorations;

        tw.configure(2, full.width, full.height, ShellState::ACTIVATED);

        let content = tw.snapshot().size;
        prop_assert_eq!(content, Size::new(width, height));
        prop_assert_eq!(
            tw.winsys.decorator().calculate_full_surface_size(content, ShellState::ACTIVATED),
            full
        );
    }
}
