//! Output tracking and the resolution list built from it

use test_harness::fixtures::{self, hidpi_output, OutputDescription};
use test_harness::{HarnessOptions, TestWinSystem};
use windowing::output::{Mode, Output, OutputError, OutputEvent};
use windowing::winsystem::WinSystemError;

const MODE_1080: Mode = Mode::new(1920, 1080, 60000);
const MODE_720: Mode = Mode::new(1280, 720, 50000);

fn geometry() -> OutputEvent {
    OutputEvent::Geometry {
        x: 0,
        y: 0,
        physical_width: 509,
        physical_height: 286,
        make: "Dell".to_string(),
        model: "U2415".to_string(),
    }
}

#[test]
fn preferred_mode_arriving_later_leaves_current_alone() {
    let mut tw = TestWinSystem::new(HarnessOptions::default());
    tw.winsys.add_output(Output::new(3, None));

    tw.winsys.handle_output_event(3, geometry());
    tw.winsys.handle_output_event(
        3,
        OutputEvent::Mode {
            mode: MODE_1080,
            current: true,
            preferred: false,
        },
    );
    assert!(tw.winsys.outputs().get(3).is_none(), "visible before done");
    tw.winsys.handle_output_event(3, OutputEvent::Done);

    let output = tw.winsys.outputs().get(3).unwrap();
    assert_eq!(output.current_mode(), Ok(MODE_1080));
    assert_eq!(output.preferred_mode(), Err(OutputError::NoModeSet(3)));

    tw.winsys.handle_output_event(
        3,
        OutputEvent::Mode {
            mode: MODE_720,
            current: false,
            preferred: true,
        },
    );
    tw.winsys.handle_output_event(3, OutputEvent::Done);

    let output = tw.winsys.outputs().get(3).unwrap();
    assert_eq!(output.preferred_mode(), Ok(MODE_720));
    assert_eq!(output.current_mode(), Ok(MODE_1080));
    assert_eq!(output.modes().count(), 2);
}

#[test]
fn outputs_listed_by_friendly_name() {
    let tw = TestWinSystem::connected(HarnessOptions::default(), &fixtures::dual_outputs());

    assert_eq!(
        tw.winsys.connected_outputs(),
        vec!["Dell U2415".to_string(), "Dell P2715Q @1920x0".to_string()]
    );
}

#[test]
fn output_without_make_or_model_is_unknown() {
    let tw = TestWinSystem::connected(
        HarnessOptions::default(),
        &[OutputDescription::new("", "").mode(MODE_1080, true, true)],
    );
    assert_eq!(tw.winsys.connected_outputs(), vec!["Unknown".to_string()]);
}

#[test]
fn connecting_without_outputs_fails() {
    let mut tw = TestWinSystem::new(HarnessOptions::default());
    assert!(matches!(tw.winsys.mark_connected(), Err(WinSystemError::NoOutputs)));

    // An output that never finished its first burst does not count
    tw.winsys.add_output(Output::new(1, None));
    tw.winsys.handle_output_event(1, geometry());
    assert!(matches!(tw.winsys.mark_connected(), Err(WinSystemError::NoOutputs)));
}

#[test]
fn resolutions_come_from_first_output_by_default() {
    let tw = TestWinSystem::connected(HarnessOptions::default(), &fixtures::dual_outputs());
    let state = tw.resolutions.lock().unwrap();

    let desktop = state.desktop.clone().unwrap();
    assert_eq!((desktop.width, desktop.height), (1920, 1080));
    assert_eq!(desktop.refresh_rate, 60.0);
    assert_eq!(desktop.output, "Dell U2415");
    assert!((desktop.pixel_ratio - 0.9945).abs() < 0.0005, "ratio {}", desktop.pixel_ratio);
    assert!(state.custom.is_empty());
    assert_eq!(state.calibrations_applied, 1);
}

#[test]
fn configured_monitor_selects_output() {
    let options = HarnessOptions {
        monitor: "Dell P2715Q @1920x0".to_string(),
        ..HarnessOptions::default()
    };
    let tw = TestWinSystem::connected(options, &fixtures::dual_outputs());
    let state = tw.resolutions.lock().unwrap();

    let desktop = state.desktop.clone().unwrap();
    assert_eq!((desktop.width, desktop.height), (3840, 2160));
    assert_eq!(desktop.output, "Dell P2715Q @1920x0");

    assert_eq!(state.custom.len(), 1);
    let other = &state.custom[0];
    assert_eq!((other.width, other.height), (1920, 1080));
    assert_eq!(other.output, "Dell P2715Q @1920x0");
}

#[test]
fn disconnected_monitor_falls_back() {
    let options = HarnessOptions {
        monitor: "Acme Projector".to_string(),
        ..HarnessOptions::default()
    };
    let tw = TestWinSystem::connected(options, &[hidpi_output()]);
    let desktop = tw.resolutions.lock().unwrap().desktop.clone().unwrap();
    assert_eq!(desktop.output, "Dell P2715Q @1920x0");
}

#[test]
fn unknown_panel_size_gives_square_pixels() {
    let output = OutputDescription::new("Acme", "TV").mode(MODE_1080, true, true);
    let tw = TestWinSystem::connected(HarnessOptions::default(), &[output]);
    let desktop = tw.resolutions.lock().unwrap().desktop.clone().unwrap();
    assert_eq!(desktop.pixel_ratio, 1.0);
}

#[test]
fn update_resolutions_replaces_custom_entries() {
    let options = HarnessOptions {
        monitor: "Dell P2715Q @1920x0".to_string(),
        ..HarnessOptions::default()
    };
    let mut tw = TestWinSystem::connected(options, &fixtures::dual_outputs());

    tw.winsys.update_resolutions();
    tw.winsys.update_resolutions();

    let state = tw.resolutions.lock().unwrap();
    assert_eq!(state.custom.len(), 1);
    assert_eq!(state.calibrations_applied, 3);
}

#[test]
fn current_output_follows_surface() {
    let mut tw = fixtures::windowed_on_dual_outputs();

    tw.enter_output(1);
    assert_eq!(tw.snapshot().current_output, "Dell U2415");

    tw.enter_output(2);
    assert_eq!(tw.snapshot().current_output, "Dell P2715Q @1920x0");

    tw.leave_output(2);
    assert_eq!(tw.snapshot().current_output, "Dell U2415");
    assert_eq!(tw.snapshot().refresh_rate, 60.0);
}

#[test]
fn removing_output_under_surface_recomputes_scale() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.enter_output(1);
    tw.enter_output(2);
    assert_eq!(tw.snapshot().buffer_scale, 2);

    tw.winsys.remove_output(2);

    assert_eq!(tw.snapshot().buffer_scale, 1);
    assert_eq!(tw.winsys.connected_outputs(), vec!["Dell U2415".to_string()]);
}

#[test]
fn scale_change_on_overlapped_output_applies() {
    let mut tw = fixtures::windowed();
    tw.enter_output(1);
    assert_eq!(tw.snapshot().buffer_scale, 1);

    tw.winsys.handle_output_event(1, OutputEvent::Scale(2));
    assert_eq!(tw.snapshot().buffer_scale, 1, "applied before done");
    tw.winsys.handle_output_event(1, OutputEvent::Done);

    assert_eq!(tw.snapshot().buffer_scale, 2);
}
