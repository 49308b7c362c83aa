//! Buffer scale follows the densest output the surface overlaps

use test_harness::assertions::{assert_buffer_matches_scale, assert_scale_cascade};
use test_harness::fixtures::{self, TEST_HEIGHT, TEST_WIDTH};
use test_harness::Call;
use windowing::geometry::Size;
use windowing::input_event::InputEvent;
use windowing::seat::{Capabilities, PointerEvent};
use windowing::winsystem::PointerTarget;

fn content() -> Size {
    Size::new(TEST_WIDTH, TEST_HEIGHT)
}

#[test]
fn overlapping_mixed_scales_picks_highest() {
    let mut tw = fixtures::windowed_on_dual_outputs();

    tw.enter_output(1);
    assert_eq!(tw.snapshot().buffer_scale, 1);
    assert!(tw.calls().is_empty(), "no scale change expected: {:?}", tw.calls());

    tw.enter_output(2);

    assert_eq!(tw.snapshot().buffer_scale, 2);
    assert_scale_cascade(&tw, 2, content());
    assert_buffer_matches_scale(&tw);
    assert_eq!(tw.render_size(), Size::new(2560, 1440));
}

#[test]
fn leaving_hidpi_output_drops_back_to_one() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.enter_output(1);
    tw.enter_output(2);
    tw.clear_calls();

    tw.leave_output(2);

    assert_eq!(tw.snapshot().buffer_scale, 1);
    assert_scale_cascade(&tw, 1, content());
    assert_buffer_matches_scale(&tw);
    assert_eq!(tw.snapshot().size, content(), "content size must not change");
}

#[test]
fn scale_change_does_not_ack() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.enter_output(2);
    assert!(!tw.calls().iter().any(|c| matches!(c, Call::Ack(_))));
}

#[test]
fn leaving_every_output_keeps_last_scale() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.enter_output(2);
    tw.clear_calls();

    tw.leave_output(2);

    assert_eq!(tw.snapshot().buffer_scale, 2);
    assert!(tw.calls().is_empty(), "calls: {:?}", tw.calls());
}

#[test]
fn leaving_unknown_output_is_ignored() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.enter_output(2);
    tw.clear_calls();

    tw.leave_output(9);

    assert!(tw.calls().is_empty());
}

#[test]
fn pointer_coordinates_follow_scale() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.seat_capabilities(1, Capabilities::POINTER);
    tw.enter_output(2);
    tw.sink.take();

    tw.pointer_enter(1, PointerTarget::Main, 3, 100.0, 50.0);
    tw.pointer(1, PointerEvent::Motion { x: 100.5, y: 60.25 });

    let motions: Vec<_> = tw
        .events()
        .into_iter()
        .filter(|e| matches!(e, InputEvent::Motion { .. }))
        .collect();
    assert_eq!(
        motions,
        vec![
            InputEvent::Motion { x: 200, y: 100 },
            InputEvent::Motion { x: 201, y: 121 },
        ]
    );
}

#[test]
fn seat_added_after_scale_change_uses_current_scale() {
    let mut tw = fixtures::windowed_on_dual_outputs();
    tw.enter_output(2);

    tw.seat_capabilities(4, Capabilities::POINTER | Capabilities::TOUCH);

    assert_eq!(tw.winsys.seat(4).unwrap().coordinate_scale(), 2);
}

#[test]
fn cursor_reset_after_scale_change() {
    let mut tw = fixtures::decorated();
    tw.seat_capabilities(1, Capabilities::POINTER);
    tw.enter_output(1);
    tw.pointer_enter(
        1,
        PointerTarget::Decoration(windowing::decorator::BorderSurface::Bottom),
        7,
        300.0,
        2.0,
    );
    tw.clear_calls();

    tw.enter_output(2);

    let calls = tw.calls();
    let theme = calls.iter().position(|c| *c == Call::ThemeScale(2));
    let cursor = calls
        .iter()
        .position(|c| *c == Call::Cursor { seat: 1, name: Some("s-resize") });
    assert!(
        matches!((theme, cursor), (Some(t), Some(c)) if t < c),
        "cursor must be set again after the theme reload: {:?}",
        calls
    );
}

#[test]
fn decorations_repainted_at_new_scale() {
    let mut tw = fixtures::decorated();
    tw.enter_output(1);
    tw.clear_calls();

    tw.enter_output(2);

    let main_size = tw.snapshot().size;
    assert!(tw.calls().contains(&Call::DecorationReconfigure { main_size, scale: 2 }));
    let record = tw.decorations.as_ref().unwrap().lock().unwrap();
    let top = record.buffer_sizes[0];
    assert_eq!(top, Size::new((main_size.width + 10) * 2, 38 * 2));
}
