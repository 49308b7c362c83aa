//! Seat capability reconciliation
//!
//! Processors must track exactly what the seat announces, without
//! rebuilding the ones that stay.

use proptest::prelude::*;
use test_harness::fixtures;
use windowing::input_event::InputEvent;
use windowing::seat::{reconcile, Capabilities, PointerEvent};
use windowing::winsystem::PointerTarget;

const SEAT: u32 = 7;

#[test]
fn keyboard_added_next_to_pointer_leaves_pointer_alone() {
    let mut tw = fixtures::windowed();

    let diff = tw.seat_capabilities(SEAT, Capabilities::POINTER);
    assert_eq!(diff.gained, Capabilities::POINTER);
    assert!(diff.lost.is_empty());
    assert!(tw.winsys.seat(SEAT).unwrap().pointer().is_some());

    tw.pointer_enter(SEAT, PointerTarget::Main, 1, 10.0, 20.0);
    assert_eq!(tw.winsys.seat(SEAT).unwrap().pointer().unwrap().position(), (10, 20));

    let diff = tw.seat_capabilities(SEAT, Capabilities::POINTER | Capabilities::KEYBOARD);
    assert_eq!(diff.gained, Capabilities::KEYBOARD);
    assert!(diff.lost.is_empty());

    // A rebuilt pointer processor would have forgotten the position
    let seat = tw.winsys.seat(SEAT).unwrap();
    assert_eq!(seat.pointer().unwrap().position(), (10, 20));
    assert!(seat.keyboard().is_some());
    assert!(seat.touch().is_none());
}

#[test]
fn pointer_dropped_keyboard_kept() {
    let mut tw = fixtures::windowed();
    tw.seat_capabilities(SEAT, Capabilities::POINTER | Capabilities::KEYBOARD);

    let diff = tw.seat_capabilities(SEAT, Capabilities::KEYBOARD);
    assert_eq!(diff.lost, Capabilities::POINTER);
    assert!(diff.gained.is_empty());

    let seat = tw.winsys.seat(SEAT).unwrap();
    assert!(seat.pointer().is_none());
    assert!(seat.keyboard().is_some());
    assert_eq!(seat.capabilities(), Capabilities::KEYBOARD);
    assert!(!tw.winsys.has_cursor());
}

#[test]
fn pointer_events_after_losing_pointer_are_dropped() {
    let mut tw = fixtures::windowed();
    tw.seat_capabilities(SEAT, Capabilities::POINTER);
    tw.pointer_enter(SEAT, PointerTarget::Main, 1, 5.0, 5.0);
    tw.sink.take();

    tw.seat_capabilities(SEAT, Capabilities::empty());
    tw.pointer(SEAT, PointerEvent::Motion { x: 50.0, y: 50.0 });

    assert!(tw.events().is_empty(), "got {:?}", tw.events());
}

#[test]
fn regaining_pointer_starts_fresh() {
    let mut tw = fixtures::windowed();
    tw.seat_capabilities(SEAT, Capabilities::POINTER);
    tw.pointer_enter(SEAT, PointerTarget::Main, 1, 30.0, 40.0);

    tw.seat_capabilities(SEAT, Capabilities::empty());
    tw.seat_capabilities(SEAT, Capabilities::POINTER);

    assert_eq!(tw.winsys.seat(SEAT).unwrap().pointer().unwrap().position(), (0, 0));
}

#[test]
fn removed_seat_forgets_focus() {
    let mut tw = fixtures::windowed();
    tw.seat_capabilities(SEAT, Capabilities::POINTER);
    tw.pointer_enter(SEAT, PointerTarget::Main, 1, 5.0, 5.0);
    tw.sink.take();

    assert!(tw.winsys.remove_seat(SEAT).is_some());
    tw.pointer(SEAT, PointerEvent::Motion { x: 8.0, y: 8.0 });

    assert!(tw.winsys.seat(SEAT).is_none());
    assert!(!tw.events().iter().any(|e| matches!(e, InputEvent::Motion { .. })));
}

fn capabilities() -> impl Strategy<Value = Capabilities> {
    (0u32..8).prop_map(Capabilities::from_bits_truncate)
}

proptest! {
    /// Processors always match the last announcement
    #[test]
    fn processors_follow_announcements(announcements in prop::collection::vec(capabilities(), 1..20)) {
        let mut tw = fixtures::windowed();

        for announced in announcements {
            let before = tw.winsys.seat(SEAT).map(|s| s.capabilities()).unwrap_or_default();
            let diff = tw.seat_capabilities(SEAT, announced);
            let seat = tw.winsys.seat(SEAT).unwrap();

            prop_assert_eq!(seat.capabilities(), announced);
            prop_assert_eq!(seat.pointer().is_some(), announced.contains(Capabilities::POINTER));
            prop_assert_eq!(seat.keyboard().is_some(), announced.contains(Capabilities::KEYBOARD));
            prop_assert_eq!(seat.touch().is_some(), announced.contains(Capabilities::TOUCH));
            prop_assert!((diff.gained & diff.lost).is_empty());
            prop_assert_eq!(diff, reconcile(before, announced));
        }
    }

    /// Announcing the same capabilities twice changes nothing the second time
    #[test]
    fn repeated_announcement_is_a_noop(announced in capabilities()) {
        let mut tw = fixtures::windowed();
        tw.seat_capabilities(SEAT, announced);

        let diff = tw.seat_capabilities(SEAT, announced);
        prop_assert!(diff.is_empty(), "second announcement produced {:?}", diff);
    }
}
