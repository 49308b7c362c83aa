//! Test assertions over recorded calls and window-system state

use windowing::geometry::Size;

use crate::headless::TestWinSystem;
use crate::mocks::Call;

/// Assert that `serial` was acked exactly once
pub fn assert_acked_once(tw: &TestWinSystem, serial: u32) {
    let acks = tw.log.count(|c| *c == Call::Ack(serial));
    assert_eq!(acks, 1, "serial {} acked {} times, calls: {:?}", serial, acks, tw.calls());
}

/// Assert that the render context was resized to `size` before `serial` was acked
pub fn assert_resized_before_ack(tw: &TestWinSystem, size: Size, serial: u32) {
    let resize = tw.log.position(|c| *c == Call::Resize(size));
    let ack = tw.log.position(|c| *c == Call::Ack(serial));
    match (resize, ack) {
        (Some(resize), Some(ack)) => assert!(
            resize < ack,
            "resize to {:?} (call {}) should precede ack {} (call {})",
            size,
            resize,
            serial,
            ack
        ),
        _ => panic!(
            "expected resize to {:?} and ack {}, calls: {:?}",
            size,
            serial,
            tw.calls()
        ),
    }
}

/// Assert that no resize happened since the log was last cleared
pub fn assert_no_resize(tw: &TestWinSystem) {
    let calls = tw.calls();
    assert!(
        !calls.iter().any(|c| matches!(c, Call::Resize(_))),
        "unexpected resize, calls: {:?}",
        calls
    );
}

/// Assert the calls a buffer-scale change to `scale` must cause, in order
///
/// `content` is the unchanged content size in surface coordinates.
pub fn assert_scale_cascade(tw: &TestWinSystem, scale: i32, content: Size) {
    let expected = [
        Call::BufferScale(scale),
        Call::OpaqueRegion(content),
        Call::ThemeScale(scale),
        Call::LostDisplay,
        Call::Resize(content * scale),
        Call::ResetDisplay,
    ];
    let calls = tw.calls();
    let mut from = 0;
    for call in &expected {
        match calls[from..].iter().position(|c| c == call) {
            Some(offset) => from += offset + 1,
            None => panic!(
                "expected {:?} after call {} of the scale cascade, calls: {:?}",
                call, from, calls
            ),
        }
    }
}

/// Assert that buffer size equals content size times buffer scale
pub fn assert_buffer_matches_scale(tw: &TestWinSystem) {
    let snapshot = tw.snapshot();
    assert_eq!(
        snapshot.buffer_size,
        snapshot.size * snapshot.buffer_scale,
        "buffer size should be content {:?} at scale {}",
        snapshot.size,
        snapshot.buffer_scale
    );
    assert_eq!(
        tw.render_size(),
        snapshot.buffer_size,
        "render context holds a stale size"
    );
}
