#![no_main]
//! Fuzz target for decoration hit testing
//!
//! Derives window sizes, scales and pointer positions from random bytes
//! and checks that layout and edge detection stay inside their surfaces.

use libfuzzer_sys::fuzz_target;

use windowing::decorator::{button_layout, resize_edge_for_position, BorderSurface, DecorationMetrics};
use windowing::geometry::{Point, Size};

const SURFACES: [BorderSurface; 4] = [
    BorderSurface::Top,
    BorderSurface::Right,
    BorderSurface::Bottom,
    BorderSurface::Left,
];

fn read_i16(data: &[u8], at: usize) -> i32 {
    match data.get(at..at + 2) {
        Some(b) => i16::from_le_bytes([b[0], b[1]]) as i32,
        None => 0,
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 10 {
        return;
    }
    let main = Size::new(read_i16(data, 0).abs(), read_i16(data, 2).abs());
    let scale = i32::from(data[4] % 4) + 1;
    let surface = SURFACES[usize::from(data[5]) % SURFACES.len()];
    let position = Point::new(read_i16(data, 6), read_i16(data, 8));

    let metrics = DecorationMetrics::default().scaled(scale);
    let surface_size = metrics.surface_size(surface, main);

    // Must not panic for positions outside the surface either
    let _ = resize_edge_for_position(surface, surface_size, position, metrics.resize_corner_distance);

    if surface == BorderSurface::Top {
        for (_, rect) in button_layout(surface_size.width, &metrics) {
            assert!(rect.p1.x >= 0, "button placed left of the surface");
        }
    }
});
