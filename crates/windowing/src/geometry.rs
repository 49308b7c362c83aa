//! Integer geometry for surfaces and buffers
//!
//! Sizes and positions on the Wayland side are always integers in either
//! surface-local coordinates or buffer pixels (surface coordinates times the
//! buffer scale). These types do not track which of the two a value is in;
//! the owning code names its fields accordingly.

use std::ops::{Add, Mul, Sub};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("negative size {width}x{height}")]
    NegativeSize { width: i32, height: i32 },
}

/// Width and height pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Construct a size, rejecting negative dimensions
    pub fn try_new(width: i32, height: i32) -> Result<Self, GeometryError> {
        if width < 0 || height < 0 {
            return Err(GeometryError::NegativeSize { width, height });
        }
        Ok(Self { width, height })
    }

    /// True if either dimension is zero ("no preference" in a configure)
    pub fn has_zero_dimension(self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(self) -> i64 {
        self.width as i64 * self.height as i64
    }
}

impl Add for Size {
    type Output = Size;

    fn add(self, rhs: Size) -> Size {
        Size::new(self.width + rhs.width, self.height + rhs.height)
    }
}

impl Sub for Size {
    type Output = Size;

    fn sub(self, rhs: Size) -> Size {
        Size::new(self.width - rhs.width, self.height - rhs.height)
    }
}

impl Mul<i32> for Size {
    type Output = Size;

    fn mul(self, scale: i32) -> Size {
        Size::new(self.width * scale, self.height * scale)
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Integer position
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Fractional position as received from wl_pointer / wl_touch
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Truncate to integer coordinates
    pub fn to_point(self) -> Point {
        Point::new(self.x as i32, self.y as i32)
    }
}

/// Rectangle given by two corner points (inclusive)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub p1: Point,
    pub p2: Point,
}

impl Rect {
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn width(&self) -> i32 {
        self.p2.x - self.p1.x
    }

    pub fn height(&self) -> i32 {
        self.p2.y - self.p1.y
    }

    /// Hit test; both edges are part of the rectangle
    pub fn contains(&self, point: Point) -> bool {
        self.p1.x <= point.x && point.x <= self.p2.x && self.p1.y <= point.y && point.y <= self.p2.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_size_rejected() {
        assert!(Size::try_new(-1, 10).is_err());
        assert!(Size::try_new(10, -1).is_err());
        assert_eq!(Size::try_new(0, 0), Ok(Size::new(0, 0)));
    }

    #[test]
    fn size_arithmetic() {
        let size = Size::new(800, 600);
        assert_eq!(size + Size::new(10, 43), Size::new(810, 643));
        assert_eq!(size - Size::new(10, 43), Size::new(790, 557));
        assert_eq!(size * 2, Size::new(1600, 1200));
        assert_eq!(size.area(), 480_000);
    }

    #[test]
    fn zero_dimension_detection() {
        assert!(Size::new(0, 600).has_zero_dimension());
        assert!(Size::new(800, 0).has_zero_dimension());
        assert!(!Size::new(800, 600).has_zero_dimension());
    }

    #[test]
    fn rect_contains_is_inclusive() {
        let rect = Rect::new(Point::new(10, 10), Point::new(20, 20));
        assert!(rect.contains(Point::new(10, 10)));
        assert!(rect.contains(Point::new(20, 20)));
        assert!(rect.contains(Point::new(15, 12)));
        assert!(!rect.contains(Point::new(9, 15)));
        assert!(!rect.contains(Point::new(15, 21)));
        assert_eq!(rect.width(), 10);
        assert_eq!(rect.height(), 10);
    }

    #[test]
    fn pointf_truncates() {
        assert_eq!(PointF::new(4.9, 7.2).to_point(), Point::new(4, 7));
    }
}
