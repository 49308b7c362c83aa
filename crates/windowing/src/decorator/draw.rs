//! Software drawing into ARGB8888 pixel buffers
//!
//! All primitives validate their coordinates against the buffer and fail
//! with [`DrawError`] instead of clipping; callers compute exact geometry
//! and an out-of-bounds draw means that geometry is wrong.

use thiserror::Error;

use crate::geometry::{Point, Rect, Size};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DrawError {
    #[error("position {x},{y} outside {width}x{height} buffer")]
    OutOfBounds {
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    },

    #[error("invalid line length {0}")]
    InvalidLength(i32),
}

/// Pixels in native-endian ARGB8888, row-major without padding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    size: Size,
    data: Vec<u32>,
}

impl PixelBuffer {
    pub fn new(size: Size) -> Self {
        let len = size.width.max(0) as usize * size.height.max(0) as usize;
        Self {
            size,
            data: vec![0; len],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixels(&self) -> &[u32] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.data
    }

    pub fn pixel(&self, point: Point) -> Result<u32, DrawError> {
        Ok(self.data[self.offset(point)?])
    }

    /// Bytes as `wl_shm` expects ARGB8888: little-endian
    pub fn write_le_bytes(&self, out: &mut [u8]) {
        for (dst, px) in out.chunks_exact_mut(4).zip(self.data.iter()) {
            dst.copy_from_slice(&px.to_le_bytes());
        }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len() * 4
    }

    pub fn fill(&mut self, color: u32) {
        self.data.fill(color);
    }

    fn offset(&self, point: Point) -> Result<usize, DrawError> {
        if point.x < 0 || point.y < 0 || point.x >= self.size.width || point.y >= self.size.height {
            return Err(DrawError::OutOfBounds {
                x: point.x,
                y: point.y,
                width: self.size.width,
                height: self.size.height,
            });
        }
        Ok(point.y as usize * self.size.width as usize + point.x as usize)
    }

    pub fn horizontal_line(&mut self, color: u32, start: Point, length: i32) -> Result<(), DrawError> {
        if length <= 0 {
            return Err(DrawError::InvalidLength(length));
        }
        let first = self.offset(start)?;
        let last = self.offset(start + Point::new(length - 1, 0))?;
        self.data[first..=last].fill(color);
        Ok(())
    }

    pub fn vertical_line(&mut self, color: u32, start: Point, length: i32) -> Result<(), DrawError> {
        self.line_with_stride(color, start, length, self.size.width as usize)
    }

    /// Plot `length` pixels starting at `start`, advancing `stride` pixels each
    ///
    /// A stride of width ± 1 draws a diagonal.
    pub fn line_with_stride(
        &mut self,
        color: u32,
        start: Point,
        length: i32,
        stride: usize,
    ) -> Result<(), DrawError> {
        if length <= 0 {
            return Err(DrawError::InvalidLength(length));
        }
        let first = self.offset(start)?;
        let last = first + stride * (length as usize - 1);
        if last >= self.data.len() {
            let width = self.size.width.max(1) as usize;
            return Err(DrawError::OutOfBounds {
                x: (last % width) as i32,
                y: (last / width) as i32,
                width: self.size.width,
                height: self.size.height,
            });
        }
        for offset in (first..=last).step_by(stride.max(1)) {
            self.data[offset] = color;
        }
        Ok(())
    }

    /// Outline of `rect`; `p2` is exclusive
    pub fn rectangle(&mut self, color: u32, rect: Rect) -> Result<(), DrawError> {
        let (w, h) = (rect.width(), rect.height());
        self.horizontal_line(color, rect.p1, w)?;
        self.vertical_line(color, rect.p1, h)?;
        self.horizontal_line(color, rect.p1 + Point::new(1, h - 1), w - 1)?;
        self.vertical_line(color, rect.p1 + Point::new(w - 1, 1), h - 1)?;
        Ok(())
    }

    /// Blend `color` over the pixel at `point` with coverage `alpha`
    pub fn blend(&mut self, point: Point, color: u32, alpha: u8) -> Result<(), DrawError> {
        let offset = self.offset(point)?;
        let dst = self.data[offset];
        let a = alpha as u32;
        let inv = 255 - a;
        let channel = |shift: u32| {
            let s = (color >> shift) & 0xFF;
            let d = (dst >> shift) & 0xFF;
            ((s * a + d * inv) / 255) << shift
        };
        self.data[offset] = 0xFF00_0000 | channel(16) | channel(8) | channel(0);
        Ok(())
    }
}
