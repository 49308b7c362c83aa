//! Software renderer drawing into double-buffered shared memory

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_shm::WlShm;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Proxy, QueueHandle};
use windowing::backend::{BackendState, SharedPendingBuffers};
use windowing::decorator::draw::PixelBuffer;
use windowing::decorator::shm::{bytes_for_sizes, ShmError, ShmPool, Slot};
use windowing::geometry::{Point, Size};
use windowing::winsystem::RenderContext;
use windowing::RenderTarget;

const BUFFER_COUNT: usize = 2;
const BACKGROUND: u32 = 0xFF10_1418;
const BAR_COLOR: u32 = 0xFF3A_7BD5;

struct Frame {
    size: Size,
    pool: Option<ShmPool>,
    buffers: Vec<(WlBuffer, Slot)>,
    pixels: PixelBuffer,
    frame: u64,
    vsync: bool,
}

/// Render context for the main surface without a GPU
///
/// Draws a moving bar so frame pacing is visible.
pub struct ShmRenderer {
    surface: WlSurface,
    shm: WlShm,
    qh: QueueHandle<BackendState>,
    pending: SharedPendingBuffers,
    frame: Mutex<Frame>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ShmRenderer {
    pub fn new(target: &RenderTarget<'_>) -> Arc<Self> {
        Arc::new(Self {
            surface: target.surface.clone(),
            shm: target.shm.clone(),
            qh: target.qh.clone(),
            pending: target.pending_buffers.clone(),
            frame: Mutex::new(Frame {
                size: Size::default(),
                pool: None,
                buffers: Vec::new(),
                pixels: PixelBuffer::new(Size::default()),
                frame: 0,
                vsync: true,
            }),
        })
    }

    pub fn vsync(&self) -> bool {
        lock(&self.frame).vsync
    }

    fn allocate(&self, frame: &mut Frame, size: Size) -> Result<(), ShmError> {
        self.retire(frame);
        let sizes = [size; BUFFER_COUNT];
        let mut pool = ShmPool::new(&self.shm, bytes_for_sizes(&sizes, 1), &self.qh)?;
        for size in sizes {
            frame.buffers.push(pool.allocate(size, &self.qh)?);
        }
        frame.pool = Some(pool);
        Ok(())
    }

    fn retire(&self, frame: &mut Frame) {
        let mut pending = lock(&self.pending);
        for (buffer, _) in frame.buffers.drain(..) {
            if let Some(buffer) = pending.retire(buffer.id(), buffer) {
                buffer.destroy();
            }
        }
        frame.pool = None;
    }

    fn paint(frame: &mut Frame) {
        let size = frame.pixels.size();
        frame.pixels.fill(BACKGROUND);
        if size.has_zero_dimension() {
            return;
        }
        let bar_width = (size.width / 16).max(1);
        let start = (frame.frame as i32 * 4) % size.width;
        let width = bar_width.min(size.width - start);
        for y in 0..size.height {
            if let Err(e) = frame.pixels.horizontal_line(BAR_COLOR, Point::new(start, y), width) {
                tracing::trace!(error = %e, "bar outside buffer");
                return;
            }
        }
    }
}

impl RenderContext for ShmRenderer {
    fn resize(&self, size: Size) {
        let mut frame = lock(&self.frame);
        if frame.size == size {
            return;
        }
        tracing::debug!(width = size.width, height = size.height, "resizing shm buffers");
        frame.size = size;
        frame.pixels = PixelBuffer::new(size);
        if size.has_zero_dimension() {
            self.retire(&mut frame);
            return;
        }
        if let Err(e) = self.allocate(&mut frame, size) {
            tracing::warn!(error = %e, "could not allocate render buffers");
        }
    }

    fn attached_size(&self) -> Size {
        lock(&self.frame).size
    }

    fn swap_buffers(&self) {
        let mut frame = lock(&self.frame);
        let free = {
            let pending = lock(&self.pending);
            frame.buffers.iter().position(|(buffer, _)| !pending.contains(&buffer.id()))
        };
        let Some(index) = free else {
            tracing::trace!("all buffers held by the compositor, dropping frame");
            return;
        };

        frame.frame += 1;
        Self::paint(&mut frame);
        let Frame {
            pool, buffers, pixels, ..
        } = &mut *frame;
        let (Some(pool), (buffer, slot)) = (pool.as_mut(), &buffers[index]) else {
            return;
        };
        if let Err(e) = pool.write(*slot, pixels) {
            tracing::warn!(error = %e, "render buffer does not match the frame");
            return;
        }

        self.surface.attach(Some(buffer), 0, 0);
        self.surface.damage(0, 0, i32::MAX, i32::MAX);
        self.surface.commit();
        lock(&self.pending).attach(buffer.id());
    }

    fn set_vsync(&self, enabled: bool) {
        lock(&self.frame).vsync = enabled;
    }
}

impl Drop for ShmRenderer {
    fn drop(&mut self) {
        let mut frame = lock(&self.frame);
        self.retire(&mut frame);
    }
}
