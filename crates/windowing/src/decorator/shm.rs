//! Shared-memory buffers for the decoration surfaces and software rendering
//!
//! One pool backs all four border buffers for the current size and scale.
//! It is replaced wholesale on every decorator reset; buffers the
//! compositor still holds stay alive in [`PendingBuffers`] until released.
//! A buffer is never written while it is pending.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::os::fd::{AsFd, OwnedFd};

use memmap2::{MmapMut, MmapOptions};
use rustix::fs::MemfdFlags;
use thiserror::Error;
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::protocol::wl_shm::{self, WlShm};
use wayland_client::protocol::wl_shm_pool::WlShmPool;
use wayland_client::{Dispatch, QueueHandle};

use crate::geometry::Size;

use super::draw::PixelBuffer;

pub const BYTES_PER_PIXEL: usize = 4;

#[derive(Error, Debug)]
pub enum ShmError {
    #[error("failed to create shared memory: {0}")]
    Create(#[source] std::io::Error),

    #[error("failed to map shared memory: {0}")]
    Map(#[source] std::io::Error),

    #[error("pool too small: {requested} bytes requested, {remaining} remaining")]
    Exhausted { requested: usize, remaining: usize },

    #[error("empty pool")]
    Empty,

    #[error("pixel buffer of {actual} bytes does not fit slot of {expected} bytes")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Bytes needed for buffers of all `sizes` at `scale`
pub fn bytes_for_sizes(sizes: &[Size], scale: i32) -> usize {
    sizes
        .iter()
        .map(|s| (*s * scale).area().max(0) as usize * BYTES_PER_PIXEL)
        .sum()
}

fn create_memfd(len: usize) -> Result<OwnedFd, ShmError> {
    let fd = rustix::fs::memfd_create("mediawin-shm", MemfdFlags::CLOEXEC)
        .map_err(|e| ShmError::Create(e.into()))?;
    rustix::fs::ftruncate(&fd, len as u64).map_err(|e| ShmError::Create(e.into()))?;
    Ok(fd)
}

/// A region of the pool holding one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub offset: usize,
    pub len: usize,
}

/// Bump allocator over a single mapped memfd
pub struct ShmPool {
    pool: WlShmPool,
    map: MmapMut,
    allocated: usize,
    // Keeps the mapping's backing file open for the pool's lifetime
    _fd: OwnedFd,
}

impl ShmPool {
    pub fn new<D>(shm: &WlShm, len: usize, qh: &QueueHandle<D>) -> Result<Self, ShmError>
    where
        D: Dispatch<WlShmPool, ()> + 'static,
    {
        if len == 0 {
            return Err(ShmError::Empty);
        }
        let fd = create_memfd(len)?;
        let map = unsafe { MmapOptions::new().len(len).map_mut(&fd) }.map_err(ShmError::Map)?;
        let pool = shm.create_pool(fd.as_fd(), len as i32, qh, ());
        tracing::debug!(len, "created shm pool");
        Ok(Self {
            pool,
            map,
            allocated: 0,
            _fd: fd,
        })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Carve an ARGB8888 buffer of `size` pixels out of the pool
    pub fn allocate<D>(&mut self, size: Size, qh: &QueueHandle<D>) -> Result<(WlBuffer, Slot), ShmError>
    where
        D: Dispatch<WlBuffer, ()> + 'static,
    {
        let len = size.area().max(0) as usize * BYTES_PER_PIXEL;
        let remaining = self.map.len() - self.allocated;
        if len > remaining {
            return Err(ShmError::Exhausted {
                requested: len,
                remaining,
            });
        }
        let slot = Slot {
            offset: self.allocated,
            len,
        };
        let buffer = self.pool.create_buffer(
            slot.offset as i32,
            size.width,
            size.height,
            size.width * BYTES_PER_PIXEL as i32,
            wl_shm::Format::Argb8888,
            qh,
            (),
        );
        self.allocated += len;
        Ok((buffer, slot))
    }

    /// Copy `pixels` into `slot` as little-endian ARGB8888
    pub fn write(&mut self, slot: Slot, pixels: &PixelBuffer) -> Result<(), ShmError> {
        if pixels.byte_len() != slot.len {
            return Err(ShmError::SizeMismatch {
                expected: slot.len,
                actual: pixels.byte_len(),
            });
        }
        pixels.write_le_bytes(&mut self.map[slot.offset..slot.offset + slot.len]);
        Ok(())
    }
}

impl Drop for ShmPool {
    fn drop(&mut self) {
        // Buffers created from the pool stay valid after this
        self.pool.destroy();
    }
}

/// Buffers the compositor may still be reading from
///
/// A buffer becomes pending when it is attached and stops being pending on
/// `wl_buffer.release`. Its owner may retire it at any time; a retired
/// buffer is handed back for destruction only once it is no longer pending.
/// Keyed by buffer identity so attaching the same buffer twice keeps one
/// entry.
#[derive(Debug)]
pub struct PendingBuffers<K, B> {
    pending: HashSet<K>,
    retired: HashMap<K, B>,
}

impl<K: Hash + Eq, B> Default for PendingBuffers<K, B> {
    fn default() -> Self {
        Self {
            pending: HashSet::new(),
            retired: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq, B> PendingBuffers<K, B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffer was attached; returns false when it was already pending
    pub fn attach(&mut self, key: K) -> bool {
        self.pending.insert(key)
    }

    /// Compositor `release`; returns the buffer if its owner already retired it
    pub fn release(&mut self, key: &K) -> Option<B> {
        self.pending.remove(key);
        self.retired.remove(key)
    }

    /// The owner is done with `buffer`; returns it if it can be destroyed now
    pub fn retire(&mut self, key: K, buffer: B) -> Option<B> {
        if self.pending.contains(&key) {
            self.retired.insert(key, buffer);
            None
        } else {
            Some(buffer)
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    /// Position of the first of `keys` that is safe to draw into
    pub fn first_free<'a>(&self, keys: impl IntoIterator<Item = &'a K>) -> Option<usize>
    where
        K: 'a,
    {
        keys.into_iter().position(|key| !self.pending.contains(key))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_size_covers_scaled_surfaces() {
        let sizes = [
            Size::new(110, 38),
            Size::new(5, 600),
            Size::new(110, 5),
            Size::new(5, 600),
        ];
        let at_1 = bytes_for_sizes(&sizes, 1);
        assert_eq!(at_1, (110 * 38 + 5 * 600 + 110 * 5 + 5 * 600) * 4);
        assert_eq!(bytes_for_sizes(&sizes, 2), at_1 * 4);
    }

    #[test]
    fn pending_buffers_keyed_by_identity() {
        let mut pending: PendingBuffers<u32, &str> = PendingBuffers::new();
        assert!(pending.attach(1));
        assert!(!pending.attach(1));
        assert!(pending.attach(2));
        assert_eq!(pending.len(), 2);

        // Released but still owned: nothing to destroy
        assert_eq!(pending.release(&1), None);
        assert!(!pending.contains(&1));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn retired_buffer_destroyed_after_release() {
        let mut pending: PendingBuffers<u32, &str> = PendingBuffers::new();
        pending.attach(1);
        assert_eq!(pending.retire(1, "top"), None);
        assert_eq!(pending.release(&1), Some("top"));
        assert_eq!(pending.release(&1), None);

        // Not attached at all: destroy right away
        assert_eq!(pending.retire(2, "left"), Some("left"));
    }

    #[test]
    fn first_free_skips_buffers_still_read() {
        let mut pending: PendingBuffers<u32, &str> = PendingBuffers::new();
        assert_eq!(pending.first_free(&[1, 5]), Some(0));

        pending.attach(1);
        assert_eq!(pending.first_free(&[1, 5]), Some(1));

        pending.attach(5);
        assert_eq!(pending.first_free(&[1, 5]), None);

        pending.release(&5);
        assert_eq!(pending.first_free(&[1, 5]), Some(1));
    }

    #[test]
    fn memfd_has_requested_length() {
        let fd = create_memfd(4096).unwrap();
        let map = unsafe { MmapOptions::new().len(4096).map_mut(&fd) }.unwrap();
        assert_eq!(map.len(), 4096);
    }
}
