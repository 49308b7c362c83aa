//! Wayland implementations of the window system's surface collaborators

use wayland_client::protocol::wl_compositor::WlCompositor;
use wayland_client::protocol::wl_shm::WlShm;
use wayland_client::protocol::wl_subcompositor::WlSubcompositor;
use wayland_client::protocol::wl_subsurface::WlSubsurface;
use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::protocol::wl_buffer::WlBuffer;
use wayland_client::{Proxy, QueueHandle};
use wayland_protocols::wp::idle_inhibit::zv1::client::zwp_idle_inhibit_manager_v1::ZwpIdleInhibitManagerV1;
use wayland_protocols::wp::idle_inhibit::zv1::client::zwp_idle_inhibitor_v1::ZwpIdleInhibitorV1;

use crate::cursor::CursorManager;
use crate::decorator::draw::PixelBuffer;
use crate::decorator::shm::{bytes_for_sizes, ShmError, ShmPool, Slot};
use crate::decorator::{BorderSurface, DecorationLayout, DecorationSurfaces};
use crate::geometry::Size;
use crate::winsystem::{CursorControl, WindowSurface};

use super::{lock, BackendState, SharedPendingBuffers, SharedPointers, SurfaceRole};

/// The main `wl_surface`
pub struct MainSurface {
    surface: WlSurface,
    compositor: WlCompositor,
    idle_inhibit: Option<ZwpIdleInhibitManagerV1>,
    inhibitor: Option<ZwpIdleInhibitorV1>,
    qh: QueueHandle<BackendState>,
}

impl MainSurface {
    pub fn new(
        surface: &WlSurface,
        compositor: &WlCompositor,
        idle_inhibit: Option<ZwpIdleInhibitManagerV1>,
        qh: &QueueHandle<BackendState>,
    ) -> Self {
        Self {
            surface: surface.clone(),
            compositor: compositor.clone(),
            idle_inhibit,
            inhibitor: None,
            qh: qh.clone(),
        }
    }
}

impl WindowSurface for MainSurface {
    fn set_buffer_scale(&mut self, scale: i32) {
        if self.surface.version() >= 3 {
            self.surface.set_buffer_scale(scale);
        }
    }

    fn set_opaque_region(&mut self, size: Size) {
        let region = self.compositor.create_region(&self.qh, ());
        region.add(0, 0, size.width, size.height);
        self.surface.set_opaque_region(Some(&region));
        region.destroy();
    }

    fn inhibit_idle(&mut self, inhibit: bool) -> bool {
        let Some(manager) = self.idle_inhibit.as_ref() else {
            return false;
        };
        match (inhibit, self.inhibitor.take()) {
            (true, None) => self.inhibitor = Some(manager.create_inhibitor(&self.surface, &self.qh, ())),
            (true, Some(inhibitor)) => self.inhibitor = Some(inhibitor),
            (false, Some(inhibitor)) => inhibitor.destroy(),
            (false, None) => {}
        }
        true
    }
}

impl Drop for MainSurface {
    fn drop(&mut self) {
        if let Some(inhibitor) = self.inhibitor.take() {
            inhibitor.destroy();
        }
        self.surface.destroy();
    }
}

/// Pointer cursor for every seat, through one cursor surface
pub struct WaylandCursor {
    manager: CursorManager,
    pointers: SharedPointers,
}

impl WaylandCursor {
    pub fn new(manager: CursorManager, pointers: SharedPointers) -> Self {
        Self { manager, pointers }
    }
}

impl CursorControl for WaylandCursor {
    fn set_theme_scale(&mut self, scale: i32) {
        self.manager.set_scale(scale);
    }

    fn set_cursor(&mut self, seat: u32, serial: u32, name: Option<&'static str>) {
        let Some(pointer) = lock(&self.pointers).get(&seat).cloned() else {
            return;
        };
        match name {
            Some(name) => self.manager.set_named(&pointer, serial, name),
            None => self.manager.hide(&pointer, serial),
        }
    }
}

struct BorderSubsurface {
    surface: WlSurface,
    subsurface: WlSubsurface,
}

struct DecorationBuffer {
    buffer: WlBuffer,
    slot: Slot,
}

/// Copies of each border buffer, so a repaint can use one while the
/// compositor still reads the other
const BUFFERS_PER_SURFACE: usize = 2;

/// The four border subsurfaces of the main surface
pub struct WaylandDecorationSurfaces {
    compositor: WlCompositor,
    subcompositor: WlSubcompositor,
    shm: WlShm,
    parent: WlSurface,
    qh: QueueHandle<BackendState>,
    pending: SharedPendingBuffers,
    /// Created on first reconfigure, indexed by [`BorderSurface::index`]
    borders: Vec<BorderSubsurface>,
    pool: Option<ShmPool>,
    /// [`BUFFERS_PER_SURFACE`] copies of the four buffers, copy after copy
    buffers: Vec<DecorationBuffer>,
    /// Buffer pixels
    sizes: [Size; 4],
}

impl WaylandDecorationSurfaces {
    pub fn new(
        compositor: &WlCompositor,
        subcompositor: &WlSubcompositor,
        shm: &WlShm,
        parent: &WlSurface,
        qh: &QueueHandle<BackendState>,
        pending: SharedPendingBuffers,
    ) -> Self {
        Self {
            compositor: compositor.clone(),
            subcompositor: subcompositor.clone(),
            shm: shm.clone(),
            parent: parent.clone(),
            qh: qh.clone(),
            pending,
            borders: Vec::new(),
            pool: None,
            buffers: Vec::new(),
            sizes: [Size::default(); 4],
        }
    }

    fn ensure_borders(&mut self) {
        if !self.borders.is_empty() {
            return;
        }
        self.borders = BorderSurface::ALL
            .iter()
            .map(|&border| {
                let surface = self.compositor.create_surface(&self.qh, SurfaceRole::Decoration(border));
                let subsurface = self.subcompositor.get_subsurface(&surface, &self.parent, &self.qh, ());
                BorderSubsurface { surface, subsurface }
            })
            .collect();
    }

    /// Hand the current buffers to the pending set; the ones not in use go now
    fn retire_buffers(&mut self) {
        let mut pending = lock(&self.pending);
        for DecorationBuffer { buffer, .. } in self.buffers.drain(..) {
            if let Some(buffer) = pending.retire(buffer.id(), buffer) {
                buffer.destroy();
            }
        }
    }

    fn allocate_buffers(&mut self) -> Result<(), ShmError> {
        self.retire_buffers();
        self.pool = None;
        let sizes: Vec<Size> = self
            .sizes
            .iter()
            .copied()
            .cycle()
            .take(self.sizes.len() * BUFFERS_PER_SURFACE)
            .collect();
        let mut pool = ShmPool::new(&self.shm, bytes_for_sizes(&sizes, 1), &self.qh)?;
        for size in sizes {
            let (buffer, slot) = pool.allocate(size, &self.qh)?;
            self.buffers.push(DecorationBuffer { buffer, slot });
        }
        self.pool = Some(pool);
        Ok(())
    }

    /// Index into `buffers` of a released copy for every border, if each has one
    fn free_copies(&self) -> Option<Vec<usize>> {
        let stride = self.borders.len();
        if stride == 0 || self.buffers.len() != stride * BUFFERS_PER_SURFACE {
            return None;
        }
        let pending = lock(&self.pending);
        (0..stride)
            .map(|border| {
                let ids: Vec<_> = (0..BUFFERS_PER_SURFACE)
                    .map(|copy| self.buffers[copy * stride + border].buffer.id())
                    .collect();
                pending.first_free(&ids).map(|copy| copy * stride + border)
            })
            .collect()
    }
}

impl DecorationSurfaces for WaylandDecorationSurfaces {
    fn reconfigure(&mut self, layout: &DecorationLayout) {
        self.ensure_borders();
        for (border, surface_layout) in self.borders.iter().zip(layout.surfaces.iter()) {
            border
                .subsurface
                .set_position(surface_layout.position.x, surface_layout.position.y);
            if border.surface.version() >= 3 {
                border.surface.set_buffer_scale(layout.scale);
            }
        }
        self.sizes = layout.buffer_sizes();
        if let Err(e) = self.allocate_buffers() {
            tracing::warn!(error = %e, "could not allocate decoration buffers");
        }
    }

    fn commit(&mut self, pixels: &[PixelBuffer; 4]) {
        // Never draw into a buffer the compositor may still be reading
        let choice = match self.free_copies() {
            Some(choice) => choice,
            None => {
                tracing::debug!("no released decoration buffers, allocating new ones");
                if let Err(e) = self.allocate_buffers() {
                    tracing::warn!(error = %e, "could not allocate decoration buffers");
                    return;
                }
                match self.free_copies() {
                    Some(choice) => choice,
                    None => return,
                }
            }
        };
        let Some(pool) = self.pool.as_mut() else {
            return;
        };

        let mut pending = lock(&self.pending);
        for ((border, index), pixels) in self.borders.iter().zip(choice).zip(pixels) {
            let buffer = &self.buffers[index];
            if let Err(e) = pool.write(buffer.slot, pixels) {
                tracing::warn!(error = %e, "decoration buffer does not match its surface");
                continue;
            }
            border.surface.attach(Some(&buffer.buffer), 0, 0);
            border.surface.damage(0, 0, i32::MAX, i32::MAX);
            border.surface.commit();
            pending.attach(buffer.buffer.id());
        }
    }

    fn hide(&mut self) {
        for border in &self.borders {
            border.surface.attach(None, 0, 0);
            border.surface.commit();
        }
        self.retire_buffers();
        self.pool = None;
    }
}

impl Drop for WaylandDecorationSurfaces {
    fn drop(&mut self) {
        self.retire_buffers();
        for border in self.borders.drain(..) {
            border.subsurface.destroy();
            border.surface.destroy();
        }
    }
}
