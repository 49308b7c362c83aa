//! Client-side window decorations
//!
//! Four border surfaces are positioned around the main surface as
//! subsurfaces:
//!
//! ```text
//! +-------------------------------+
//! |              TOP              |
//! +---+-----------------------+---+
//! | L |                       | R |
//! | E |     main surface      | I |
//! | F |                       | G |
//! | T |                       | H |
//! |   |                       | T |
//! +---+-----------------------+---+
//! |            BOTTOM             |
//! +-------------------------------+
//! ```
//!
//! Top and bottom span the main surface plus both side borders, left and
//! right only the main surface height. One large surface behind the main
//! surface would waste memory on big high-density outputs.
//!
//! [`Decorator`] owns geometry, painting and hit testing. Creating and
//! committing the actual protocol objects is behind [`DecorationSurfaces`].

pub mod draw;
pub mod shm;
pub mod title;

use std::collections::HashMap;

use crate::config::DecorationConfig;
use crate::geometry::{Point, PointF, Rect, Size};
use crate::seat::pointer::{BTN_LEFT, BTN_RIGHT};
use crate::shell_surface::{ResizeEdge, ShellState};

use draw::{DrawError, PixelBuffer};
use title::TitleRenderer;

/// Cursor shown over decorations away from any resize edge
pub const DEFAULT_CURSOR: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderSurface {
    Top,
    Right,
    Bottom,
    Left,
}

impl BorderSurface {
    pub const ALL: [BorderSurface; 4] = [
        BorderSurface::Top,
        BorderSurface::Right,
        BorderSurface::Bottom,
        BorderSurface::Left,
    ];

    pub fn index(self) -> usize {
        match self {
            BorderSurface::Top => 0,
            BorderSurface::Right => 1,
            BorderSurface::Bottom => 2,
            BorderSurface::Left => 3,
        }
    }
}

/// Decoration dimensions in surface coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationMetrics {
    pub border_width: i32,
    pub top_bar_height: i32,
    pub resize_corner_distance: i32,
    pub buttons_edge_distance: i32,
    pub button_inner_separation: i32,
    pub button_size: i32,
}

impl From<&DecorationConfig> for DecorationMetrics {
    fn from(config: &DecorationConfig) -> Self {
        Self {
            border_width: config.border_width,
            top_bar_height: config.top_bar_height,
            resize_corner_distance: config.resize_corner_distance,
            buttons_edge_distance: config.buttons_edge_distance,
            button_inner_separation: config.button_inner_separation,
            button_size: config.button_size,
        }
    }
}

impl Default for DecorationMetrics {
    fn default() -> Self {
        Self::from(&DecorationConfig::default())
    }
}

impl DecorationMetrics {
    /// The same metrics in buffer pixels
    pub fn scaled(&self, scale: i32) -> Self {
        Self {
            border_width: self.border_width * scale,
            top_bar_height: self.top_bar_height * scale,
            resize_corner_distance: self.resize_corner_distance * scale,
            buttons_edge_distance: self.buttons_edge_distance * scale,
            button_inner_separation: self.button_inner_separation * scale,
            button_size: self.button_size * scale,
        }
    }

    /// Total size added around the main surface
    pub fn decoration_size(&self) -> Size {
        Size::new(
            2 * self.border_width,
            2 * self.border_width + self.top_bar_height,
        )
    }

    pub fn surface_size(&self, surface: BorderSurface, main: Size) -> Size {
        let b = self.border_width;
        match surface {
            BorderSurface::Top => Size::new(main.width + 2 * b, self.top_bar_height + b),
            BorderSurface::Right | BorderSurface::Left => Size::new(b, main.height),
            BorderSurface::Bottom => Size::new(main.width + 2 * b, b),
        }
    }

    /// Subsurface position relative to the main surface origin
    pub fn surface_position(&self, surface: BorderSurface, main: Size) -> Point {
        let b = self.border_width;
        match surface {
            BorderSurface::Top => Point::new(-b, -(b + self.top_bar_height)),
            BorderSurface::Right => Point::new(main.width, 0),
            BorderSurface::Bottom => Point::new(-b, main.height),
            BorderSurface::Left => Point::new(-b, 0),
        }
    }
}

/// Edge grabbed when pressing at `position` inside a border surface
///
/// `None` inside the title bar away from the edges.
pub fn resize_edge_for_position(
    surface: BorderSurface,
    surface_size: Size,
    position: Point,
    corner_distance: i32,
) -> Option<ResizeEdge> {
    let near_left = position.x <= corner_distance;
    let near_right = position.x >= surface_size.width - corner_distance;
    let near_bottom = position.y >= surface_size.height - corner_distance;

    match surface {
        BorderSurface::Top => {
            if position.y <= corner_distance {
                Some(if near_left {
                    ResizeEdge::TopLeft
                } else if near_right {
                    ResizeEdge::TopRight
                } else {
                    ResizeEdge::Top
                })
            } else if near_left {
                Some(ResizeEdge::Left)
            } else if near_right {
                Some(ResizeEdge::Right)
            } else {
                None
            }
        }
        BorderSurface::Right => Some(if near_bottom {
            ResizeEdge::BottomRight
        } else {
            ResizeEdge::Right
        }),
        BorderSurface::Bottom => Some(if near_left {
            ResizeEdge::BottomLeft
        } else if near_right {
            ResizeEdge::BottomRight
        } else {
            ResizeEdge::Bottom
        }),
        BorderSurface::Left => Some(if near_bottom {
            ResizeEdge::BottomLeft
        } else {
            ResizeEdge::Left
        }),
    }
}

/// Cursor name from the XDG cursor spec
pub fn cursor_for_resize_edge(edge: ResizeEdge) -> &'static str {
    match edge {
        ResizeEdge::Top => "n-resize",
        ResizeEdge::Bottom => "s-resize",
        ResizeEdge::Left => "w-resize",
        ResizeEdge::TopLeft => "nw-resize",
        ResizeEdge::BottomLeft => "sw-resize",
        ResizeEdge::Right => "e-resize",
        ResizeEdge::TopRight => "ne-resize",
        ResizeEdge::BottomRight => "se-resize",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationButton {
    Minimize,
    Maximize,
    Close,
}

/// Button rectangles in the top surface, laid out right to left
///
/// When the surface is too narrow the buttons are clamped to x = 0 and
/// end up on top of each other.
pub fn button_layout(top_width: i32, metrics: &DecorationMetrics) -> [(DecorationButton, Rect); 3] {
    let b = metrics.border_width;
    let y = b + metrics.buttons_edge_distance;
    let mut x = top_width - b;
    let mut place = || {
        x = (x - (metrics.buttons_edge_distance + metrics.button_size)).max(0);
        Rect::new(
            Point::new(x, y),
            Point::new(x + metrics.button_size, y + metrics.button_size),
        )
    };
    let close = place();
    let maximize = place();
    let minimize = place();
    [
        (DecorationButton::Minimize, minimize),
        (DecorationButton::Maximize, maximize),
        (DecorationButton::Close, close),
    ]
}

/// What a click on the decorations asks the window to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationAction {
    Move { serial: u32 },
    Resize { serial: u32, edge: ResizeEdge },
    Minimize,
    Maximize,
    Close,
    /// `position` is relative to the main surface origin
    ContextMenu { serial: u32, position: Point },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub surface: BorderSurface,
    /// Surface coordinates; the buffer is this times the scale
    pub size: Size,
    pub position: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecorationLayout {
    pub main_size: Size,
    pub scale: i32,
    pub surfaces: [SurfaceLayout; 4],
}

impl DecorationLayout {
    pub fn new(metrics: &DecorationMetrics, main_size: Size, scale: i32) -> Self {
        Self {
            main_size,
            scale,
            surfaces: BorderSurface::ALL.map(|surface| SurfaceLayout {
                surface,
                size: metrics.surface_size(surface, main_size),
                position: metrics.surface_position(surface, main_size),
            }),
        }
    }

    pub fn buffer_sizes(&self) -> [Size; 4] {
        self.surfaces.map(|s| s.size * self.scale)
    }
}

/// Protocol side of the decorations
pub trait DecorationSurfaces: Send {
    /// Create or move the subsurfaces and size their buffers for `layout`
    fn reconfigure(&mut self, layout: &DecorationLayout);

    /// Show `buffers`, indexed by [`BorderSurface::index`]
    fn commit(&mut self, buffers: &[PixelBuffer; 4]);

    /// Make all border surfaces invisible
    fn hide(&mut self);
}

/// Result of [`Decorator::set_state`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Unchanged,
    /// Same buffers, new colors
    Repainted,
    /// Surfaces and buffers were rebuilt
    Reset { scale_changed: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRequest {
    pub serial: u32,
    pub name: &'static str,
}

#[derive(Debug, Default)]
struct DecorationSeat {
    surface: Option<BorderSurface>,
    position: PointF,
    enter_serial: u32,
    cursor: Option<&'static str>,
}

#[derive(Debug, Clone, Copy)]
struct Colors {
    border: u32,
    active: u32,
    inactive: u32,
}

pub struct Decorator {
    metrics: DecorationMetrics,
    colors: Colors,
    surfaces: Option<Box<dyn DecorationSurfaces>>,
    configured: bool,
    main_size: Size,
    scale: i32,
    state: ShellState,
    title: String,
    title_renderer: Option<TitleRenderer>,
    buffers: Option<[PixelBuffer; 4]>,
    seats: HashMap<u32, DecorationSeat>,
}

impl Decorator {
    /// `surfaces` is `None` when the compositor cannot host decorations
    /// (legacy shell or no subcompositor)
    pub fn new(config: &DecorationConfig, surfaces: Option<Box<dyn DecorationSurfaces>>) -> Self {
        Self {
            metrics: DecorationMetrics::from(config),
            colors: Colors {
                border: config.border_color,
                active: config.button_color_active,
                inactive: config.button_color_inactive,
            },
            surfaces,
            configured: false,
            main_size: Size::default(),
            scale: 1,
            state: ShellState::empty(),
            title: String::new(),
            title_renderer: None,
            buffers: None,
            seats: HashMap::new(),
        }
    }

    pub fn with_title_renderer(mut self, renderer: Option<TitleRenderer>) -> Self {
        self.title_renderer = renderer;
        self
    }

    pub fn metrics(&self) -> &DecorationMetrics {
        &self.metrics
    }

    pub fn is_available(&self) -> bool {
        self.surfaces.is_some()
    }

    pub fn state_has_decorations(&self, state: ShellState) -> bool {
        self.is_available() && !state.contains(ShellState::FULLSCREEN)
    }

    pub fn is_active(&self) -> bool {
        self.state_has_decorations(self.state)
    }

    pub fn decoration_size(&self) -> Size {
        self.metrics.decoration_size()
    }

    /// Content size for a configured window size
    ///
    /// Dimensions smaller than the decorations clamp to 0, so
    /// [`Self::calculate_full_surface_size`] only inverts this for sizes at
    /// least as large as [`Self::decoration_size`]. A window that small has
    /// nothing to render into, and the decorations are hidden.
    pub fn calculate_main_surface_size(&self, size: Size, state: ShellState) -> Size {
        if self.state_has_decorations(state) {
            let main = size - self.decoration_size();
            Size::new(main.width.max(0), main.height.max(0))
        } else {
            size
        }
    }

    /// Window size including decorations for a content size
    pub fn calculate_full_surface_size(&self, size: Size, state: ShellState) -> Size {
        if self.state_has_decorations(state) {
            size + self.decoration_size()
        } else {
            size
        }
    }

    pub fn main_surface_size(&self) -> Size {
        self.main_size
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub fn buffers(&self) -> Option<&[PixelBuffer; 4]> {
        self.buffers.as_ref()
    }

    pub fn set_title(&mut self, title: &str) {
        if self.title == title {
            return;
        }
        self.title = title.to_string();
        if self.buffers.is_some() {
            self.repaint();
        }
    }

    /// Apply a new window size (including decorations), scale and state
    ///
    /// Buffers are rebuilt only when the content size, the scale or
    /// whether decorations are shown changes.
    pub fn set_state(&mut self, size: Size, scale: i32, state: ShellState) -> StateChange {
        let main_size = self.calculate_main_surface_size(size, state);
        if self.configured && main_size == self.main_size && scale == self.scale && state == self.state
        {
            return StateChange::Unchanged;
        }

        let was_active = self.configured && self.is_active();
        let scale_changed = self.configured && scale != self.scale;
        let geometry_changed = !self.configured || main_size != self.main_size || scale_changed;
        self.state = state;

        tracing::debug!(
            width = size.width,
            height = size.height,
            scale,
            main_width = main_size.width,
            main_height = main_size.height,
            active = self.is_active(),
            "decorator state"
        );

        if geometry_changed || was_active != self.is_active() {
            if scale_changed {
                tracing::debug!(scale, "buffer scale changed, cursors need reloading");
            }
            self.configured = true;
            self.main_size = main_size;
            self.scale = scale;
            self.reset();
            StateChange::Reset { scale_changed }
        } else if self.is_active() {
            self.repaint();
            StateChange::Repainted
        } else {
            StateChange::Unchanged
        }
    }

    fn button_color(&self) -> u32 {
        if self.state.contains(ShellState::ACTIVATED) {
            self.colors.active
        } else {
            self.colors.inactive
        }
    }

    fn reset(&mut self) {
        let visible = self.is_active() && !self.main_size.has_zero_dimension();
        let Some(surfaces) = self.surfaces.as_mut() else {
            return;
        };
        if !visible {
            self.buffers = None;
            surfaces.hide();
            return;
        }

        let layout = DecorationLayout::new(&self.metrics, self.main_size, self.scale);
        surfaces.reconfigure(&layout);
        self.buffers = Some(layout.buffer_sizes().map(PixelBuffer::new));
        self.repaint();
    }

    fn repaint(&mut self) {
        let button_color = self.button_color();
        let metrics = self.metrics.scaled(self.scale);
        let (Some(buffers), Some(surfaces)) = (self.buffers.as_mut(), self.surfaces.as_mut()) else {
            return;
        };
        let title = self
            .title_renderer
            .as_mut()
            .map(|renderer| (renderer, self.title.as_str()));

        match paint(buffers, &metrics, self.colors.border, button_color, title, self.scale) {
            Ok(()) => surfaces.commit(buffers),
            Err(e) => tracing::warn!(error = %e, "failed to paint decorations"),
        }
    }

    fn seat(&mut self, seat: u32) -> &mut DecorationSeat {
        self.seats.entry(seat).or_default()
    }

    pub fn pointer_enter(
        &mut self,
        seat: u32,
        serial: u32,
        surface: BorderSurface,
        position: PointF,
    ) -> Option<CursorRequest> {
        let state = self.seat(seat);
        state.surface = Some(surface);
        state.enter_serial = serial;
        state.position = position;
        self.update_cursor(seat)
    }

    pub fn pointer_leave(&mut self, seat: u32) {
        let state = self.seat(seat);
        state.surface = None;
        // Forces setting the cursor again on the next enter
        state.cursor = None;
    }

    pub fn pointer_motion(&mut self, seat: u32, position: PointF) -> Option<CursorRequest> {
        let state = self.seat(seat);
        state.surface?;
        state.position = position;
        self.update_cursor(seat)
    }

    pub fn pointer_button(
        &mut self,
        seat: u32,
        serial: u32,
        button: u32,
        pressed: bool,
    ) -> Option<DecorationAction> {
        if !pressed {
            return None;
        }
        let state = self.seats.get(&seat)?;
        let surface = state.surface?;
        self.classify_click(surface, serial, button, state.position.to_point())
    }

    pub fn touch_down(
        &self,
        serial: u32,
        surface: BorderSurface,
        position: PointF,
    ) -> Option<DecorationAction> {
        self.classify_click(surface, serial, BTN_LEFT, position.to_point())
    }

    pub fn remove_seat(&mut self, seat: u32) {
        self.seats.remove(&seat);
    }

    /// Cursors to set again after the cursor theme was reloaded
    pub fn refresh_cursors(&mut self) -> Vec<(u32, CursorRequest)> {
        let seats: Vec<u32> = self.seats.keys().copied().collect();
        seats
            .into_iter()
            .filter_map(|seat| {
                self.seat(seat).cursor = None;
                self.update_cursor(seat).map(|request| (seat, request))
            })
            .collect()
    }

    fn update_cursor(&mut self, seat: u32) -> Option<CursorRequest> {
        let metrics = self.metrics;
        let main_size = self.main_size;
        let state = self.seats.get_mut(&seat)?;
        let surface = state.surface?;

        let name = resize_edge_for_position(
            surface,
            metrics.surface_size(surface, main_size),
            state.position.to_point(),
            metrics.resize_corner_distance,
        )
        .map(cursor_for_resize_edge)
        .unwrap_or(DEFAULT_CURSOR);

        if state.cursor == Some(name) {
            return None;
        }
        state.cursor = Some(name);
        Some(CursorRequest {
            serial: state.enter_serial,
            name,
        })
    }

    /// Decide what a press at `position` (surface coordinates) does
    pub fn classify_click(
        &self,
        surface: BorderSurface,
        serial: u32,
        button: u32,
        position: Point,
    ) -> Option<DecorationAction> {
        let metrics = &self.metrics;
        match button {
            BTN_LEFT => {
                let surface_size = metrics.surface_size(surface, self.main_size);
                if let Some(edge) = resize_edge_for_position(
                    surface,
                    surface_size,
                    position,
                    metrics.resize_corner_distance,
                ) {
                    return Some(DecorationAction::Resize { serial, edge });
                }
                let hit = button_layout(surface_size.width, metrics)
                    .into_iter()
                    .find(|(_, rect)| rect.contains(position));
                Some(match hit {
                    Some((DecorationButton::Minimize, _)) => DecorationAction::Minimize,
                    Some((DecorationButton::Maximize, _)) => DecorationAction::Maximize,
                    Some((DecorationButton::Close, _)) => DecorationAction::Close,
                    None => DecorationAction::Move { serial },
                })
            }
            BTN_RIGHT if surface == BorderSurface::Top => Some(DecorationAction::ContextMenu {
                serial,
                position: position
                    - Point::new(
                        metrics.border_width,
                        metrics.border_width + metrics.top_bar_height,
                    ),
            }),
            _ => None,
        }
    }
}

/// Paint all border buffers; `metrics` are already scaled to buffer pixels
fn paint(
    buffers: &mut [PixelBuffer; 4],
    metrics: &DecorationMetrics,
    border_color: u32,
    color: u32,
    title: Option<(&mut TitleRenderer, &str)>,
    scale: i32,
) -> Result<(), DrawError> {
    let b = metrics.border_width;
    for buffer in buffers.iter_mut() {
        buffer.fill(border_color);
    }

    let [top, right, bottom, left] = buffers;
    let top_size = top.size();

    // Inner outline around the window
    top.horizontal_line(color, Point::new(b - 1, b - 1), top_size.width - 2 * b + 2)?;
    top.vertical_line(color, Point::new(b - 1, b - 1), top_size.height - b + 1)?;
    top.vertical_line(
        color,
        Point::new(top_size.width - b, b - 1),
        top_size.height - b + 1,
    )?;
    let left_height = left.size().height;
    left.vertical_line(color, Point::new(b - 1, 0), left_height)?;
    let right_height = right.size().height;
    right.vertical_line(color, Point::new(0, 0), right_height)?;
    let bottom_width = bottom.size().width;
    bottom.horizontal_line(color, Point::new(b - 1, 0), bottom_width - 2 * b + 2)?;
    // Separator between title bar and content
    top.horizontal_line(
        color,
        Point::new(b - 1, top_size.height - 1),
        top_size.width - 2 * b + 2,
    )?;

    let buttons = button_layout(top_size.width, metrics);
    for (button, rect) in buttons {
        draw_button(top, button, rect, metrics.button_inner_separation, color)?;
    }

    if let Some((renderer, text)) = title {
        let edge = metrics.buttons_edge_distance;
        let text_end = buttons.iter().map(|(_, r)| r.p1.x).min().unwrap_or(top_size.width) - edge;
        let area = Rect::new(
            Point::new(b + edge, b),
            Point::new(text_end, top_size.height - 1),
        );
        if area.width() > 0 && !text.is_empty() {
            renderer.draw(top, text, area, color, scale);
        }
    }

    Ok(())
}

fn draw_button(
    buffer: &mut PixelBuffer,
    button: DecorationButton,
    rect: Rect,
    inner: i32,
    color: u32,
) -> Result<(), DrawError> {
    buffer.rectangle(color, rect)?;
    let symbol_width = rect.width() - 2 * inner;
    match button {
        DecorationButton::Minimize => buffer.horizontal_line(
            color,
            rect.p1 + Point::new(inner, rect.height() - inner - 1),
            symbol_width,
        ),
        DecorationButton::Maximize => {
            buffer.rectangle(
                color,
                Rect::new(rect.p1 + Point::new(inner, inner), rect.p2 - Point::new(inner, inner)),
            )?;
            buffer.horizontal_line(color, rect.p1 + Point::new(inner, inner + 1), symbol_width)
        }
        DecorationButton::Close => {
            let stride = buffer.size().width as usize;
            buffer.line_with_stride(
                color,
                rect.p1 + Point::new(inner, inner),
                symbol_width,
                stride + 1,
            )?;
            buffer.line_with_stride(
                color,
                rect.p1 + Point::new(rect.width() - inner - 1, inner),
                symbol_width,
                stride - 1,
            )
        }
    }
}
