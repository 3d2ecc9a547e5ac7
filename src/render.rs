//! Paced drawing onto a render surface
//!
//! [`RenderLoop`] is driven by the display refresh tick. Each tick draws at
//! most one pending bitmap, resizing the surface first when the bitmap's
//! dimensions changed, and releases the previously displayed bitmap right
//! after the draw. Together with the latest-wins pending slot this keeps
//! peak memory at roughly one frame in flight plus the one on screen.

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::ingest::FrameSlot;
use crate::types::{Bitmap, DecodedFrame};

/// Something bitmaps can be drawn onto.
pub trait RenderSurface: Send + 'static {
    /// Current `(width, height)`
    fn dimensions(&self) -> (u32, u32);

    /// Resize the drawing area; previous contents may be discarded
    fn resize(&mut self, width: u32, height: u32);

    /// Draw `bitmap` at the origin. The surface already matches its size.
    fn draw(&mut self, bitmap: &Bitmap);
}

impl RenderSurface for Box<dyn RenderSurface> {
    fn dimensions(&self) -> (u32, u32) {
        (**self).dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        (**self).resize(width, height)
    }

    fn draw(&mut self, bitmap: &Bitmap) {
        (**self).draw(bitmap)
    }
}

/// In-memory RGBA8 surface.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, RGBA8 rows top to bottom
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl RenderSurface for FrameBuffer {
    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![0; width as usize * height as usize * Bitmap::BYTES_PER_PIXEL];
    }

    fn draw(&mut self, bitmap: &Bitmap) {
        if bitmap.dimensions() != self.dimensions() {
            self.resize(bitmap.width(), bitmap.height());
        }
        self.pixels.copy_from_slice(bitmap.pixels());
    }
}

/// What one render tick drew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderedFrame {
    pub sequence: u64,
    pub arrived_at: Instant,
    pub width: u32,
    pub height: u32,
    /// The surface was resized before drawing
    pub resized: bool,
}

/// Draws at most one bitmap per tick.
pub struct RenderLoop<S: RenderSurface> {
    surface: S,
    pending: FrameSlot<DecodedFrame>,
    current: Option<DecodedFrame>,
    rendered: u64,
}

impl<S: RenderSurface> RenderLoop<S> {
    pub fn new(surface: S) -> Self {
        Self { surface, pending: FrameSlot::new(), current: None, rendered: 0 }
    }

    /// Hand a decoded frame to the next tick, replacing any undrawn one.
    ///
    /// Returns `true` if an undrawn frame was discarded.
    pub fn submit(&mut self, frame: DecodedFrame) -> bool {
        let sequence = frame.sequence;
        let discarded = self.pending.replace(frame);
        if discarded {
            trace!("Frame {} preempted an undrawn frame", sequence);
        }
        discarded
    }

    /// One refresh tick: draw the pending frame, if any.
    pub fn tick(&mut self) -> Option<RenderedFrame> {
        let frame = self.pending.take()?;
        let (width, height) = frame.data.dimensions();

        let resized = self.surface.dimensions() != (width, height);
        if resized {
            debug!("Resizing surface to {}x{}", width, height);
            self.surface.resize(width, height);
        }
        self.surface.draw(&frame.data);
        self.rendered += 1;

        let rendered = RenderedFrame {
            sequence: frame.sequence,
            arrived_at: frame.arrived_at,
            width,
            height,
            resized,
        };

        // Release the previous bitmap now rather than when the next one lands.
        if let Some(previous) = self.current.replace(frame) {
            drop(previous);
        }

        trace!("Frame {} drawn", rendered.sequence);
        Some(rendered)
    }

    /// Release the undrawn frame, if any. The displayed frame stays.
    pub fn discard_pending(&mut self) -> bool {
        self.pending.clear()
    }

    /// Release every bitmap this loop holds.
    pub fn release(&mut self) {
        self.pending.clear();
        self.current = None;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_occupied()
    }

    /// Frame currently on the surface
    pub fn current(&self) -> Option<&DecodedFrame> {
        self.current.as_ref()
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Frames drawn since creation
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    /// Decoded frames replaced before they could be drawn
    pub fn dropped(&self) -> u64 {
        self.pending.replaced()
    }
}
