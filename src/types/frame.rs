//! Frame types flowing through the pipeline

use std::sync::Arc;
use tokio::time::Instant;

use crate::{Result, StreamError};

/// A frame at some pipeline stage, tagged with its arrival bookkeeping.
///
/// The payload is raw compressed bytes before decode ([`RawFrame`]) and a
/// drawable [`Bitmap`] after ([`DecodedFrame`]). Dropping a frame releases
/// whatever its payload holds.
#[derive(Debug, Clone)]
pub struct Frame<T> {
    /// Stage payload
    pub data: T,

    /// Per-connection arrival counter, starting at 1
    pub sequence: u64,

    /// When the binary message was received
    pub arrived_at: Instant,
}

/// Compressed image bytes exactly as received from the socket.
pub type RawFrame = Frame<Arc<[u8]>>;

/// A frame that went through the decoder.
pub type DecodedFrame = Frame<Bitmap>;

impl RawFrame {
    /// Create a raw frame from a received binary message
    pub fn new(payload: Vec<u8>, sequence: u64, arrived_at: Instant) -> Self {
        Self { data: payload.into(), sequence, arrived_at }
    }

    /// Size of the compressed payload in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the payload, keeping arrival bookkeeping
    pub fn with_data<U>(self, data: U) -> Frame<U> {
        Frame { data, sequence: self.sequence, arrived_at: self.arrived_at }
    }
}

/// Decoded RGBA8 image, directly drawable onto a render surface.
///
/// Pixels are shared (zero-copy via Arc) so a surface may keep a reference
/// while the bitmap is displayed; the buffer is freed when the last handle
/// is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Bitmap {
    /// Bytes per RGBA8 pixel
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap an RGBA8 buffer, checking that it matches the dimensions.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * Self::BYTES_PER_PIXEL;
        if width == 0 || height == 0 {
            return Err(StreamError::decode_failed(0, format!("empty bitmap {width}x{height}")));
        }
        if pixels.len() != expected {
            return Err(StreamError::decode_failed(
                0,
                format!(
                    "pixel buffer of {} bytes does not match {}x{} RGBA ({} bytes)",
                    pixels.len(),
                    width,
                    height,
                    expected
                ),
            ));
        }
        Ok(Self { width, height, pixels: pixels.into() })
    }

    /// Solid-colour bitmap, mostly useful for placeholders and tests
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self::from_rgba(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Raw RGBA8 pixel rows, top to bottom
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Size of the pixel buffer in bytes
    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }

    #[cfg(test)]
    pub(crate) fn pixel_handle(&self) -> std::sync::Weak<[u8]> {
        Arc::downgrade(&self.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_rejects_mismatched_buffer() {
        assert!(Bitmap::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(Bitmap::from_rgba(0, 2, vec![]).is_err());
        let bitmap = Bitmap::from_rgba(2, 2, vec![0; 16]).unwrap();
        assert_eq!(bitmap.dimensions(), (2, 2));
        assert_eq!(bitmap.byte_len(), 16);
    }

    #[test]
    fn filled_bitmap_repeats_colour() {
        let bitmap = Bitmap::filled(3, 1, [1, 2, 3, 4]).unwrap();
        assert_eq!(bitmap.pixels(), &[1, 2, 3, 4, 1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn dropping_last_handle_frees_pixels() {
        let bitmap = Bitmap::filled(4, 4, [0; 4]).unwrap();
        let weak = bitmap.pixel_handle();
        let shared = bitmap.clone();
        drop(bitmap);
        assert!(weak.upgrade().is_some());
        drop(shared);
        assert!(weak.upgrade().is_none());
    }

    #[tokio::test]
    async fn with_data_keeps_bookkeeping() {
        let now = Instant::now();
        let raw = RawFrame::new(vec![1, 2, 3], 7, now);
        assert_eq!(raw.len(), 3);
        let decoded = raw.with_data(Bitmap::filled(1, 1, [0; 4]).unwrap());
        assert_eq!(decoded.sequence, 7);
        assert_eq!(decoded.arrived_at, now);
    }
}
