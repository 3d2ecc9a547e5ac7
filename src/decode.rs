//! Frame decoding off the receive path
//!
//! Decoding a compressed image is the one expensive step between the socket
//! and the surface. [`FrameDecoder`] runs it on tokio's blocking pool so the
//! event loop keeps receiving messages, and holds at most one decode in
//! flight. A payload that fails to decode is dropped; the next frame is
//! decoded as usual.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{trace, warn};

use crate::types::{Bitmap, DecodedFrame, Frame, RawFrame};
use crate::{Result, StreamError};

/// Error type returned by [`Decode`] implementations
pub type DecodeFailure = Box<dyn std::error::Error + Send + Sync>;

/// Turns one compressed payload into a drawable bitmap.
///
/// Implementations run on a blocking thread and may take as long as the
/// codec needs.
pub trait Decode: Send + Sync + 'static {
    fn decode(&self, payload: &[u8]) -> std::result::Result<Bitmap, DecodeFailure>;
}

/// Decoder backed by the `image` crate (JPEG, PNG and WebP, detected from
/// the payload's magic bytes).
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl Decode for ImageDecoder {
    fn decode(&self, payload: &[u8]) -> std::result::Result<Bitmap, DecodeFailure> {
        let rgba = image::load_from_memory(payload)?.into_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Bitmap::from_rgba(width, height, rgba.into_raw())?)
    }
}

struct InFlight {
    sequence: u64,
    arrived_at: Instant,
    task: JoinHandle<std::result::Result<Bitmap, DecodeFailure>>,
}

/// Runs at most one decode at a time on the blocking pool.
pub struct FrameDecoder {
    decoder: Arc<dyn Decode>,
    max_frame_bytes: usize,
    in_flight: Option<InFlight>,
    decoded: u64,
    failed: u64,
}

impl FrameDecoder {
    pub fn new(decoder: Arc<dyn Decode>, max_frame_bytes: usize) -> Self {
        Self { decoder, max_frame_bytes, in_flight: None, decoded: 0, failed: 0 }
    }

    /// Whether a decode is currently running
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Start decoding `frame`.
    ///
    /// Oversized payloads are rejected without being decoded. Starting
    /// while a decode is in flight abandons it; its result never surfaces.
    /// Wait for [`completed`](Self::completed) first to decode every frame.
    pub fn start(&mut self, frame: RawFrame) -> Result<()> {
        if frame.len() > self.max_frame_bytes {
            self.failed += 1;
            return Err(StreamError::decode_failed(
                frame.sequence,
                format!("payload of {} bytes exceeds limit of {}", frame.len(), self.max_frame_bytes),
            ));
        }

        if self.cancel() {
            trace!("Abandoned in-flight decode for frame {}", frame.sequence);
        }

        let decoder = Arc::clone(&self.decoder);
        let Frame { data, sequence, arrived_at } = frame;
        let task = tokio::task::spawn_blocking(move || decoder.decode(&data));
        self.in_flight = Some(InFlight { sequence, arrived_at, task });
        Ok(())
    }

    /// Wait for the running decode to finish.
    ///
    /// Never resolves while idle. Cancel safe: if the returned future is
    /// dropped, the decode keeps running and a later call picks it up.
    pub async fn completed(&mut self) -> Result<DecodedFrame> {
        let Some(in_flight) = self.in_flight.as_mut() else {
            return std::future::pending().await;
        };
        let joined = (&mut in_flight.task).await;
        let (sequence, arrived_at) = (in_flight.sequence, in_flight.arrived_at);
        self.in_flight = None;

        let outcome = match joined {
            Ok(Ok(bitmap)) => Ok(Frame { data: bitmap, sequence, arrived_at }),
            Ok(Err(e)) => Err(StreamError::decode_failed(sequence, e.to_string())),
            Err(e) => Err(StreamError::decode_failed(sequence, format!("decode task failed: {e}"))),
        };

        match &outcome {
            Ok(frame) => {
                self.decoded += 1;
                trace!("Frame {} decoded ({}x{})", sequence, frame.data.width(), frame.data.height());
            }
            Err(e) => {
                self.failed += 1;
                warn!("{}", e);
            }
        }
        outcome
    }

    /// Abandon the running decode; its result is discarded.
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(in_flight) => {
                in_flight.task.abort();
                true
            }
            None => false,
        }
    }

    /// Frames decoded successfully
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Frames rejected or failed in the codec
    pub fn failed(&self) -> u64 {
        self.failed
    }
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        self.cancel();
    }
}
