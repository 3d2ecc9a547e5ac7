//! Inbound message classification and latest-wins frame slot
//!
//! Every message the socket delivers passes through [`FrameIngestQueue`]:
//! text is a heartbeat acknowledgement and is dropped after logging, binary
//! is a frame. Frames wait in a [`FrameSlot`] of capacity one until the
//! decoder is free. A newer frame replaces the waiting one, and the
//! replaced frame is released before the new one is stored, so memory stays
//! bounded no matter how far the network runs ahead of the renderer.

use std::mem;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::connection::{PONG_MESSAGE, WireMessage};
use crate::types::RawFrame;

/// A single-entry arena: storing a value releases the previous one.
#[derive(Debug)]
pub struct FrameSlot<T> {
    slot: Option<T>,
    stored: u64,
    replaced: u64,
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self { slot: None, stored: 0, replaced: 0 }
    }
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, releasing anything already waiting.
    ///
    /// Returns `true` if an older value was discarded.
    pub fn replace(&mut self, value: T) -> bool {
        let discarded = match self.slot.take() {
            Some(old) => {
                drop(old);
                self.replaced += 1;
                true
            }
            None => false,
        };
        self.slot = Some(value);
        self.stored += 1;
        discarded
    }

    /// Remove the waiting value, leaving the slot empty
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    /// Release the waiting value, if any. Returns whether one was held.
    pub fn clear(&mut self) -> bool {
        mem::take(&mut self.slot).is_some()
    }

    pub fn peek(&self) -> Option<&T> {
        self.slot.as_ref()
    }

    pub fn is_occupied(&self) -> bool {
        self.slot.is_some()
    }

    /// 0 or 1
    pub fn len(&self) -> usize {
        usize::from(self.slot.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Values stored since creation
    pub fn stored(&self) -> u64 {
        self.stored
    }

    /// Values discarded because a newer one arrived
    pub fn replaced(&self) -> u64 {
        self.replaced
    }
}

/// What an inbound socket message turned out to be.
#[derive(Debug)]
pub enum Inbound {
    /// Binary payload, tagged with its arrival bookkeeping
    Frame(RawFrame),
    /// Reply to our heartbeat ping
    HeartbeatAck,
    /// Text that is not part of the protocol
    UnexpectedText(String),
}

/// Classifies inbound messages and holds at most one undecoded frame.
#[derive(Debug, Default)]
pub struct FrameIngestQueue {
    pending: FrameSlot<RawFrame>,
    next_sequence: u64,
}

impl FrameIngestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one message received at `now`.
    ///
    /// Binary messages are numbered in arrival order but not yet queued;
    /// the caller decides whether to [`offer`](Self::offer) them.
    pub fn classify(&mut self, message: WireMessage, now: Instant) -> Inbound {
        match message {
            WireMessage::Binary(payload) => {
                self.next_sequence += 1;
                trace!("Frame {} received ({} bytes)", self.next_sequence, payload.len());
                Inbound::Frame(RawFrame::new(payload, self.next_sequence, now))
            }
            WireMessage::Text(text) if text == PONG_MESSAGE => {
                debug!("Heartbeat acknowledged");
                Inbound::HeartbeatAck
            }
            WireMessage::Text(text) => {
                debug!("Ignoring unexpected text message ({} bytes)", text.len());
                Inbound::UnexpectedText(text)
            }
        }
    }

    /// Queue a frame for decoding, discarding any older undecoded frame.
    ///
    /// Returns `true` if a frame was discarded.
    pub fn offer(&mut self, frame: RawFrame) -> bool {
        let sequence = frame.sequence;
        let discarded = self.pending.replace(frame);
        if discarded {
            trace!("Frame {} preempted an undecoded frame", sequence);
        }
        discarded
    }

    /// Next frame to decode, if any
    pub fn take(&mut self) -> Option<RawFrame> {
        self.pending.take()
    }

    /// Release the waiting frame, if any
    pub fn clear(&mut self) -> bool {
        self.pending.clear()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_occupied()
    }

    /// Undecoded frames discarded since creation
    pub fn dropped(&self) -> u64 {
        self.pending.replaced()
    }

    /// Restart sequence numbering and release the waiting frame
    pub fn reset(&mut self) {
        self.pending.clear();
        self.next_sequence = 0;
    }
}
