//! Frame-rate and arrival telemetry
//!
//! [`TelemetryCollector`] is a passive observer: the driver reports
//! arrivals, renders, drops and decode failures with explicit timestamps,
//! and reads a [`TelemetrySample`] back when a frame is drawn.
//!
//! FPS is counted in consecutive one-second windows anchored at the first
//! render. The reported value is the count of the last complete window, so
//! FPS reported during second T+1 is exactly the number of frames rendered
//! with timestamps inside second T.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Telemetry attached to every rendered frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct TelemetrySample {
    /// Frames drawn in the last complete one-second window
    pub fps: u32,
    /// Time between the two most recent arrivals, in milliseconds
    pub latency_ms: Option<f64>,
    /// Frames received since the last `reconnect()`
    pub frame_count: u64,
    pub frames_rendered: u64,
    /// Frames discarded by latest-wins replacement or pause
    pub frames_dropped: u64,
    pub decode_errors: u64,
}

#[derive(Debug, Default)]
pub struct TelemetryCollector {
    window_start: Option<Instant>,
    window_renders: u32,
    fps: u32,
    last_arrival: Option<Instant>,
    latency: Option<Duration>,
    frame_count: u64,
    frames_rendered: u64,
    frames_dropped: u64,
    decode_errors: u64,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A binary frame arrived at `at`
    pub fn record_arrival(&mut self, at: Instant) {
        if let Some(previous) = self.last_arrival {
            self.latency = Some(at.saturating_duration_since(previous));
        }
        self.last_arrival = Some(at);
        self.frame_count += 1;
    }

    /// A frame was drawn at `at`
    pub fn record_render(&mut self, at: Instant) {
        self.advance(at);
        if self.window_start.is_none() {
            self.window_start = Some(at);
        }
        self.window_renders += 1;
        self.frames_rendered += 1;
    }

    /// `count` frames were discarded without being drawn
    pub fn record_dropped(&mut self, count: u64) {
        self.frames_dropped += count;
    }

    pub fn record_decode_error(&mut self) {
        self.decode_errors += 1;
    }

    /// Close every FPS window that ended at or before `now`.
    pub fn advance(&mut self, now: Instant) {
        let Some(start) = self.window_start else {
            return;
        };
        let elapsed = now.saturating_duration_since(start);
        if elapsed < FPS_WINDOW {
            return;
        }

        let windows = elapsed.as_nanos() / FPS_WINDOW.as_nanos();
        // Only the last closed window counts; any window after the first closed one was empty.
        self.fps = if windows == 1 { self.window_renders } else { 0 };
        self.window_renders = 0;
        let windows = u32::try_from(windows).unwrap_or(u32::MAX);
        self.window_start = Some(start + FPS_WINDOW * windows);
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn sample(&self) -> TelemetrySample {
        TelemetrySample {
            fps: self.fps,
            latency_ms: self.latency.map(|d| d.as_secs_f64() * 1000.0),
            frame_count: self.frame_count,
            frames_rendered: self.frames_rendered,
            frames_dropped: self.frames_dropped,
            decode_errors: self.decode_errors,
        }
    }

    /// Forget everything; called on `reconnect()`
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
