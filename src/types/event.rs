//! Status and events exposed to the surrounding UI

use serde::{Deserialize, Serialize};

use crate::telemetry::TelemetrySample;

/// Lifecycle state of one stream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ConnectionState {
    /// No socket and no pending retry
    Disconnected,
    /// Socket open in progress
    Connecting,
    /// Socket open, heartbeat armed
    Connected,
    /// Socket lost; a reconnect is scheduled
    Error,
}

/// Snapshot of a stream's status, kept current in a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct StreamStatus {
    pub state: ConnectionState,
    /// Reconnect attempts made since the last successful open
    pub reconnect_attempts: u32,
    /// Set once retries are exhausted; cleared by `reconnect()`
    pub fatal: bool,
    pub paused: bool,
}

impl Default for StreamStatus {
    fn default() -> Self {
        Self { state: ConnectionState::Disconnected, reconnect_attempts: 0, fatal: false, paused: false }
    }
}

/// Why a stream left the connected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum DisconnectReason {
    /// `disconnect()` or `reconnect()` was called
    Manual,
    /// Server closed with code 1000
    CleanClose,
    /// Transport failure; another attempt follows after `delay_ms`
    Retrying { attempt: u32, delay_ms: u64 },
    /// Retry budget used up; only `reconnect()` recovers
    Exhausted,
}

/// Error categories allowed to cross into the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum ErrorKind {
    /// Reconnect attempts exhausted; persistent until `reconnect()`
    Fatal,
    /// Settings endpoint failed; one-shot notification
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct ErrorEvent {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorEvent {
    pub(crate) fn from_error(kind: ErrorKind, error: &crate::StreamError) -> Self {
        Self { kind, message: error.to_string() }
    }
}

/// Event emitted by a running stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum StreamEvent {
    Connected,
    Disconnected(DisconnectReason),
    Error(ErrorEvent),
    /// A frame reached the surface; carries the telemetry at draw time
    FrameRendered(TelemetrySample),
}

impl StreamEvent {
    /// Telemetry carried by this event, if any
    pub fn telemetry(&self) -> Option<&TelemetrySample> {
        match self {
            StreamEvent::FrameRendered(sample) => Some(sample),
            _ => None,
        }
    }
}
