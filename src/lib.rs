//! Real-time camera frame streaming client.
//!
//! camfeed keeps one WebSocket open per camera stream, receives compressed
//! frames as binary messages, and draws them onto a render surface while
//! staying within a fixed memory budget when the network outpaces the
//! renderer.
//!
//! # Features
//!
//! - **Latest-wins backpressure**: at most one undecoded and one undrawn
//!   frame per stream; stale frames are released, never queued
//! - **Bounded reconnect**: fixed (or exponential) delay, capped attempts,
//!   reset on success or explicit `reconnect()`
//! - **Heartbeat**: text `ping` at a fixed interval while connected
//! - **Off-loop decoding**: JPEG, PNG and WebP decoded on the blocking pool
//! - **Telemetry**: FPS, inter-arrival latency and frame counters per
//!   rendered frame, optionally throttled for UI widgets
//!
//! # Example
//!
//! ```rust,no_run
//! use camfeed::{Camfeed, ClientConfig, FrameBuffer, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> camfeed::Result<()> {
//!     let config = ClientConfig::from_file("camfeed.yaml")?;
//!     let stream = Camfeed::connect(&config, "entrance-cam", FrameBuffer::new())?;
//!     let mut events = stream.subscribe();
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             StreamEvent::FrameRendered(sample) => println!("{} fps", sample.fps),
//!             StreamEvent::Error(error) => eprintln!("{}", error.message),
//!             other => println!("{other:?}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Streaming pipeline, in data-flow order
pub mod connection;
pub mod ingest;
pub mod decode;
pub mod render;
pub mod telemetry;

// Event loop and UI-facing surface
pub mod driver;
pub mod settings;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use config::{BackoffPolicy, ClientConfig};
pub use connection::{Connector, FrameSocket, WsConnector};
pub use decode::{Decode, ImageDecoder};
pub use driver::{Command, Driver, StreamHandle, StreamParts};
pub use render::{FrameBuffer, RenderSurface};
pub use settings::{HttpSettingsEndpoint, SettingsEndpoint};
pub use telemetry::TelemetrySample;

use std::sync::Arc;

/// Unified entry point for camera streams.
///
/// Wires the production transport ([`WsConnector`]) and decoder
/// ([`ImageDecoder`]) to a caller-supplied surface. Use [`Driver::spawn`]
/// directly to plug in other parts.
///
/// ```rust,no_run
/// use camfeed::{Camfeed, ClientConfig, FrameBuffer};
///
/// # #[tokio::main]
/// # async fn main() -> camfeed::Result<()> {
/// let config = ClientConfig::default();
/// let stream = Camfeed::open(&config, "loading-dock", FrameBuffer::new())?;
/// stream.connect()?;
/// # Ok(())
/// # }
/// ```
pub struct Camfeed;

impl Camfeed {
    /// Spawn a stream for `key` without connecting it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `key` is not a valid stream key
    /// - `config` fails validation
    pub fn open<S: RenderSurface>(
        config: &ClientConfig,
        key: &str,
        surface: S,
    ) -> Result<StreamHandle> {
        let key = StreamKey::new(key)?;
        let parts = StreamParts {
            connector: Arc::new(WsConnector),
            decoder: Arc::new(ImageDecoder),
            surface: Box::new(surface),
        };
        Driver::spawn(config, key, parts)
    }

    /// Spawn a stream for `key` and start connecting right away.
    pub fn connect<S: RenderSurface>(
        config: &ClientConfig,
        key: &str,
        surface: S,
    ) -> Result<StreamHandle> {
        let stream = Self::open(config, key, surface)?;
        stream.connect()?;
        Ok(stream)
    }

    /// Settings endpoint for streams of this client
    pub fn settings(config: &ClientConfig) -> Result<HttpSettingsEndpoint> {
        HttpSettingsEndpoint::new(config)
    }
}
