//! Core types shared across the streaming pipeline.
//!
//! - [`Frame`] tags a payload with its arrival bookkeeping; [`RawFrame`]
//!   holds compressed bytes and [`DecodedFrame`] a drawable [`Bitmap`]
//! - [`StreamKey`] identifies one camera stream
//! - [`StreamEvent`] and [`StreamStatus`] are what the UI observes
//! - [`StreamSettings`] mirrors the server-side push settings
//! - [`UpdateRate`] throttles telemetry delivered to UI widgets
//!
//! ```rust
//! use camfeed::types::{Bitmap, StreamKey};
//!
//! let key = StreamKey::new("entrance-cam").unwrap();
//! let bitmap = Bitmap::filled(2, 2, [0, 0, 0, 255]).unwrap();
//! assert_eq!(key.as_str(), "entrance-cam");
//! assert_eq!(bitmap.byte_len(), 16);
//! ```

mod event;
mod frame;
mod settings;
mod stream_key;
mod update_rate;

pub use event::{
    ConnectionState, DisconnectReason, ErrorEvent, ErrorKind, StreamEvent, StreamStatus,
};
pub use frame::{Bitmap, DecodedFrame, Frame, RawFrame};
pub use settings::StreamSettings;
pub use stream_key::StreamKey;
pub use update_rate::UpdateRate;
