//! Transport abstraction for one stream socket

use futures::future::BoxFuture;
use url::Url;

use crate::Result;

/// Heartbeat request sent while connected
pub const PING_MESSAGE: &str = "ping";
/// Expected heartbeat reply
pub const PONG_MESSAGE: &str = "pong";
/// Close code for an intentional, clean shutdown
pub const NORMAL_CLOSURE: u16 = 1000;

/// Application message received on a stream socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// One compressed image
    Binary(Vec<u8>),
    /// Heartbeat reply (or protocol noise)
    Text(String),
}

/// What a socket produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(WireMessage),
    /// The peer closed the socket. `code` is `None` when the stream ended
    /// without a close frame (an abnormal closure).
    Closed { code: Option<u16>, reason: String },
}

/// An open, full-duplex stream socket.
#[async_trait::async_trait]
pub trait FrameSocket: Send {
    /// Wait for the next message or closure.
    ///
    /// Must be cancel safe: dropping the future before it resolves may not
    /// lose a message. `Err` reports a transport failure.
    async fn recv(&mut self) -> Result<SocketEvent>;

    /// Queue a text message without waiting for it to be written
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Start a close handshake with `code`; the socket is unusable afterwards
    fn close(&mut self, code: u16, reason: &str);
}

/// Opens sockets for stream endpoints.
pub trait Connector: Send + Sync + 'static {
    /// Open a socket to `endpoint`. The returned future owns everything it
    /// needs so it can be stored and polled across event-loop iterations.
    fn open(&self, endpoint: Url) -> BoxFuture<'static, Result<Box<dyn FrameSocket>>>;
}
