//! WebSocket transport over `tokio-tungstenite`

use futures::future::BoxFuture;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use super::{Connector, FrameSocket, SocketEvent, WireMessage};
use crate::{Result, StreamError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens `ws://` and `wss://` stream sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, endpoint: Url) -> BoxFuture<'static, Result<Box<dyn FrameSocket>>> {
        Box::pin(async move {
            let (stream, response) = connect_async(endpoint.as_str()).await.map_err(|e| {
                StreamError::connection_failed_with_source(
                    format!("WebSocket handshake with {endpoint} failed"),
                    Box::new(e),
                )
            })?;
            debug!(%endpoint, status = %response.status(), "WebSocket handshake complete");
            Ok(Box::new(WsSocket::new(stream)) as Box<dyn FrameSocket>)
        })
    }
}

/// A connected WebSocket.
///
/// Reads happen on the caller's task; writes go through a small writer
/// task so sending a heartbeat or close never blocks the event loop.
struct WsSocket {
    incoming: SplitStream<WsStream>,
    outgoing: mpsc::UnboundedSender<Message>,
    writer: JoinHandle<()>,
    closed: bool,
}

impl WsSocket {
    fn new(stream: WsStream) -> Self {
        let (mut sink, incoming) = stream.split();
        let (outgoing, mut queue) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = queue.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(e) = sink.send(message).await {
                    debug!("WebSocket write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
            let _ = sink.close().await;
            trace!("WebSocket writer finished");
        });

        Self { incoming, outgoing, writer, closed: false }
    }
}

#[async_trait::async_trait]
impl FrameSocket for WsSocket {
    async fn recv(&mut self) -> Result<SocketEvent> {
        loop {
            let message = match self.incoming.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    return Err(StreamError::connection_failed_with_source(
                        "WebSocket receive failed",
                        Box::new(e),
                    ));
                }
                None => {
                    return Ok(SocketEvent::Closed { code: None, reason: "stream ended".into() });
                }
            };

            match message {
                Message::Binary(data) => {
                    return Ok(SocketEvent::Message(WireMessage::Binary(data)));
                }
                Message::Text(text) => return Ok(SocketEvent::Message(WireMessage::Text(text))),
                Message::Close(frame) => {
                    let (code, reason) = match frame {
                        Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                        None => (None, String::new()),
                    };
                    return Ok(SocketEvent::Closed { code, reason });
                }
                // Protocol-level ping/pong is answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(StreamError::connection_failed("socket already closed"));
        }
        self.outgoing
            .send(Message::Text(text.to_owned()))
            .map_err(|_| StreamError::connection_failed("WebSocket writer stopped"))
    }

    fn close(&mut self, code: u16, reason: &str) {
        if self.closed {
            return;
        }
        self.closed = true;
        let frame = CloseFrame { code: CloseCode::from(code), reason: reason.to_owned().into() };
        let _ = self.outgoing.send(Message::Close(Some(frame)));
    }
}

impl Drop for WsSocket {
    fn drop(&mut self) {
        if !self.closed {
            // Writer exits once the queue is dropped; nothing left to flush.
            self.writer.abort();
        }
    }
}
