//! Test doubles for the streaming pipeline
//!
//! - [`MockConnector`] accepts or refuses socket opens on demand and hands
//!   the server side of every accepted socket to the test as a [`MockServer`]
//! - [`MockDecoder`] decodes a tiny synthetic payload format instantly
//! - [`GatedDecoder`] does the same, but only when the test lets it
//! - [`RecordingSurface`] records every resize and draw, and can stall one draw
//! - [`MockSettingsEndpoint`] keeps settings in memory and fails on demand
//! - [`encode_png`] builds real compressed payloads for [`ImageDecoder`](crate::ImageDecoder)

#![cfg(any(test, feature = "benchmark"))]

use futures::future::BoxFuture;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

use crate::connection::{Connector, FrameSocket, SocketEvent, WireMessage};
use crate::decode::{Decode, DecodeFailure};
use crate::render::RenderSurface;
use crate::settings::SettingsEndpoint;
use crate::types::{Bitmap, StreamKey, StreamSettings};
use crate::{Result, StreamError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Something the client sent to a [`MockServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Text { text: String, at: Instant },
    Close { code: u16 },
}

enum ServerAction {
    Message(WireMessage),
    Close(u16),
    Fail(String),
}

/// Server side of one accepted mock socket.
///
/// Dropping it ends the client's receive stream without a close frame.
pub struct MockServer {
    actions: mpsc::UnboundedSender<ServerAction>,
    received: Arc<Mutex<Vec<ClientMessage>>>,
    pub endpoint: Url,
}

impl MockServer {
    pub fn send_binary(&self, payload: Vec<u8>) {
        let _ = self.actions.send(ServerAction::Message(WireMessage::Binary(payload)));
    }

    pub fn send_text(&self, text: &str) {
        let _ = self.actions.send(ServerAction::Message(WireMessage::Text(text.to_string())));
    }

    /// Close with the given code
    pub fn close(&self, code: u16) {
        let _ = self.actions.send(ServerAction::Close(code));
    }

    /// Report a transport error to the client
    pub fn fail(&self, reason: &str) {
        let _ = self.actions.send(ServerAction::Fail(reason.to_string()));
    }

    /// Everything the client sent, in order
    pub fn received(&self) -> Vec<ClientMessage> {
        lock(&self.received).clone()
    }

    /// Arrival times of heartbeat pings
    pub fn ping_times(&self) -> Vec<Instant> {
        self.received()
            .into_iter()
            .filter_map(|m| match m {
                ClientMessage::Text { text, at } if text == crate::connection::PING_MESSAGE => {
                    Some(at)
                }
                _ => None,
            })
            .collect()
    }

    /// Close code sent by the client, if it closed
    pub fn close_code(&self) -> Option<u16> {
        self.received().into_iter().find_map(|m| match m {
            ClientMessage::Close { code } => Some(code),
            _ => None,
        })
    }
}

struct MockSocket {
    actions: mpsc::UnboundedReceiver<ServerAction>,
    received: Arc<Mutex<Vec<ClientMessage>>>,
    closed: bool,
}

#[async_trait::async_trait]
impl FrameSocket for MockSocket {
    async fn recv(&mut self) -> Result<SocketEvent> {
        match self.actions.recv().await {
            Some(ServerAction::Message(message)) => Ok(SocketEvent::Message(message)),
            Some(ServerAction::Close(code)) => {
                Ok(SocketEvent::Closed { code: Some(code), reason: "server close".into() })
            }
            Some(ServerAction::Fail(reason)) => Err(StreamError::connection_failed(reason)),
            None => Ok(SocketEvent::Closed { code: None, reason: "server dropped".into() }),
        }
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        if self.closed {
            return Err(StreamError::connection_failed("socket closed"));
        }
        lock(&self.received).push(ClientMessage::Text { text: text.to_string(), at: Instant::now() });
        Ok(())
    }

    fn close(&mut self, code: u16, _reason: &str) {
        if !self.closed {
            self.closed = true;
            lock(&self.received).push(ClientMessage::Close { code });
        }
    }
}

#[derive(Default)]
struct ConnectorState {
    refusing: bool,
    opens: Vec<Instant>,
}

/// Connector whose sockets are driven by the test.
pub struct MockConnector {
    state: Mutex<ConnectorState>,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    /// Accepting connector plus the queue of server handles it produces
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { state: Mutex::new(ConnectorState::default()), servers }), rx)
    }

    /// Make subsequent opens fail (`true`) or succeed (`false`)
    pub fn set_refusing(&self, refusing: bool) {
        lock(&self.state).refusing = refusing;
    }

    /// Number of open attempts so far
    pub fn open_count(&self) -> usize {
        lock(&self.state).opens.len()
    }

    /// When each open attempt happened
    pub fn open_times(&self) -> Vec<Instant> {
        lock(&self.state).opens.clone()
    }
}

impl Connector for MockConnector {
    fn open(&self, endpoint: Url) -> BoxFuture<'static, Result<Box<dyn FrameSocket>>> {
        let refusing = {
            let mut state = lock(&self.state);
            state.opens.push(Instant::now());
            state.refusing
        };
        if refusing {
            return Box::pin(async move {
                Err(StreamError::connection_failed(format!("{endpoint} refused")))
            });
        }

        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let received = Arc::new(Mutex::new(Vec::new()));
        let server = MockServer { actions: actions_tx, received: Arc::clone(&received), endpoint };
        let _ = self.servers.send(server);

        let socket = MockSocket { actions: actions_rx, received, closed: false };
        Box::pin(async move { Ok(Box::new(socket) as Box<dyn FrameSocket>) })
    }
}

/// Decodes `MOCK` + width (u32 LE) + height (u32 LE) into a filled bitmap;
/// anything else fails.
#[derive(Debug, Default)]
pub struct MockDecoder;

impl MockDecoder {
    const MAGIC: &'static [u8; 4] = b"MOCK";

    pub fn payload(width: u32, height: u32) -> Vec<u8> {
        let mut payload = Self::MAGIC.to_vec();
        payload.extend_from_slice(&width.to_le_bytes());
        payload.extend_from_slice(&height.to_le_bytes());
        payload
    }
}

impl Decode for MockDecoder {
    fn decode(&self, payload: &[u8]) -> std::result::Result<Bitmap, DecodeFailure> {
        if payload.len() != 12 || &payload[..4] != Self::MAGIC {
            return Err("not a mock frame".into());
        }
        let width = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let height = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]);
        Ok(Bitmap::filled(width, height, [0x40, 0x80, 0xC0, 0xFF])?)
    }
}

/// [`MockDecoder`] that blocks every decode until a permit is released.
///
/// Call [`open`](Self::open) before the test ends, otherwise blocked
/// decodes keep the runtime from shutting down.
#[derive(Debug)]
pub struct GatedDecoder {
    // `None` once opened for good
    permits: Mutex<Option<usize>>,
    released: Condvar,
}

impl GatedDecoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { permits: Mutex::new(Some(0)), released: Condvar::new() })
    }

    /// Let `count` more decodes through
    pub fn release(&self, count: usize) {
        if let Some(permits) = lock(&self.permits).as_mut() {
            *permits += count;
        }
        self.released.notify_all();
    }

    /// Let every decode through from now on
    pub fn open(&self) {
        *lock(&self.permits) = None;
        self.released.notify_all();
    }
}

impl Decode for GatedDecoder {
    fn decode(&self, payload: &[u8]) -> std::result::Result<Bitmap, DecodeFailure> {
        let mut permits = lock(&self.permits);
        loop {
            match *permits {
                None => break,
                Some(0) => {}
                Some(ref mut remaining) => {
                    *remaining -= 1;
                    break;
                }
            }
            permits = self.released.wait(permits).unwrap_or_else(PoisonError::into_inner);
        }
        drop(permits);
        MockDecoder.decode(payload)
    }
}

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceCall {
    Resize { width: u32, height: u32 },
    Draw { width: u32, height: u32 },
}

/// Surface that records calls into a log shared with the test.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    size: (u32, u32),
    calls: Arc<Mutex<Vec<SurfaceCall>>>,
    next_draw_delay: Arc<Mutex<Option<Duration>>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        lock(&self.calls).clone()
    }

    pub fn draw_count(&self) -> usize {
        lock(&self.calls).iter().filter(|c| matches!(c, SurfaceCall::Draw { .. })).count()
    }

    /// Make the next draw block its thread for `delay`, like a slow compositor
    pub fn delay_next_draw(&self, delay: Duration) {
        *lock(&self.next_draw_delay) = Some(delay);
    }
}

impl RenderSurface for RecordingSurface {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        lock(&self.calls).push(SurfaceCall::Resize { width, height });
    }

    fn draw(&mut self, bitmap: &Bitmap) {
        let delay = lock(&self.next_draw_delay).take();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let (width, height) = bitmap.dimensions();
        lock(&self.calls).push(SurfaceCall::Draw { width, height });
    }
}

/// Settings store held in memory.
#[derive(Debug, Default)]
pub struct MockSettingsEndpoint {
    settings: Mutex<StreamSettings>,
    failing: Mutex<bool>,
}

impl MockSettingsEndpoint {
    pub fn new(settings: StreamSettings) -> Self {
        Self { settings: Mutex::new(settings), failing: Mutex::new(false) }
    }

    /// Make every request fail (`true`) or succeed (`false`)
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    pub fn stored(&self) -> StreamSettings {
        *lock(&self.settings)
    }

    fn check(&self, key: &StreamKey) -> Result<()> {
        if *lock(&self.failing) {
            return Err(StreamError::config_failed(key.as_str(), "503 Service Unavailable", None));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsEndpoint for MockSettingsEndpoint {
    async fn fetch(&self, key: &StreamKey) -> Result<StreamSettings> {
        self.check(key)?;
        Ok(self.stored())
    }

    async fn update(&self, key: &StreamKey, settings: StreamSettings) -> Result<StreamSettings> {
        self.check(key)?;
        let settings = settings.normalized();
        *lock(&self.settings) = settings;
        Ok(settings)
    }
}

/// Encode a solid-colour PNG
pub fn encode_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    use image::ImageEncoder;

    let pixels = rgba.repeat(width as usize * height as usize);
    let mut output = Vec::new();
    image::codecs::png::PngEncoder::new(&mut output)
        .write_image(&pixels, width, height, image::ExtendedColorType::Rgba8)
        .unwrap_or_else(|e| panic!("PNG encoding failed: {e}"));
    output
}
