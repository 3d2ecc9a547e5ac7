//! Stream socket lifecycle: connect, heartbeat, bounded reconnect
//!
//! [`ConnectionManager`] owns one stream's [`Connection`] together with its
//! socket and timer handles. The event loop polls [`next_event`] and gets
//! back only what the rest of the pipeline cares about: opened, an inbound
//! message, a disconnect, or a fatal error. Heartbeats and reconnect
//! attempts are handled inside.
//!
//! [`next_event`]: ConnectionManager::next_event

mod state;
mod transport;
mod websocket;


use std::sync::Arc;
use std::time::Duration;
use futures::future::BoxFuture;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, error, info, warn};
use url::Url;

pub use state::{Connection, LossOutcome};
pub use transport::{
    Connector, FrameSocket, NORMAL_CLOSURE, PING_MESSAGE, PONG_MESSAGE, SocketEvent, WireMessage,
};
pub use websocket::WsConnector;

use crate::config::ClientConfig;
use crate::types::{ConnectionState, DisconnectReason, StreamKey};
use crate::{Result, StreamError};

/// What the connection reports to the event loop.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Socket opened; attempt counter is back to 0
    Connected,
    /// Binary or text message to classify
    Message(WireMessage),
    /// Socket gone; `Retrying` means a reconnect is scheduled
    Disconnected(DisconnectReason),
    /// Reconnect attempts exhausted
    Fatal(StreamError),
}

enum Wake {
    Socket(Result<SocketEvent>),
    Heartbeat,
}

/// Owns a stream's socket, heartbeat timer and reconnect timer.
pub struct ConnectionManager {
    connection: Connection,
    connector: Arc<dyn Connector>,
    endpoint: Url,
    heartbeat_period: Duration,
    config: Arc<ClientConfig>,
    socket: Option<Box<dyn FrameSocket>>,
    opening: Option<BoxFuture<'static, Result<Box<dyn FrameSocket>>>>,
    heartbeat: Option<Interval>,
    retry_at: Option<Instant>,
    pings_sent: u64,
}

impl ConnectionManager {
    pub fn new(
        key: StreamKey,
        connector: Arc<dyn Connector>,
        config: Arc<ClientConfig>,
    ) -> Result<Self> {
        let endpoint = config.stream_endpoint(&key)?;
        Ok(Self {
            connection: Connection::new(key, config.max_reconnect_attempts),
            connector,
            endpoint,
            heartbeat_period: config.heartbeat_interval(),
            config,
            socket: None,
            opening: None,
            heartbeat: None,
            retry_at: None,
            pings_sent: 0,
        })
    }

    /// Start connecting. No-op while already connecting or connected.
    ///
    /// Called during a pending retry, this opens right away instead of
    /// waiting out the delay.
    pub fn connect(&mut self) -> bool {
        if !self.connection.begin_connect() {
            debug!(stream = %self.connection.key(), "connect() ignored, already {:?}", self.state());
            return false;
        }
        self.retry_at = None;
        self.start_open();
        true
    }

    /// Close the socket with a normal closure and cancel every timer.
    ///
    /// Returns `false` if nothing was active.
    pub fn disconnect(&mut self, manual: bool) -> bool {
        if let Some(mut socket) = self.socket.take() {
            socket.close(NORMAL_CLOSURE, "client disconnect");
        }
        self.opening = None;
        self.heartbeat = None;
        self.retry_at = None;
        let was_active = self.connection.disconnect(manual);
        if was_active {
            info!(stream = %self.connection.key(), manual, "Disconnected");
        }
        was_active
    }

    /// Manual disconnect, attempt counter back to 0, connect again at once.
    ///
    /// Returns whether a socket or pending retry was torn down first.
    pub fn reconnect(&mut self) -> bool {
        info!(stream = %self.connection.key(), "Reconnect requested");
        let was_active = self.disconnect(true);
        self.connection.reset_attempts();
        self.connect();
        was_active
    }

    /// Drive the connection until something happens the pipeline must see.
    ///
    /// Cancel safe: all progress is kept in `self`, so the future may be
    /// dropped at any await point. Pends forever while disconnected.
    pub async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            if let Some(opening) = self.opening.as_mut() {
                let result = opening.await;
                self.opening = None;
                match result {
                    Ok(socket) => {
                        self.opened(socket);
                        return ConnectionEvent::Connected;
                    }
                    Err(e) => {
                        warn!(stream = %self.connection.key(), "Open failed: {}", e);
                        return self.lost(None);
                    }
                }
            }

            if let Some(socket) = self.socket.as_mut() {
                let heartbeat = self.heartbeat.as_mut();
                let wake = tokio::select! {
                    event = socket.recv() => Wake::Socket(event),
                    _ = tick(heartbeat) => Wake::Heartbeat,
                };

                match wake {
                    Wake::Socket(Ok(SocketEvent::Message(message))) => {
                        return ConnectionEvent::Message(message);
                    }
                    Wake::Socket(Ok(SocketEvent::Closed { code, reason })) => {
                        info!(stream = %self.connection.key(), ?code, %reason, "Socket closed");
                        return self.lost(code);
                    }
                    Wake::Socket(Err(e)) => {
                        warn!(stream = %self.connection.key(), "Socket error: {}", e);
                        return self.lost(None);
                    }
                    Wake::Heartbeat => {
                        if let Some(event) = self.send_heartbeat() {
                            return event;
                        }
                        continue;
                    }
                }
            }

            if let Some(at) = self.retry_at {
                sleep_until(at).await;
                self.retry_at = None;
                self.connection.retry_due();
                info!(
                    stream = %self.connection.key(),
                    attempt = self.connection.attempts(),
                    max = self.connection.max_attempts(),
                    "Reconnecting"
                );
                self.start_open();
                continue;
            }

            return std::future::pending().await;
        }
    }

    fn start_open(&mut self) {
        debug!(stream = %self.connection.key(), endpoint = %self.endpoint, "Opening socket");
        self.opening = Some(self.connector.open(self.endpoint.clone()));
    }

    fn opened(&mut self, socket: Box<dyn FrameSocket>) {
        let now = Instant::now();
        self.connection.opened(now);
        self.socket = Some(socket);

        let mut heartbeat = interval_at(now + self.heartbeat_period, self.heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.heartbeat = Some(heartbeat);

        info!(stream = %self.connection.key(), "Connected");
    }

    fn send_heartbeat(&mut self) -> Option<ConnectionEvent> {
        let socket = self.socket.as_mut()?;
        match socket.send_text(PING_MESSAGE) {
            Ok(()) => {
                self.pings_sent += 1;
                debug!(stream = %self.connection.key(), "Heartbeat sent");
                None
            }
            Err(e) => {
                warn!(stream = %self.connection.key(), "Heartbeat failed: {}", e);
                Some(self.lost(None))
            }
        }
    }

    fn lost(&mut self, code: Option<u16>) -> ConnectionEvent {
        self.socket = None;
        self.heartbeat = None;

        match self.connection.lost(code) {
            LossOutcome::Terminal(reason) => ConnectionEvent::Disconnected(reason),
            LossOutcome::Retry { attempt } => {
                let delay = self.config.reconnect_delay(attempt);
                self.retry_at = Some(Instant::now() + delay);
                info!(
                    stream = %self.connection.key(),
                    attempt,
                    max = self.connection.max_attempts(),
                    "Reconnect scheduled in {:?}",
                    delay
                );
                ConnectionEvent::Disconnected(DisconnectReason::Retrying {
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                })
            }
            LossOutcome::Exhausted { attempts } => {
                error!(stream = %self.connection.key(), attempts, "Reconnect attempts exhausted");
                ConnectionEvent::Fatal(StreamError::ReconnectExhausted {
                    stream_key: self.connection.key().to_string(),
                    attempts,
                })
            }
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn attempts(&self) -> u32 {
        self.connection.attempts()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Heartbeats sent since creation
    pub fn pings_sent(&self) -> u64 {
        self.pings_sent
    }

    /// Whether a heartbeat timer is armed
    pub fn heartbeat_armed(&self) -> bool {
        self.heartbeat.is_some()
    }

    /// When the next reconnect attempt is due, if one is scheduled
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect(true);
    }
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
