//! Driver spawns and runs one stream's event loop
//!
//! Each stream gets a single task that owns the connection manager, the
//! ingest slot, the decoder, the render loop and the telemetry collector.
//! The task wakes on whichever comes first: a command from the
//! [`StreamHandle`], a connection event, a finished decode, or a render
//! tick. Nothing else touches the pipeline, so it needs no locks.

mod handle;


pub use handle::StreamHandle;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::Result;
use crate::config::ClientConfig;
use crate::connection::{ConnectionEvent, ConnectionManager, Connector};
use crate::decode::{Decode, FrameDecoder};
use crate::ingest::{FrameIngestQueue, Inbound};
use crate::render::{RenderLoop, RenderSurface};
use crate::telemetry::TelemetryCollector;
use crate::types::{
    DecodedFrame, DisconnectReason, ErrorEvent, ErrorKind, StreamEvent, StreamKey, StreamStatus,
};

/// Control request from a [`StreamHandle`] to its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Disconnect { manual: bool },
    Reconnect,
    Pause,
    Resume,
}

/// The pluggable ends of one stream: where frames come from, how they are
/// decoded, and where they are drawn.
pub struct StreamParts {
    pub connector: Arc<dyn Connector>,
    pub decoder: Arc<dyn Decode>,
    pub surface: Box<dyn RenderSurface>,
}

/// Driver spawns stream tasks
pub struct Driver;

impl Driver {
    /// Spawn the event loop for `key`.
    ///
    /// The stream starts disconnected; call [`StreamHandle::connect`] to
    /// open it. Must be called from within a tokio runtime.
    pub fn spawn(config: &ClientConfig, key: StreamKey, parts: StreamParts) -> Result<StreamHandle> {
        config.validate()?;
        let config = Arc::new(config.clone());

        let manager = ConnectionManager::new(key.clone(), parts.connector, Arc::clone(&config))?;
        let endpoint = manager.endpoint().clone();

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        let (status_tx, status_rx) = watch::channel(StreamStatus::default());
        let cancel = CancellationToken::new();

        let task = StreamTask {
            key: key.clone(),
            manager,
            ingest: FrameIngestQueue::new(),
            decoder: FrameDecoder::new(parts.decoder, config.max_frame_bytes),
            render: RenderLoop::new(parts.surface),
            telemetry: TelemetryCollector::new(),
            paused: false,
            superseded: false,
            events: event_tx.clone(),
            status: status_tx,
        };

        let refresh = config.refresh_interval();
        let cancel_task = cancel.clone();
        let join = tokio::spawn(async move {
            task.run(command_rx, refresh, cancel_task).await;
        });

        info!(stream = %key, %endpoint, "Stream driver spawned");

        Ok(StreamHandle::new(key, command_tx, event_tx, status_rx, config.refresh_rate_hz, cancel, join))
    }
}

enum Wake {
    Cancelled,
    Command(Option<Command>),
    Connection(ConnectionEvent),
    Decoded(Result<DecodedFrame>),
    RenderTick,
}

/// Everything one stream owns, driven by a single task.
struct StreamTask {
    key: StreamKey,
    manager: ConnectionManager,
    ingest: FrameIngestQueue,
    decoder: FrameDecoder,
    render: RenderLoop<Box<dyn RenderSurface>>,
    telemetry: TelemetryCollector,
    paused: bool,
    /// The last finished decode was dropped for a newer waiting frame
    superseded: bool,
    events: broadcast::Sender<StreamEvent>,
    status: watch::Sender<StreamStatus>,
}

impl StreamTask {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        refresh: Duration,
        cancel: CancellationToken,
    ) {
        info!(stream = %self.key, "Stream task started");

        let mut render_tick = interval(refresh);
        render_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let can_render = !self.paused && self.render.has_pending();

            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                command = commands.recv() => Wake::Command(command),
                // Drain inbound messages first so a burst collapses before anything stale is drawn.
                event = self.manager.next_event() => Wake::Connection(event),
                decoded = self.decoder.completed() => Wake::Decoded(decoded),
                _ = render_tick.tick(), if can_render => Wake::RenderTick,
            };

            match wake {
                Wake::Cancelled => {
                    debug!(stream = %self.key, "Stream task cancelled");
                    break;
                }
                Wake::Command(None) => {
                    debug!(stream = %self.key, "All handles dropped, shutting down");
                    break;
                }
                Wake::Command(Some(command)) => self.handle_command(command),
                Wake::Connection(event) => self.handle_connection(event),
                Wake::Decoded(result) => self.handle_decoded(result),
                Wake::RenderTick => self.render_frame(),
            }

            self.pump_decoder();
            self.publish_status();
        }

        self.teardown();
    }

    fn handle_command(&mut self, command: Command) {
        debug!(stream = %self.key, ?command, "Command received");
        match command {
            Command::Connect => {
                self.manager.connect();
            }
            Command::Disconnect { manual } => {
                let was_active = self.manager.disconnect(manual);
                let discarded = self.discard_in_flight();
                self.telemetry.record_dropped(discarded);
                if was_active {
                    self.emit(StreamEvent::Disconnected(DisconnectReason::Manual));
                }
            }
            Command::Reconnect => {
                // Frames from the previous socket are stale once the user asked for a fresh start.
                self.discard_in_flight();
                self.ingest.reset();
                self.telemetry.reset();
                if self.manager.reconnect() {
                    self.emit(StreamEvent::Disconnected(DisconnectReason::Manual));
                }
            }
            Command::Pause => self.pause(),
            Command::Resume => self.resume(),
        }
    }

    fn handle_connection(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => self.emit(StreamEvent::Connected),
            ConnectionEvent::Message(message) => {
                match self.ingest.classify(message, Instant::now()) {
                    Inbound::Frame(frame) => {
                        self.telemetry.record_arrival(frame.arrived_at);
                        if self.paused {
                            trace!(stream = %self.key, "Frame {} arrived while paused", frame.sequence);
                            self.telemetry.record_dropped(1);
                        } else if self.ingest.offer(frame) {
                            self.telemetry.record_dropped(1);
                        }
                    }
                    Inbound::HeartbeatAck | Inbound::UnexpectedText(_) => {}
                }
            }
            ConnectionEvent::Disconnected(reason) => self.emit(StreamEvent::Disconnected(reason)),
            ConnectionEvent::Fatal(e) => {
                self.emit(StreamEvent::Disconnected(DisconnectReason::Exhausted));
                self.emit(StreamEvent::Error(ErrorEvent::from_error(ErrorKind::Fatal, &e)));
            }
        }
    }

    fn handle_decoded(&mut self, result: Result<DecodedFrame>) {
        match result {
            // A newer frame is already waiting. Never drop two in a row, or a
            // decoder slower than the network would never draw anything.
            Ok(frame) if self.ingest.has_pending() && !self.superseded => {
                trace!(stream = %self.key, "Decoded frame {} superseded before drawing", frame.sequence);
                self.superseded = true;
                self.telemetry.record_dropped(1);
            }
            Ok(frame) => {
                self.superseded = false;
                if self.render.submit(frame) {
                    self.telemetry.record_dropped(1);
                }
            }
            // Already logged by the decoder; the frame is simply gone.
            Err(_) => self.telemetry.record_decode_error(),
        }
    }

    /// Keep the decoder busy while frames are waiting.
    fn pump_decoder(&mut self) {
        if self.paused {
            return;
        }
        while !self.decoder.is_busy() {
            let Some(frame) = self.ingest.take() else {
                break;
            };
            if let Err(e) = self.decoder.start(frame) {
                warn!(stream = %self.key, "{}", e);
                self.telemetry.record_decode_error();
            }
        }
    }

    fn render_frame(&mut self) {
        let Some(rendered) = self.render.tick() else {
            return;
        };
        self.telemetry.record_render(Instant::now());
        let sample = self.telemetry.sample();
        trace!(
            stream = %self.key,
            sequence = rendered.sequence,
            fps = sample.fps,
            "Frame rendered ({}x{})",
            rendered.width,
            rendered.height
        );
        self.emit(StreamEvent::FrameRendered(sample));
    }

    fn pause(&mut self) {
        if self.paused {
            return;
        }
        self.paused = true;
        let discarded = self.discard_in_flight();
        self.telemetry.record_dropped(discarded);
        info!(stream = %self.key, discarded, "Rendering paused");
    }

    /// Release every frame not yet drawn; the displayed bitmap stays.
    ///
    /// Returns how many frames were discarded.
    fn discard_in_flight(&mut self) -> u64 {
        self.superseded = false;
        [self.ingest.clear(), self.decoder.cancel(), self.render.discard_pending()]
            .into_iter()
            .filter(|discarded| *discarded)
            .count() as u64
    }

    fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            info!(stream = %self.key, "Rendering resumed");
        }
    }

    fn emit(&self, event: StreamEvent) {
        // No subscribers is fine; events are not buffered for late joiners.
        let _ = self.events.send(event);
    }

    fn publish_status(&self) {
        let next = StreamStatus {
            state: self.manager.state(),
            reconnect_attempts: self.manager.attempts(),
            fatal: self.manager.connection().is_fatal(),
            paused: self.paused,
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            debug!(stream = %self.key, state = ?next.state, attempts = next.reconnect_attempts, "Status changed");
            *current = next;
            true
        });
    }

    fn teardown(mut self) {
        let was_active = self.manager.disconnect(true);
        self.decoder.cancel();
        self.ingest.clear();
        self.render.release();

        if was_active {
            self.emit(StreamEvent::Disconnected(DisconnectReason::Manual));
        }
        self.publish_status();

        info!(
            stream = %self.key,
            frames = self.telemetry.frame_count(),
            rendered = self.render.rendered(),
            decoded = self.decoder.decoded(),
            decode_failures = self.decoder.failed(),
            "Stream task ended"
        );
    }
}
