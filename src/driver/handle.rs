//! Caller-side handle to a running stream

use futures::{Stream, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Command;
use crate::settings::SettingsEndpoint;
use crate::stream::ThrottleExt;
use crate::telemetry::TelemetrySample;
use crate::types::{ErrorEvent, ErrorKind, StreamEvent, StreamKey, StreamSettings, StreamStatus, UpdateRate};
use crate::{Result, StreamError};

/// Handle to one stream's event loop.
///
/// Commands are fire-and-forget: the loop applies them in order and
/// reports the outcome through events and status. Dropping the handle
/// tears the stream down; [`shutdown`](Self::shutdown) does the same and
/// waits for teardown to finish.
pub struct StreamHandle {
    key: StreamKey,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<StreamEvent>,
    status: watch::Receiver<StreamStatus>,
    refresh_hz: f64,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub(crate) fn new(
        key: StreamKey,
        commands: mpsc::UnboundedSender<Command>,
        events: broadcast::Sender<StreamEvent>,
        status: watch::Receiver<StreamStatus>,
        refresh_hz: f64,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self { key, commands, events, status, refresh_hz, cancel, task: Some(task) }
    }

    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Open the stream. No-op while connecting or connected.
    pub fn connect(&self) -> Result<()> {
        self.send(Command::Connect)
    }

    /// Close the stream with a normal closure.
    ///
    /// With `manual` set, a reconnect already scheduled is cancelled and
    /// none will be scheduled until the next `connect()`.
    pub fn disconnect(&self, manual: bool) -> Result<()> {
        self.send(Command::Disconnect { manual })
    }

    /// Disconnect, reset the attempt counter and telemetry, connect again
    /// without delay. The only way out of a fatal state.
    pub fn reconnect(&self) -> Result<()> {
        self.send(Command::Reconnect)
    }

    /// Stop decoding and drawing. Frames keep arriving and are counted.
    pub fn pause(&self) -> Result<()> {
        self.send(Command::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send(Command::Resume)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| StreamError::DriverStopped)
    }

    /// Raw event receiver; see [`events`](Self::events) for a stream
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    /// Events emitted from now on.
    ///
    /// A subscriber that falls more than `event_capacity` events behind
    /// skips the oldest ones.
    pub fn events(&self) -> impl Stream<Item = StreamEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} events skipped", skipped);
                    None
                }
            }
        })
    }

    /// Telemetry of rendered frames at the requested rate.
    ///
    /// [`UpdateRate::Native`] yields one sample per drawn frame;
    /// [`UpdateRate::Max`] yields the latest sample at most that many times
    /// per second.
    pub fn telemetry(&self, rate: UpdateRate) -> impl Stream<Item = TelemetrySample> + Send + 'static {
        let samples = self.events().filter_map(|event| async move { event.telemetry().copied() });

        match rate.throttle_interval(self.refresh_hz) {
            None => samples.boxed(),
            Some(interval) => samples.throttle(interval).boxed(),
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> StreamStatus {
        *self.status.borrow()
    }

    /// Current status, then every change
    pub fn status_updates(&self) -> impl Stream<Item = StreamStatus> + Send + 'static {
        WatchStream::new(self.status.clone())
    }

    /// Wait until the status satisfies `predicate`.
    pub async fn wait_for_status(
        &self,
        mut predicate: impl FnMut(&StreamStatus) -> bool,
    ) -> Result<StreamStatus> {
        let mut status = self.status.clone();
        let matched = status
            .wait_for(|current| predicate(current))
            .await
            .map_err(|_| StreamError::DriverStopped)?;
        Ok(*matched)
    }

    /// Read the server-side push settings of this stream.
    ///
    /// A failure is reported once as an [`ErrorKind::Config`] event and
    /// never affects the live stream.
    pub async fn fetch_settings(&self, endpoint: &dyn SettingsEndpoint) -> Option<StreamSettings> {
        match endpoint.fetch(&self.key).await {
            Ok(settings) => Some(settings),
            Err(e) => {
                self.report_config_error(&e);
                None
            }
        }
    }

    /// Write the server-side push settings of this stream.
    ///
    /// Returns the settings as submitted, after normalization.
    pub async fn update_settings(
        &self,
        endpoint: &dyn SettingsEndpoint,
        settings: StreamSettings,
    ) -> Option<StreamSettings> {
        match endpoint.update(&self.key, settings).await {
            Ok(settings) => Some(settings),
            Err(e) => {
                self.report_config_error(&e);
                None
            }
        }
    }

    fn report_config_error(&self, error: &StreamError) {
        warn!(stream = %self.key, "{}", error);
        let _ = self.events.send(StreamEvent::Error(ErrorEvent::from_error(ErrorKind::Config, error)));
    }

    /// Tear the stream down and wait until the socket is closed and every
    /// frame released.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(stream = %self.key, "Stream task failed: {}", e);
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        debug!(stream = %self.key, "Dropping stream handle");
        self.cancel.cancel();
    }
}
