use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use commentsync_api_types::RealtimeEvent;
use commentsync_runtime_config::RealtimeSettings;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::SyncMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
    AwaitingRetry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub state: ChannelState,
    /// False after a channel error even while the stream is still open.
    pub connected: bool,
    /// Delay used for the next (or current) wait before reconnecting.
    pub retry_delay: Duration,
    /// Open attempts since the supervisor was created.
    pub attempts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelFrame {
    Text(String),
    /// Binary, ping and other frames the supervisor does not read.
    Other,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("failed to open realtime channel: {0}")]
    Connect(String),
    #[error("realtime channel error: {0}")]
    Transport(String),
}

/// Inbound frames of one open channel. The channel is closed when the stream ends.
pub type FrameStream = BoxStream<'static, Result<ChannelFrame, ChannelError>>;

/// Opens the duplex channel the supervisor listens on.
pub trait ChannelConnector: Send + Sync + 'static {
    fn open(&self) -> impl Future<Output = Result<FrameStream, ChannelError>> + Send;
}

/// Reacts to a remote write. Must return without waiting for the resync.
pub trait ResyncTrigger: Send + Sync + 'static {
    fn resync(&self);
}

/// Delay schedule between reconnect attempts. Retries never stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base: delay,
            factor: 1.0,
            max: delay,
        }
    }

    pub fn from_settings(settings: &RealtimeSettings) -> Self {
        let base = settings.retry_delay();
        let factor = settings.backoff_factor;
        Self {
            base,
            factor: if factor.is_finite() { factor.max(1.0) } else { 1.0 },
            max: settings.max_retry_delay().max(base),
        }
    }

    /// Delay to use after another failed attempt waited `current`. Never
    /// exceeds `max`, whatever the factor.
    pub fn next(&self, current: Duration) -> Duration {
        if self.factor.is_nan() || self.factor <= 1.0 {
            return current.min(self.max);
        }
        let grown = current.as_secs_f64() * self.factor;
        if !grown.is_finite() || grown >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::try_from_secs_f64(grown).map_or(self.max, |d| d.min(self.max))
    }
}

/// Keeps one realtime channel open and resyncs the feed on remote writes.
///
/// The loop runs on a spawned task: open, read frames until the stream ends,
/// wait the retry delay, open again. [`connect`](Self::connect) replaces a
/// running loop, so at most one channel is open per supervisor.
pub struct ChannelSupervisor<C, R> {
    shared: Arc<Shared<C, R>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Shared<C, R> {
    connector: C,
    trigger: R,
    policy: RetryPolicy,
    status: watch::Sender<ChannelStatus>,
    metrics: Arc<SyncMetrics>,
}

impl<C: ChannelConnector, R: ResyncTrigger> ChannelSupervisor<C, R> {
    pub fn new(connector: C, trigger: R, policy: RetryPolicy, metrics: Arc<SyncMetrics>) -> Self {
        let (status, _) = watch::channel(ChannelStatus {
            state: ChannelState::Disconnected,
            connected: false,
            retry_delay: policy.base,
            attempts: 0,
        });
        Self {
            shared: Arc::new(Shared {
                connector,
                trigger,
                policy,
                status,
                metrics,
            }),
            task: Mutex::new(None),
        }
    }

    /// Start the connect loop, closing any channel this supervisor holds.
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.take() {
            debug!("closing previous realtime channel");
            previous.abort();
        }
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move { shared.run().await }));
    }

    /// Stop the loop and close the channel.
    pub fn shutdown(&self) {
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            info!("realtime channel stopped");
        }
        self.shared.mark_disconnected();
    }

    pub fn status(&self) -> ChannelStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.subscribe()
    }
}

impl<C, R> Drop for ChannelSupervisor<C, R> {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = task.take() {
            task.abort();
        }
    }
}

impl<C: ChannelConnector, R: ResyncTrigger> Shared<C, R> {
    async fn run(&self) {
        let mut delay = self.policy.base;
        loop {
            self.update(|s| {
                s.state = ChannelState::Connecting;
                s.attempts += 1;
            });
            self.metrics.record_connect_attempt();

            match self.connector.open().await {
                Ok(frames) => {
                    delay = self.policy.base;
                    self.update(|s| {
                        s.state = ChannelState::Connected;
                        s.connected = true;
                        s.retry_delay = delay;
                    });
                    info!("realtime channel connected");
                    self.listen(frames).await;
                    info!("realtime channel closed");
                }
                Err(e) => warn!("{e}"),
            }

            self.mark_disconnected();
            self.update(|s| {
                s.state = ChannelState::AwaitingRetry;
                s.retry_delay = delay;
            });
            debug!("reconnecting in {delay:?}");
            tokio::time::sleep(delay).await;
            delay = self.policy.next(delay);
        }
    }

    async fn listen(&self, mut frames: FrameStream) {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(ChannelFrame::Text(text)) => self.handle_message(&text),
                Ok(ChannelFrame::Other) => {}
                Err(e) => {
                    // The stream decides when the channel is closed.
                    warn!("{e}");
                    self.update(|s| s.connected = false);
                }
            }
        }
    }

    fn handle_message(&self, text: &str) {
        match RealtimeEvent::parse(text) {
            Ok(event) if event.is_remote_write() => {
                self.metrics.record_remote_write();
                debug!("remote write announced: {event:?}");
                self.trigger.resync();
            }
            Ok(event) => debug!("ignoring realtime event {event:?}"),
            Err(e) => debug!("ignoring unreadable realtime frame: {e}"),
        }
    }

    fn mark_disconnected(&self) {
        self.update(|s| {
            s.state = ChannelState::Disconnected;
            s.connected = false;
        });
    }

    fn update(&self, f: impl FnOnce(&mut ChannelStatus)) {
        self.status.send_modify(f);
    }
}
