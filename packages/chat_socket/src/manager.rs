use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::BackoffPolicy;
use crate::connector::{Connector, TungsteniteConnector};
use crate::error::SocketError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle of the managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Waiting `delay` before reconnect attempt number `attempt`.
    Reconnecting { attempt: u32, delay: Duration },
    /// Retries exhausted; no further attempts will be made.
    Failed,
    /// Torn down by the owner.
    Closed,
}

/// Everything the driver observes, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    /// A text frame from the assistant.
    Message(String),
    Closed { code: Option<u16>, reason: String },
    Error(String),
    ReconnectScheduled { attempt: u32, delay: Duration },
    GaveUp,
}

/// Caller-facing side of the connection. The socket itself never leaves the
/// driver task. Dropping the handle tears the connection down.
pub struct ConnectionHandle {
    outbound: mpsc::UnboundedSender<String>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

pub struct ConnectionManager;

impl ConnectionManager {
    /// Connect to `url` with tokio-tungstenite and keep the socket alive.
    pub fn spawn(
        url: impl Into<String>,
        policy: BackoffPolicy,
    ) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
        Self::spawn_with(TungsteniteConnector, url, policy)
    }

    /// Like [`ConnectionManager::spawn`] with a custom connector.
    pub fn spawn_with<C: Connector>(
        connector: C,
        url: impl Into<String>,
        policy: BackoffPolicy,
    ) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let driver = Driver {
            connector,
            url: url.into(),
            policy,
            outbound: outbound_rx,
            events: event_tx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        let handle = ConnectionHandle {
            outbound: outbound_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        };
        (handle, event_rx)
    }
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Queue a JSON frame on the open socket. Fire-and-forget: delivery is
    /// not confirmed and nothing is retried.
    pub fn send<T: Serialize + ?Sized>(&self, payload: &T) -> Result<(), SocketError> {
        match self.state() {
            ConnectionState::Open => {}
            ConnectionState::Failed | ConnectionState::Closed => {
                return Err(SocketError::Shutdown);
            }
            _ => return Err(SocketError::NotConnected),
        }
        let json = serde_json::to_string(payload)?;
        self.outbound
            .send(json)
            .map_err(|_| SocketError::Shutdown)
    }

    /// Poll until the socket is open, failing after `timeout`.
    pub async fn wait_for_connection(
        &self,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), SocketError> {
        let start = tokio::time::Instant::now();
        loop {
            if self.is_open() {
                return Ok(());
            }
            if start.elapsed() > timeout {
                return Err(SocketError::ConnectTimeout(timeout));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Cancel any pending reconnect and close the socket without retrying.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Close and wait for the driver task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a single socket session ended.
enum SessionEnd {
    Lost,
    Cancelled,
}

struct Driver<C: Connector> {
    connector: C,
    url: String,
    policy: BackoffPolicy,
    outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<C: Connector> Driver<C> {
    async fn run(mut self) {
        let mut retry_count: u32 = 0;

        loop {
            info!(url = %self.url, retry = retry_count, "connecting websocket");
            self.state.send_replace(ConnectionState::Connecting);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.connector.connect(&self.url) => result,
            };

            let end = match connected {
                Ok(socket) => {
                    info!(url = %self.url, "websocket open");
                    retry_count = 0;
                    self.state.send_replace(ConnectionState::Open);
                    // A cancel here is picked up by the pump, which closes the socket.
                    self.emit(ConnectionEvent::Opened).await;

                    let end = self.pump(socket).await;
                    self.discard_unsent();
                    end
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "websocket connect failed");
                    self.report_lost(Some(e.to_string()), None, String::new())
                        .await
                }
            };
            if let SessionEnd::Cancelled = end {
                break;
            }

            let Some(delay) = self.policy.delay_for(retry_count) else {
                error!(retries = retry_count, "max reconnect retries reached");
                self.state.send_replace(ConnectionState::Failed);
                self.emit(ConnectionEvent::GaveUp).await;
                return;
            };

            let attempt = retry_count + 1;
            debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling reconnect");
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt, delay });
            if !self
                .emit(ConnectionEvent::ReconnectScheduled { attempt, delay })
                .await
            {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            retry_count += 1;
        }

        debug!(url = %self.url, "connection torn down");
        self.state.send_replace(ConnectionState::Closed);
    }

    /// Shuttle frames until the socket closes, errors, or we are cancelled.
    /// Our side of the socket is always closed on the way out.
    async fn pump(&mut self, socket: C::Socket) -> SessionEnd {
        let (mut ws_write, mut ws_read) = socket.split();

        let end = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break SessionEnd::Cancelled,

                Some(json) = self.outbound.recv() => {
                    if let Err(e) = ws_write.send(Message::Text(json.into())).await {
                        error!(error = %e, "websocket write failed");
                        break self.report_lost(Some(e.to_string()), None, String::new()).await;
                    }
                }

                msg = ws_read.next() => {
                    let delivered = match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.emit(ConnectionEvent::Message(text.as_str().to_owned())).await
                        }
                        Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                            Ok(text) => self.emit(ConnectionEvent::Message(text)).await,
                            Err(_) => {
                                warn!(len = data.len(), "dropping non-UTF-8 binary frame");
                                true
                            }
                        },
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (Some(u16::from(f.code)), f.reason.as_str().to_owned()))
                                .unwrap_or((None, String::new()));
                            info!(code = ?code, reason = %reason, "websocket closed");
                            break self.report_lost(None, code, reason).await;
                        }
                        // Ping/pong are answered by tungstenite.
                        Some(Ok(_)) => true,
                        Some(Err(e)) => {
                            error!(error = %e, "websocket error");
                            break self.report_lost(Some(e.to_string()), None, String::new()).await;
                        }
                        None => {
                            info!("websocket stream ended");
                            break self.report_lost(None, None, String::new()).await;
                        }
                    };
                    if !delivered {
                        break SessionEnd::Cancelled;
                    }
                }
            }
        };

        let _ = ws_write.close().await;
        end
    }

    /// Report a lost socket: the error first when there is one, then the close.
    async fn report_lost(
        &self,
        error: Option<String>,
        code: Option<u16>,
        reason: String,
    ) -> SessionEnd {
        if let Some(error) = error {
            if !self.emit(ConnectionEvent::Error(error)).await {
                return SessionEnd::Cancelled;
            }
        }
        if !self.emit(ConnectionEvent::Closed { code, reason }).await {
            return SessionEnd::Cancelled;
        }
        SessionEnd::Lost
    }

    /// Frames queued for a socket that is gone are dropped, not replayed.
    fn discard_unsent(&mut self) {
        let mut dropped = 0usize;
        while self.outbound.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "discarded frames queued for a closed socket");
        }
    }

    /// Queue an event for the owner. Returns false when cancelled first, so a
    /// full queue that nobody drains can never block teardown.
    async fn emit(&self, event: ConnectionEvent) -> bool {
        tokio::select! {
            biased;

            _ = self.cancel.cancelled() => false,
            // Receiver gone means nobody is listening; the driver keeps going
            // until cancelled.
            _ = self.events.send(event) => true,
        }
    }
}
