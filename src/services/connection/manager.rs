//! Connection Manager
//!
//! Owns the persistent duplex connection to the analysis service. A
//! supervisor task per `connect` call opens the link, fans incoming messages
//! out to registered handlers and reconnects with bounded exponential
//! backoff when the link drops. `disconnect` cancels the supervisor and
//! suppresses automatic reconnection until the next explicit `connect`.

use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uilens_core::{ClientMessage, ServerMessage};

use super::backoff::{ReconnectConfig, ReconnectPolicy};
use super::transport::{Connector, DuplexChannel, Transport};
use crate::services::scheduler::Scheduler;
use crate::utils::error::{AppError, AppResult};

/// Callback for every parsed server message.
pub type MessageHandler = Arc<dyn Fn(ServerMessage) + Send + Sync>;

/// Callback for link state changes.
pub type ConnectionListener = Arc<dyn Fn(ConnectionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Closed,
}

/// Connection runtime status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub url: Option<String>,
    pub connected_since: Option<String>,
    /// Number of reconnect attempts since the last successful open
    #[serde(default)]
    pub reconnect_attempts: u32,
    /// Whether a reconnect is currently scheduled
    #[serde(default)]
    pub reconnecting: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub last_error_at: Option<String>,
    #[serde(default)]
    pub messages_received: u64,
}

struct Link {
    policy: ReconnectPolicy,
    outbound: Option<mpsc::UnboundedSender<String>>,
    cancel: CancellationToken,
    status: ConnectionStatus,
}

struct Shared {
    link: Mutex<Link>,
    handlers: RwLock<Vec<MessageHandler>>,
    listeners: RwLock<Vec<ConnectionListener>>,
}

impl Shared {
    fn lock_link(&self) -> MutexGuard<'_, Link> {
        self.link
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record an open link. Returns `false` if this supervisor was superseded.
    fn opened(&self, cancel: &CancellationToken, outbound: mpsc::UnboundedSender<String>) -> bool {
        let mut link = self.lock_link();
        if cancel.is_cancelled() {
            return false;
        }
        link.policy.reset();
        link.outbound = Some(outbound);
        link.status.connected = true;
        link.status.reconnecting = false;
        link.status.reconnect_attempts = 0;
        link.status.connected_since = Some(chrono::Utc::now().to_rfc3339());
        link.status.error = None;
        true
    }

    /// Record a dropped link or failed attempt.
    fn closed(&self, cancel: &CancellationToken, error: Option<String>) -> bool {
        let mut link = self.lock_link();
        if cancel.is_cancelled() {
            return false;
        }
        link.outbound = None;
        link.status.connected = false;
        link.status.connected_since = None;
        if let Some(error) = error {
            link.status.error = Some(error);
            link.status.last_error_at = Some(chrono::Utc::now().to_rfc3339());
        }
        true
    }

    fn schedule_retry(&self, cancel: &CancellationToken) -> Option<std::time::Duration> {
        let mut link = self.lock_link();
        if cancel.is_cancelled() {
            return None;
        }
        let delay = link.policy.next_delay();
        link.status.reconnecting = delay.is_some();
        link.status.reconnect_attempts = link.policy.attempts();
        delay
    }

    fn dispatch(&self, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "ignoring malformed server message");
                return;
            }
        };
        self.lock_link().status.messages_received += 1;

        let handlers = self
            .handlers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for handler in handlers {
            handler(message.clone());
        }
    }

    fn notify(&self, event: ConnectionEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            listener(event);
        }
    }
}

/// Manager for the connection to the analysis service.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    scheduler: Arc<dyn Scheduler>,
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        scheduler: Arc<dyn Scheduler>,
        config: ReconnectConfig,
    ) -> Self {
        Self {
            connector,
            scheduler,
            shared: Arc::new(Shared {
                link: Mutex::new(Link {
                    policy: ReconnectPolicy::new(config),
                    outbound: None,
                    cancel: CancellationToken::new(),
                    status: ConnectionStatus::default(),
                }),
                handlers: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Register a handler for incoming server messages.
    pub fn on_message(&self, handler: MessageHandler) {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handler);
    }

    /// Register a listener for open/close transitions.
    pub fn on_connection_change(&self, listener: ConnectionListener) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    /// Open a connection to `url`, replacing any existing one.
    ///
    /// Resolves with the outcome of the first attempt. On failure the
    /// supervisor keeps retrying in the background until the attempt budget
    /// is spent.
    pub async fn connect(&self, url: &str) -> AppResult<()> {
        let (cancel, was_connected) = {
            let mut link = self.shared.lock_link();
            link.cancel.cancel();
            link.cancel = CancellationToken::new();
            link.policy.reset();
            link.outbound = None;
            let was_connected = link.status.connected;
            link.status = ConnectionStatus {
                url: Some(url.to_string()),
                messages_received: link.status.messages_received,
                ..Default::default()
            };
            (link.cancel.clone(), was_connected)
        };
        if was_connected {
            self.shared.notify(ConnectionEvent::Closed);
        }

        let supervisor = Supervisor {
            connector: self.connector.clone(),
            scheduler: self.scheduler.clone(),
            shared: self.shared.clone(),
            url: url.to_string(),
            cancel,
        };
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(supervisor.run(ready_tx));

        ready_rx
            .await
            .unwrap_or_else(|_| Err(AppError::ChannelClosed("connect superseded".to_string())))
    }

    /// Close the connection and suppress automatic reconnection.
    pub fn disconnect(&self) {
        let was_connected = {
            let mut link = self.shared.lock_link();
            link.policy.suppress();
            link.cancel.cancel();
            link.outbound = None;
            let was_connected = link.status.connected;
            link.status.connected = false;
            link.status.connected_since = None;
            link.status.reconnecting = false;
            link.status.reconnect_attempts = link.policy.attempts();
            was_connected
        };
        info!("disconnected from analysis service");
        if was_connected {
            self.shared.notify(ConnectionEvent::Closed);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.shared.lock_link().status.clone()
    }

    fn push(&self, text: String) -> AppResult<()> {
        let link = self.shared.lock_link();
        let outbound = link
            .outbound
            .as_ref()
            .ok_or(AppError::ConnectionUnavailable)?;
        outbound
            .send(text)
            .map_err(|_| AppError::ConnectionUnavailable)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shared.lock_link().cancel.cancel();
    }
}

#[async_trait]
impl Transport for ConnectionManager {
    fn is_connected(&self) -> bool {
        self.shared.lock_link().status.connected
    }

    async fn send(&self, message: &ClientMessage) -> AppResult<()> {
        let text = message.to_json()?;
        self.push(text)?;
        debug!(kind = message.kind(), request_id = ?message.request_id(), "message sent");
        Ok(())
    }
}

/// Background task owning one `connect` generation.
struct Supervisor {
    connector: Arc<dyn Connector>,
    scheduler: Arc<dyn Scheduler>,
    shared: Arc<Shared>,
    url: String,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(self, ready: oneshot::Sender<AppResult<()>>) {
        let mut ready = Some(ready);
        loop {
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => return,
                result = self.connector.connect(&self.url) => result,
            };

            match attempt {
                Ok(DuplexChannel {
                    outbound,
                    mut inbound,
                }) => {
                    if !self.shared.opened(&self.cancel, outbound) {
                        return;
                    }
                    info!(url = %self.url, "connected to analysis service");
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Ok(()));
                    }
                    self.shared.notify(ConnectionEvent::Opened);

                    loop {
                        let frame = tokio::select! {
                            _ = self.cancel.cancelled() => return,
                            frame = inbound.recv() => frame,
                        };
                        match frame {
                            Some(text) => self.shared.dispatch(&text),
                            None => break,
                        }
                    }

                    if !self.shared.closed(&self.cancel, None) {
                        return;
                    }
                    info!(url = %self.url, "connection closed by peer");
                    self.shared.notify(ConnectionEvent::Closed);
                }
                Err(err) => {
                    warn!(url = %self.url, error = %err, "connection attempt failed");
                    if !self.shared.closed(&self.cancel, Some(err.to_string())) {
                        return;
                    }
                    if let Some(tx) = ready.take() {
                        let _ = tx.send(Err(err));
                    }
                }
            }

            let Some(delay) = self.shared.schedule_retry(&self.cancel) else {
                warn!(
                    url = %self.url,
                    "reconnect attempts exhausted; waiting for explicit connect"
                );
                return;
            };
            info!(
                url = %self.url,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = self.scheduler.sleep(delay) => {}
            }
        }
    }
}
