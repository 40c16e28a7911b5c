//! Channel subscriptions over STOMP with a reconnect policy
//!
//! Each `Subscription` is backed by its own task that owns the socket. When a
//! session drops or cannot be established the task waits
//! `ReconnectConfig::interval_seconds` and tries again, up to `max_retries`
//! consecutive failures. Dropping the `Subscription` stops the task.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectConfig;
use crate::connection::{ConnectionFactory, FrameSocket};
use crate::error::{QueueError, Result};
use crate::stomp::{parse_frames, Command, Frame};

/// Subscription id used in SUBSCRIBE; one destination per session
const SUBSCRIPTION_ID: &str = "sub-0";

/// Lifecycle and data events of a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Session established and SUBSCRIBE sent
    Connected,
    /// Body of a MESSAGE frame
    Message(String),
    /// An established session ended
    Disconnected { reason: String },
    /// A connection attempt failed before the session was established
    ConnectFailed { reason: String },
    /// Waiting before the given reconnect attempt
    Reconnecting {
        attempt: u32,
        max_attempts: Option<u32>,
    },
    /// Retries exhausted, the subscription is finished
    ReconnectFailed { reason: String },
}

/// Receiving end of a channel subscription
pub struct Subscription {
    topic: String,
    events: mpsc::Receiver<ChannelEvent>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish()
    }
}

impl Subscription {
    /// Subscription fed by the caller through the returned sender
    pub fn manual(topic: &str) -> (Self, mpsc::Sender<ChannelEvent>) {
        let (tx, rx) = mpsc::channel(100);
        let subscription = Self {
            topic: topic.to_string(),
            events: rx,
            cancel: CancellationToken::new(),
        };
        (subscription, tx)
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Token that is cancelled when this subscription is closed
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next event, or `None` once the subscription has finished
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Next message body, skipping lifecycle events
    pub async fn next_message(&mut self) -> Option<String> {
        while let Some(event) = self.events.recv().await {
            match event {
                ChannelEvent::Message(body) => return Some(body),
                other => debug!("Subscription {}: {:?}", self.topic, other),
            }
        }
        None
    }

    /// Stop the subscription and its connection
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens channel subscriptions
pub trait Subscriber: Send + Sync {
    fn subscribe(&self, topic: &str) -> Subscription;
}

/// Subscriber that speaks STOMP over WebSocket to the broker
pub struct StompSubscriber {
    url: String,
    host: String,
    reconnect: ReconnectConfig,
    factory: Arc<dyn ConnectionFactory>,
}

impl StompSubscriber {
    pub fn new(
        url: &str,
        reconnect: ReconnectConfig,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| QueueError::Config(format!("Invalid WebSocket URL {:?}: {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| QueueError::Config(format!("WebSocket URL {:?} has no host", url)))?
            .to_string();
        Ok(Self {
            url: url.to_string(),
            host,
            reconnect,
            factory,
        })
    }
}

impl Subscriber for StompSubscriber {
    fn subscribe(&self, topic: &str) -> Subscription {
        let (subscription, tx) = Subscription::manual(topic);
        let task = SubscriptionTask {
            url: self.url.clone(),
            host: self.host.clone(),
            topic: topic.to_string(),
            reconnect: self.reconnect.clone(),
            factory: Arc::clone(&self.factory),
            events: tx,
            cancel: subscription.cancellation(),
        };
        tokio::spawn(task.run());
        subscription
    }
}

struct SubscriptionTask {
    url: String,
    host: String,
    topic: String,
    reconnect: ReconnectConfig,
    factory: Arc<dyn ConnectionFactory>,
    events: mpsc::Sender<ChannelEvent>,
    cancel: CancellationToken,
}

impl SubscriptionTask {
    async fn emit(&self, event: ChannelEvent) -> bool {
        self.events.send(event).await.is_ok()
    }

    async fn run(self) {
        let mut attempt = 0u32;

        loop {
            let mut established = false;
            let outcome = self.session(&mut established).await;
            if self.cancel.is_cancelled() {
                break;
            }

            if established {
                attempt = 0;
                let reason = match &outcome {
                    Ok(()) => "closed by server".to_string(),
                    Err(e) => e.to_string(),
                };
                info!("Subscription {} disconnected: {}", self.topic, reason);
                if !self.emit(ChannelEvent::Disconnected { reason }).await {
                    break;
                }
            } else {
                let reason = match outcome {
                    Ok(()) => "connection closed".to_string(),
                    Err(e) => e.to_string(),
                };
                warn!("Subscription {} failed to connect: {}", self.topic, reason);
                if !self.emit(ChannelEvent::ConnectFailed { reason }).await {
                    break;
                }
            }

            if !self.reconnect.enabled {
                debug!("Auto-reconnect disabled for {}", self.topic);
                break;
            }

            attempt += 1;
            if let Some(max) = self.reconnect.max_retries {
                if attempt > max {
                    warn!(
                        "Subscription {}: max retries ({}) exceeded",
                        self.topic, max
                    );
                    self.emit(ChannelEvent::ReconnectFailed {
                        reason: format!("Max retries ({}) exceeded", max),
                    })
                    .await;
                    break;
                }
            }

            info!(
                "Reconnecting {} (attempt {}/{})",
                self.topic,
                attempt,
                self.reconnect
                    .max_retries
                    .map_or("unlimited".to_string(), |m| m.to_string())
            );
            if !self
                .emit(ChannelEvent::Reconnecting {
                    attempt,
                    max_attempts: self.reconnect.max_retries,
                })
                .await
            {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect.interval()) => {}
                _ = self.cancel.cancelled() => break,
            }
        }

        debug!("Subscription task for {} finished", self.topic);
    }

    /// One STOMP session: CONNECT, SUBSCRIBE, then forward MESSAGE bodies
    ///
    /// Returns `Ok(())` when the server closes the socket or the subscription
    /// is cancelled.
    async fn session(&self, established: &mut bool) -> Result<()> {
        let connecting = tokio::select! {
            _ = self.cancel.cancelled() => None,
            socket = self.factory.connect(&self.url) => Some(socket),
        };
        let Some(socket) = connecting else {
            return Ok(());
        };
        let mut socket = socket?;
        socket.send_text(Frame::connect(&self.host).encode()).await?;

        let handshake = tokio::select! {
            _ = self.cancel.cancelled() => None,
            result = wait_for_connected(socket.as_mut()) => Some(result),
        };
        match handshake {
            Some(result) => result?,
            None => {
                let _ = socket.close().await;
                return Ok(());
            }
        }

        socket
            .send_text(Frame::subscribe(SUBSCRIPTION_ID, &self.topic).encode())
            .await?;
        *established = true;
        info!("Subscribed to {}", self.topic);
        if !self.emit(ChannelEvent::Connected).await {
            return Ok(());
        }

        loop {
            let received = tokio::select! {
                _ = self.cancel.cancelled() => None,
                text = socket.next_text() => Some(text),
            };
            let Some(text) = received else {
                debug!("Closing session for {}", self.topic);
                let _ = socket.send_text(Frame::disconnect().encode()).await;
                let _ = socket.close().await;
                return Ok(());
            };
            let Some(text) = text? else {
                return Ok(());
            };

            for frame in parse_frames(&text)? {
                match frame.command {
                    Command::Message => {
                        let matches = frame
                            .get_header("subscription")
                            .is_none_or(|id| id == SUBSCRIPTION_ID);
                        if !matches {
                            debug!("Ignoring MESSAGE for another subscription");
                            continue;
                        }
                        debug!("MESSAGE on {} ({} bytes)", self.topic, frame.body.len());
                        if !self.emit(ChannelEvent::Message(frame.body)).await {
                            return Ok(());
                        }
                    }
                    Command::Error => return Err(broker_error(&frame)),
                    other => debug!("Ignoring {} frame on {}", other, self.topic),
                }
            }
        }
    }
}

async fn wait_for_connected(socket: &mut dyn FrameSocket) -> Result<()> {
    loop {
        let text = socket.next_text().await?.ok_or_else(|| {
            QueueError::Stomp("Connection closed before CONNECTED".to_string())
        })?;
        for frame in parse_frames(&text)? {
            match frame.command {
                Command::Connected => {
                    debug!(
                        "STOMP session established (version {})",
                        frame.get_header("version").unwrap_or("unknown")
                    );
                    return Ok(());
                }
                Command::Error => return Err(broker_error(&frame)),
                other => debug!("Ignoring {} frame before CONNECTED", other),
            }
        }
    }
}

fn broker_error(frame: &Frame) -> QueueError {
    let message = frame.get_header("message").unwrap_or("no message");
    if frame.body.is_empty() {
        QueueError::Stomp(format!("Broker error: {}", message))
    } else {
        QueueError::Stomp(format!("Broker error: {}: {}", message, frame.body.trim()))
    }
}

/// Runs a handler for every message of a subscription on its own task
///
/// Messages are handled one at a time, in arrival order. Dropping the
/// listener stops the task and closes the subscription.
pub struct Listener {
    topic: String,
    handle: JoinHandle<()>,
}

impl Listener {
    pub fn spawn<F, Fut>(mut subscription: Subscription, mut on_message: F) -> Self
    where
        F: FnMut(String) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let topic = subscription.topic().to_string();
        let handle = tokio::spawn(async move {
            while let Some(body) = subscription.next_message().await {
                on_message(body).await;
            }
            debug!("Listener for {} finished", subscription.topic());
        });
        Self { topic, handle }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
