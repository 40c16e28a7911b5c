//! WebSocket transport for STOMP sessions
//!
//! `ConnectionFactory` and `FrameSocket` abstract the socket so subscription
//! logic can be tested without a network. The default implementation uses
//! tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::{QueueError, Result};

/// A text-message socket carrying STOMP frames
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait FrameSocket: Send {
    /// Send one text message
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Read the next text message
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn next_text(&mut self) -> Result<Option<String>>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// Opens sockets to the broker
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameSocket>>;
}

/// Production factory using tokio-tungstenite
#[derive(Debug, Default)]
pub struct WebSocketConnectionFactory;

impl WebSocketConnectionFactory {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConnectionFactory for WebSocketConnectionFactory {
    async fn connect(&self, url: &str) -> Result<Box<dyn FrameSocket>> {
        tracing::debug!("Opening WebSocket to {}", url);
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| QueueError::WebSocket(format!("Connecting to {} failed: {}", url, e)))?;
        tracing::debug!("WebSocket to {} open ({})", url, response.status());
        Ok(Box::new(TungsteniteSocket { stream }))
    }
}

struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FrameSocket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| QueueError::WebSocket(format!("Send failed: {}", e)))
    }

    async fn next_text(&mut self) -> Result<Option<String>> {
        while let Some(message) = self.stream.next().await {
            let message =
                message.map_err(|e| QueueError::WebSocket(format!("Receive failed: {}", e)))?;
            match message {
                Message::Text(text) => return Ok(Some(text.to_string())),
                Message::Binary(bytes) => {
                    let text = String::from_utf8(bytes.to_vec()).map_err(|e| {
                        QueueError::WebSocket(format!("Binary message is not UTF-8: {}", e))
                    })?;
                    return Ok(Some(text));
                }
                Message::Close(frame) => {
                    tracing::debug!("WebSocket closed by peer: {:?}", frame);
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| QueueError::WebSocket(format!("Close failed: {}", e)))
    }
}
