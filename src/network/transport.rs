// Message channel abstraction plus its websocket implementation
// The connection manager only ever talks to a `Connector` and the `Transport` it hands back

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reqwest::Url;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not open channel: {0}")]
    Connect(String),

    #[error("channel closed (code {code}): {reason}")]
    Closed { code: u16, reason: String },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

/// One open, bidirectional text channel
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Next text frame. `None` means the peer closed the channel cleanly.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports and answers whether a remote endpoint is already awake
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError>;

    /// Health probe used to skip the cold-start wait. Failure just means "assume cold".
    async fn is_warm(&self, _url: &str) -> bool {
        true
    }
}

/// Loopback endpoints never need a cold-start wait and get the short connect timeout
pub fn is_local_endpoint(url: &str) -> bool {
    match Url::parse(url) {
        Ok(url) => matches!(
            url.host_str(),
            Some("localhost") | Some("127.0.0.1") | Some("[::1]") | Some("::1")
        ),
        Err(_) => false,
    }
}

/// `ws://host/ws` becomes `http://host/<health_path>`
pub fn health_url(url: &str, health_path: &str) -> Option<Url> {
    let mut url = Url::parse(url).ok()?;
    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => return None,
    };
    url.set_scheme(scheme).ok()?;
    url.set_path(health_path);
    url.set_query(None);
    Some(url)
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            let frame = match self.stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    return Some(Err(TransportError::Closed {
                        code: 1006,
                        reason: "stream ended without close frame".to_string(),
                    }))
                }
            };

            match frame {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => {
                    return Some(Ok(String::from_utf8_lossy(&bytes).into_owned()))
                }
                Message::Close(None) => return None,
                Message::Close(Some(close)) if close.code == CloseCode::Normal => return None,
                Message::Close(Some(close)) => {
                    return Some(Err(TransportError::Closed {
                        code: u16::from(close.code),
                        reason: close.reason.to_string(),
                    }))
                }
                // Control frames are answered by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    trace!("control frame");
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Websocket connector with an HTTP health probe for remote endpoints
pub struct WsConnector {
    http: reqwest::Client,
    health_path: String,
    health_timeout: Duration,
}

impl WsConnector {
    pub fn new(health_path: impl Into<String>, health_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            health_path: health_path.into(),
            health_timeout,
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        let (stream, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        debug!(status = %response.status(), url, "websocket handshake complete");
        Ok(Box::new(WsTransport { stream }))
    }

    async fn is_warm(&self, url: &str) -> bool {
        let Some(health) = health_url(url, &self.health_path) else {
            return false;
        };

        match self.http.get(health).timeout(self.health_timeout).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "health probe answered");
                response.status().is_success()
            }
            Err(e) => {
                debug!(error = %e, "health probe failed, assuming cold endpoint");
                false
            }
        }
    }
}
