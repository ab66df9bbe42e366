// Scripted connector for connection tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{Connector, Transport, TransportError};

/// What the next connect attempt does
#[derive(Debug, Clone, Copy)]
pub enum MockAttempt {
    Accept,
    Fail,
    /// Never resolves, so only the hard deadline ends the attempt
    Hang,
    /// Opens, delivers the first `after` sends, then every later send pends forever
    StallSends { after: usize },
}

/// Connector that follows a script, then accepts every further attempt
pub struct MockConnector {
    script: Mutex<VecDeque<MockAttempt>>,
    attempts: AtomicUsize,
    warm: AtomicBool,
    servers: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    pub fn new(script: Vec<MockAttempt>) -> (Arc<Self>, mpsc::UnboundedReceiver<MockServer>) {
        let (servers, server_rx) = mpsc::unbounded_channel();
        let connector = Self {
            script: Mutex::new(script.into()),
            attempts: AtomicUsize::new(0),
            warm: AtomicBool::new(true),
            servers,
        };
        (Arc::new(connector), server_rx)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_warm(&self, warm: bool) {
        self.warm.store(warm, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockAttempt::Accept);

        let stall_after = match next {
            MockAttempt::Accept => None,
            MockAttempt::StallSends { after } => Some(after),
            MockAttempt::Fail => {
                return Err(TransportError::Connect("connection refused".to_string()))
            }
            MockAttempt::Hang => std::future::pending().await,
        };

        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.servers.send(MockServer {
            sent: sent_rx,
            inbound: inbound_tx,
            closed: Arc::clone(&closed),
        });
        Ok(Box::new(MockTransport {
            sent: sent_tx,
            inbound: inbound_rx,
            closed,
            stall_after,
            delivered: 0,
        }))
    }

    async fn is_warm(&self, _url: &str) -> bool {
        self.warm.load(Ordering::SeqCst)
    }
}

/// Server side of one accepted mock channel
pub struct MockServer {
    pub sent: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<Option<String>>,
    closed: Arc<AtomicBool>,
}

impl MockServer {
    pub fn push(&self, text: &str) {
        let _ = self.inbound.send(Some(text.to_string()));
    }

    /// Close the channel cleanly from the server side
    pub fn close(&self) {
        let _ = self.inbound.send(None);
    }

    /// Whether the client closed its end
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockTransport {
    sent: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<Option<String>>,
    closed: Arc<AtomicBool>,
    stall_after: Option<usize>,
    delivered: usize,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        if self.stall_after.is_some_and(|after| self.delivered >= after) {
            // Full send buffer on a half-open socket
            std::future::pending::<()>().await;
        }
        self.delivered += 1;
        let _ = self.sent.send(text);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        match self.inbound.recv().await {
            Some(Some(text)) => Some(Ok(text)),
            Some(None) => None,
            None => Some(Err(TransportError::Closed {
                code: 1006,
                reason: "mock server dropped".to_string(),
            })),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
