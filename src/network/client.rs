// Network client interface for the frame loop
// Provides channels to communicate with the connection manager running on the network thread

use std::time::Duration;

use tokio::sync::{mpsc, watch};

use super::connection::ConnectionStatus;
use super::protocol::{ClientMessage, ServerMessage};

/// Commands the frame loop sends to the network thread
#[derive(Debug)]
pub enum NetworkCommand {
    /// Open the channel; ignored while connecting or connected
    Connect,

    /// Encode and send one message; dropped while not connected
    Send(ClientMessage),

    /// Close the channel and stop every timer
    Teardown,
}

/// Events the network thread sends to the frame loop
#[derive(Debug)]
pub enum NetworkEvent {
    /// A decoded game message for the state store
    Message(ServerMessage),

    /// Round trip measured from a ping and its pong
    RoundTrip(Duration),
}

/// Handle for the frame loop to communicate with the network.
/// Every method is non-blocking so it can be called from inside a tick.
pub struct NetworkClient {
    pub(super) commands: mpsc::UnboundedSender<NetworkCommand>,
    pub(super) events: mpsc::UnboundedReceiver<NetworkEvent>,
    pub(super) status: watch::Receiver<ConnectionStatus>,
}

impl NetworkClient {
    pub(super) fn new(
        commands: mpsc::UnboundedSender<NetworkCommand>,
        events: mpsc::UnboundedReceiver<NetworkEvent>,
        status: watch::Receiver<ConnectionStatus>,
    ) -> Self {
        Self {
            commands,
            events,
            status,
        }
    }

    pub fn connect(&self) {
        let _ = self.commands.send(NetworkCommand::Connect);
    }

    pub fn send(&self, message: ClientMessage) {
        let _ = self.commands.send(NetworkCommand::Send(message));
    }

    /// Safe to call any number of times, and after the network thread has already stopped
    pub fn teardown(&self) {
        let _ = self.commands.send(NetworkCommand::Teardown);
    }

    /// Try to receive a network event (non-blocking).
    /// Returns None if no events are available.
    pub fn try_recv_event(&mut self) -> Option<NetworkEvent> {
        self.events.try_recv().ok()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.teardown();
    }
}
