// Networking module for Pong404
// Owns the websocket channel to the game server on a background thread

pub mod client;
pub mod connection;
pub mod protocol;
pub mod router;
pub mod transport;

#[cfg(test)]
mod mock;

pub use client::{NetworkClient, NetworkCommand, NetworkEvent};
pub use connection::{BootPhase, ConnectionManager, ConnectionPhase, ConnectionStatus};
pub use protocol::{ClientMessage, PaddleUpdateData, ServerMessage};
pub use router::{dispatch, InboundHandler, MessageRouter};
pub use transport::WsConnector;

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::error;

use crate::config::NetworkConfig;

/// Start the connection manager on its own thread with a tokio runtime.
/// Returns the NetworkClient handle the frame loop talks to.
pub fn start_network(
    config: &NetworkConfig,
    url: &str,
    player_id: &str,
    room_id: &str,
) -> io::Result<NetworkClient> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let connector = Arc::new(WsConnector::new(
        config.health_path.clone(),
        Duration::from_millis(config.health_timeout_ms),
    ));
    let (manager, client) =
        ConnectionManager::new(connector, config.clone(), url, player_id, room_id);

    thread::Builder::new()
        .name("pong404-network".to_string())
        .spawn(move || {
            runtime.block_on(manager.run());
        })
        .map_err(|e| {
            error!(error = %e, "failed to spawn network thread");
            e
        })?;

    Ok(client)
}
