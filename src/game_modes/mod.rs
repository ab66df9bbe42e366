mod common;
mod local;
mod network;

pub use local::{run_game_local, OfflineGame};
pub use network::{run_game_network, OnlineGame};
