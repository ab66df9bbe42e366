// One participant's relationship to a match

use rand::Rng;

use super::state::{Role, Side};
use crate::network::ConnectionPhase;

#[derive(Debug, Clone)]
pub struct Session {
    pub player_id: String,
    pub room_id: String,

    /// None until the server confirms room membership
    pub role: Option<Role>,

    pub phase: ConnectionPhase,
    pub player_count: u8,
}

impl Session {
    pub fn new(player_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
            room_id: room_id.into(),
            role: None,
            phase: ConnectionPhase::Idle,
            player_count: 0,
        }
    }

    /// Session that owns `side` from the start, for play without a server
    pub fn offline(side: Side) -> Self {
        Self {
            role: Some(Role::from(side)),
            ..Self::new(generate_player_id(), "offline")
        }
    }

    /// Paddle this client may write, if it holds a player seat
    pub fn local_side(&self) -> Option<Side> {
        self.role.and_then(Role::side)
    }
}

/// Opaque id generated once per process: `p-` followed by 8 base36 characters
pub fn generate_player_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("p-{}", suffix)
}
