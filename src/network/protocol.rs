// Pong404 wire protocol
// JSON messages exchanged with the game server over the websocket channel

use serde::{Deserialize, Serialize};

use crate::game::{Role, Side};

/// Payload of an outbound paddle update. Left/right paddles report `y`, top/bottom report `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaddleUpdateData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    pub velocity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<f32>,

    /// Client wall clock in ms, for receiver-side lag compensation
    pub ts: u64,

    /// Monotonic per-client sequence number; receivers drop anything not newer
    pub seq: u64,
}

impl PaddleUpdateData {
    /// Position along the axis of `side`
    pub fn position(&self, side: Side) -> Option<f32> {
        if side.is_vertical() {
            self.y
        } else {
            self.x
        }
    }
}

/// Messages this client sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom { player_id: String, room_id: String },

    #[serde(rename_all = "camelCase")]
    UpdatePaddle {
        player_id: String,
        data: PaddleUpdateData,
    },

    /// Liveness probe; the server echoes `timestamp` in its pong
    #[serde(rename_all = "camelCase")]
    Ping { player_id: String, timestamp: u64 },

    /// Reply to a server heartbeat
    #[serde(rename_all = "camelCase")]
    HeartbeatAck { player_id: String, timestamp: u64 },
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::JoinRoom { .. } => "join-room",
            ClientMessage::UpdatePaddle { .. } => "update-paddle",
            ClientMessage::Ping { .. } => "ping",
            ClientMessage::HeartbeatAck { .. } => "heartbeat-ack",
        }
    }
}

/// Closed set of inbound message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    RoomJoined,
    PeerJoined,
    PeerLeft,
    RoleSwitched,
    PaddleUpdated,
    FullState,
    DeltaState,
    Reset,
    Heartbeat,
    Pong,
}

// Verbose and compact spellings of every inbound kind
const KIND_NAMES: &[(&str, InboundKind)] = &[
    ("room-joined", InboundKind::RoomJoined),
    ("roomJoined", InboundKind::RoomJoined),
    ("rj", InboundKind::RoomJoined),
    ("peer-joined", InboundKind::PeerJoined),
    ("peerJoined", InboundKind::PeerJoined),
    ("pj", InboundKind::PeerJoined),
    ("peer-left", InboundKind::PeerLeft),
    ("peerLeft", InboundKind::PeerLeft),
    ("pl", InboundKind::PeerLeft),
    ("role-switched", InboundKind::RoleSwitched),
    ("roleSwitched", InboundKind::RoleSwitched),
    ("rs", InboundKind::RoleSwitched),
    ("paddle-updated", InboundKind::PaddleUpdated),
    ("paddleUpdated", InboundKind::PaddleUpdated),
    ("pu", InboundKind::PaddleUpdated),
    ("full-state", InboundKind::FullState),
    ("fullState", InboundKind::FullState),
    ("fs", InboundKind::FullState),
    ("delta-state", InboundKind::DeltaState),
    ("deltaState", InboundKind::DeltaState),
    ("ds", InboundKind::DeltaState),
    ("reset", InboundKind::Reset),
    ("rst", InboundKind::Reset),
    ("heartbeat", InboundKind::Heartbeat),
    ("hb", InboundKind::Heartbeat),
    ("pong", InboundKind::Pong),
    ("ack", InboundKind::Pong),
];

impl InboundKind {
    pub fn from_wire(name: &str) -> Option<Self> {
        KIND_NAMES
            .iter()
            .find(|(wire, _)| *wire == name)
            .map(|(_, kind)| *kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            InboundKind::RoomJoined => "room-joined",
            InboundKind::PeerJoined => "peer-joined",
            InboundKind::PeerLeft => "peer-left",
            InboundKind::RoleSwitched => "role-switched",
            InboundKind::PaddleUpdated => "paddle-updated",
            InboundKind::FullState => "full-state",
            InboundKind::DeltaState => "delta-state",
            InboundKind::Reset => "reset",
            InboundKind::Heartbeat => "heartbeat",
            InboundKind::Pong => "pong",
        }
    }
}

/// Decoded inbound message, one variant per [`InboundKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RoomJoined(RoomJoined),
    PeerJoined(PeerChange),
    PeerLeft(PeerChange),
    RoleSwitched(RoleSwitched),
    PaddleUpdated(PaddleUpdated),
    FullState(StatePayload),
    DeltaState(StatePayload),
    Reset(StatePayload),
    Heartbeat { timestamp: Option<u64> },
    Pong { timestamp: Option<u64> },
}

impl ServerMessage {
    pub fn kind(&self) -> InboundKind {
        match self {
            ServerMessage::RoomJoined(_) => InboundKind::RoomJoined,
            ServerMessage::PeerJoined(_) => InboundKind::PeerJoined,
            ServerMessage::PeerLeft(_) => InboundKind::PeerLeft,
            ServerMessage::RoleSwitched(_) => InboundKind::RoleSwitched,
            ServerMessage::PaddleUpdated(_) => InboundKind::PaddleUpdated,
            ServerMessage::FullState(_) => InboundKind::FullState,
            ServerMessage::DeltaState(_) => InboundKind::DeltaState,
            ServerMessage::Reset(_) => InboundKind::Reset,
            ServerMessage::Heartbeat { .. } => InboundKind::Heartbeat,
            ServerMessage::Pong { .. } => InboundKind::Pong,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    #[serde(alias = "r")]
    pub role: Role,
    #[serde(default, alias = "pc")]
    pub player_count: u8,
    #[serde(default, alias = "s", alias = "state")]
    pub snapshot: Option<StatePayload>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerChange {
    #[serde(default, alias = "pc")]
    pub player_count: u8,

    /// Seat the joining or leaving peer held
    #[serde(default, alias = "r")]
    pub role: Option<Role>,

    /// How the seat was refilled (for example by a bot), when the server says
    #[serde(default, alias = "rt")]
    pub replacement_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleSwitched {
    #[serde(alias = "r")]
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaddleUpdated {
    #[serde(alias = "s")]
    pub side: Side,
    #[serde(default)]
    pub y: Option<f32>,
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default, alias = "v", alias = "vel")]
    pub velocity: f32,
    #[serde(default, alias = "tg")]
    pub target: Option<f32>,
    #[serde(default, alias = "q", alias = "sequence")]
    pub seq: Option<u64>,
    #[serde(default, alias = "timestamp")]
    pub ts: Option<u64>,
}

impl PaddleUpdated {
    /// Position along the axis this side's paddle travels on
    pub fn position(&self) -> Option<f32> {
        if self.side.is_vertical() {
            self.y
        } else {
            self.x
        }
    }
}

/// Full or partial game state. Every field is optional: absent means "unchanged".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatePayload {
    #[serde(alias = "b")]
    pub ball: Option<BallPayload>,
    #[serde(alias = "p")]
    pub paddles: Option<PaddlesPayload>,
    #[serde(alias = "sc")]
    pub score: Option<ScorePayload>,
    #[serde(alias = "fx", alias = "activeEffects")]
    pub effects: Option<Vec<EffectPayload>>,
    #[serde(alias = "pk")]
    pub pickups: Option<Vec<PickupPayload>>,
    #[serde(alias = "c")]
    pub coins: Option<Vec<CoinPayload>>,
    #[serde(alias = "ip")]
    pub is_playing: Option<bool>,
    #[serde(alias = "pa")]
    pub is_paused: Option<bool>,
    #[serde(alias = "pe")]
    pub pause_end_time: Option<u64>,
    #[serde(alias = "ge")]
    pub game_ended: Option<bool>,
    #[serde(alias = "w")]
    pub winner: Option<Side>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BallPayload {
    pub x: Option<f32>,
    pub y: Option<f32>,
    #[serde(alias = "dx")]
    pub vx: Option<f32>,
    #[serde(alias = "dy")]
    pub vy: Option<f32>,
    #[serde(alias = "s")]
    pub size: Option<f32>,
    #[serde(alias = "m")]
    pub modifiers: Option<Vec<ModifierPayload>>,
    #[serde(alias = "lt")]
    pub last_touched_by: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierPayload {
    #[serde(alias = "k", alias = "type")]
    pub kind: String,
    #[serde(default, alias = "at")]
    pub activated_at: u64,
    #[serde(default, alias = "d")]
    pub duration: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaddlesPayload {
    #[serde(alias = "l")]
    pub left: Option<PaddlePayload>,
    #[serde(alias = "r")]
    pub right: Option<PaddlePayload>,
    #[serde(alias = "t")]
    pub top: Option<PaddlePayload>,
    #[serde(alias = "b")]
    pub bottom: Option<PaddlePayload>,
}

impl PaddlesPayload {
    pub fn get(&self, side: Side) -> Option<&PaddlePayload> {
        match side {
            Side::Left => self.left.as_ref(),
            Side::Right => self.right.as_ref(),
            Side::Top => self.top.as_ref(),
            Side::Bottom => self.bottom.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PaddlePayload {
    pub x: Option<f32>,
    pub y: Option<f32>,
    #[serde(alias = "v", alias = "vel")]
    pub velocity: Option<f32>,
    #[serde(alias = "w")]
    pub width: Option<f32>,
    #[serde(alias = "h")]
    pub height: Option<f32>,
    #[serde(alias = "tg")]
    pub target: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScorePayload {
    #[serde(alias = "l")]
    pub left: Option<u32>,
    #[serde(alias = "r")]
    pub right: Option<u32>,
    #[serde(alias = "t")]
    pub top: Option<u32>,
    #[serde(alias = "b")]
    pub bottom: Option<u32>,
}

impl ScorePayload {
    pub fn get(&self, side: Side) -> Option<u32> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
            Side::Top => self.top,
            Side::Bottom => self.bottom,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectPayload {
    #[serde(alias = "k", alias = "type")]
    pub kind: String,
    #[serde(default, alias = "st")]
    pub start_time: u64,
    #[serde(default, alias = "d")]
    pub duration: u64,
    #[serde(default, alias = "s")]
    pub side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PickupPayload {
    #[serde(default, alias = "k", alias = "type")]
    pub kind: String,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinPayload {
    pub x: f32,
    pub y: f32,
}
