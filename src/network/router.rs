// Message router: decodes inbound text into the closed set of server messages,
// dispatches each to exactly one handler, and builds every outbound message shape

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::protocol::{
    ClientMessage, InboundKind, PaddleUpdateData, PaddleUpdated, PeerChange, RoleSwitched,
    RoomJoined, ServerMessage, StatePayload,
};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown message kind `{0}`")]
    UnknownKind(String),

    #[error("bad `{kind}` payload: {source}")]
    Payload {
        kind: &'static str,
        source: serde_json::Error,
    },
}

/// Outer shape shared by every inbound message, in either naming form
#[derive(Deserialize)]
struct Envelope {
    #[serde(alias = "type", alias = "k", alias = "t")]
    kind: String,

    #[serde(default, alias = "d", alias = "payload")]
    data: Value,

    #[serde(default, alias = "ts")]
    timestamp: Option<Value>,
}

/// Decode one inbound text frame
pub fn decode(raw: &str) -> Result<ServerMessage, DecodeError> {
    let envelope: Envelope = serde_json::from_str(raw)?;
    let kind = InboundKind::from_wire(&envelope.kind)
        .ok_or_else(|| DecodeError::UnknownKind(envelope.kind.clone()))?;

    // `data: null` and a missing `data` both mean an empty payload
    let data = match envelope.data {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };

    let message = match kind {
        InboundKind::RoomJoined => ServerMessage::RoomJoined(payload(kind, data)?),
        InboundKind::PeerJoined => ServerMessage::PeerJoined(payload(kind, data)?),
        InboundKind::PeerLeft => ServerMessage::PeerLeft(payload(kind, data)?),
        InboundKind::RoleSwitched => ServerMessage::RoleSwitched(payload(kind, data)?),
        InboundKind::PaddleUpdated => ServerMessage::PaddleUpdated(payload(kind, data)?),
        InboundKind::FullState => ServerMessage::FullState(payload(kind, data)?),
        InboundKind::DeltaState => ServerMessage::DeltaState(payload(kind, data)?),
        InboundKind::Reset => ServerMessage::Reset(payload(kind, data)?),
        InboundKind::Heartbeat => ServerMessage::Heartbeat {
            timestamp: timestamp_of(envelope.timestamp.as_ref(), &data),
        },
        InboundKind::Pong => ServerMessage::Pong {
            timestamp: timestamp_of(envelope.timestamp.as_ref(), &data),
        },
    };

    Ok(message)
}

fn payload<T: DeserializeOwned>(kind: InboundKind, data: Value) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|source| DecodeError::Payload {
        kind: kind.name(),
        source,
    })
}

// Timestamps may sit on the envelope or inside `data`, as integers or floats
fn timestamp_of(envelope: Option<&Value>, data: &Value) -> Option<u64> {
    envelope
        .or_else(|| data.get("timestamp"))
        .or_else(|| data.get("ts"))
        .and_then(|v| v.as_u64().or_else(|| v.as_f64().map(|f| f.max(0.0) as u64)))
}

/// Receiver of decoded server messages. Every method defaults to ignoring its message.
pub trait InboundHandler {
    fn on_room_joined(&mut self, _msg: RoomJoined) {}
    fn on_peer_joined(&mut self, _msg: PeerChange) {}
    fn on_peer_left(&mut self, _msg: PeerChange) {}
    fn on_role_switched(&mut self, _msg: RoleSwitched) {}
    fn on_paddle_updated(&mut self, _msg: PaddleUpdated) {}
    fn on_full_state(&mut self, _payload: StatePayload) {}
    fn on_delta_state(&mut self, _payload: StatePayload) {}
    fn on_reset(&mut self, _payload: StatePayload) {}
    fn on_heartbeat(&mut self, _timestamp: Option<u64>) {}
    fn on_pong(&mut self, _timestamp: Option<u64>) {}
}

/// Route one message to its handler method
pub fn dispatch<H: InboundHandler + ?Sized>(message: ServerMessage, handler: &mut H) {
    match message {
        ServerMessage::RoomJoined(msg) => handler.on_room_joined(msg),
        ServerMessage::PeerJoined(msg) => handler.on_peer_joined(msg),
        ServerMessage::PeerLeft(msg) => handler.on_peer_left(msg),
        ServerMessage::RoleSwitched(msg) => handler.on_role_switched(msg),
        ServerMessage::PaddleUpdated(msg) => handler.on_paddle_updated(msg),
        ServerMessage::FullState(payload) => handler.on_full_state(payload),
        ServerMessage::DeltaState(payload) => handler.on_delta_state(payload),
        ServerMessage::Reset(payload) => handler.on_reset(payload),
        ServerMessage::Heartbeat { timestamp } => handler.on_heartbeat(timestamp),
        ServerMessage::Pong { timestamp } => handler.on_pong(timestamp),
    }
}

/// Builds outbound messages for one player
#[derive(Debug, Clone)]
pub struct MessageRouter {
    player_id: String,
}

impl MessageRouter {
    pub fn new(player_id: impl Into<String>) -> Self {
        Self {
            player_id: player_id.into(),
        }
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn join_room(&self, room_id: &str) -> ClientMessage {
        ClientMessage::JoinRoom {
            player_id: self.player_id.clone(),
            room_id: room_id.to_string(),
        }
    }

    pub fn update_paddle(&self, data: PaddleUpdateData) -> ClientMessage {
        ClientMessage::UpdatePaddle {
            player_id: self.player_id.clone(),
            data,
        }
    }

    pub fn ping(&self, timestamp: u64) -> ClientMessage {
        ClientMessage::Ping {
            player_id: self.player_id.clone(),
            timestamp,
        }
    }

    pub fn heartbeat_ack(&self, timestamp: u64) -> ClientMessage {
        ClientMessage::HeartbeatAck {
            player_id: self.player_id.clone(),
            timestamp,
        }
    }

    pub fn encode(&self, message: &ClientMessage) -> serde_json::Result<String> {
        serde_json::to_string(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Role, Side};

    #[test]
    fn test_verbose_and_compact_forms_decode_identically() {
        let verbose = decode(
            r#"{"kind":"room-joined","data":{"role":"left","playerCount":2,
                "snapshot":{"ball":{"x":400,"y":400,"vx":3,"vy":-2},"score":{"left":1}}}}"#,
        )
        .unwrap();
        let compact = decode(
            r#"{"t":"rj","d":{"r":"l","pc":2,
                "s":{"b":{"x":400,"y":400,"dx":3,"dy":-2},"sc":{"l":1}}}}"#,
        )
        .unwrap();

        assert_eq!(verbose, compact);
        match verbose {
            ServerMessage::RoomJoined(joined) => {
                assert_eq!(joined.role, Role::Left);
                assert_eq!(joined.player_count, 2);
                assert!(joined.snapshot.is_some());
            }
            other => panic!("expected room-joined, got {:?}", other),
        }
    }

    #[test]
    fn test_paddle_updated_compact() {
        let msg = decode(r#"{"kind":"pu","data":{"s":"top","x":210.5,"v":-4,"q":9}}"#).unwrap();

        match msg {
            ServerMessage::PaddleUpdated(update) => {
                assert_eq!(update.side, Side::Top);
                assert_eq!(update.position(), Some(210.5));
                assert_eq!(update.velocity, -4.0);
                assert_eq!(update.seq, Some(9));
            }
            other => panic!("expected paddle-updated, got {:?}", other),
        }
    }

    #[test]
    fn test_heartbeat_without_data() {
        assert_eq!(
            decode(r#"{"kind":"heartbeat"}"#).unwrap(),
            ServerMessage::Heartbeat { timestamp: None }
        );
        assert_eq!(
            decode(r#"{"kind":"hb","data":null,"ts":1700.0}"#).unwrap(),
            ServerMessage::Heartbeat {
                timestamp: Some(1700)
            }
        );
    }

    #[test]
    fn test_ack_decodes_as_pong() {
        let msg = decode(r#"{"kind":"ack","data":{"timestamp":42}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Pong { timestamp: Some(42) });
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = decode(r#"{"kind":"warp","data":{}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownKind(kind) if kind == "warp"));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert!(matches!(decode("{not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            decode(r#"{"kind":"role-switched","data":{"role":"middle"}}"#),
            Err(DecodeError::Payload { kind: "role-switched", .. })
        ));
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<&'static str>,
    }

    impl InboundHandler for Recorder {
        fn on_delta_state(&mut self, _payload: StatePayload) {
            self.seen.push("delta");
        }

        fn on_reset(&mut self, _payload: StatePayload) {
            self.seen.push("reset");
        }
    }

    #[test]
    fn test_dispatch_reaches_exactly_one_handler() {
        let mut recorder = Recorder::default();

        dispatch(ServerMessage::DeltaState(StatePayload::default()), &mut recorder);
        dispatch(ServerMessage::Pong { timestamp: None }, &mut recorder);
        dispatch(ServerMessage::Reset(StatePayload::default()), &mut recorder);

        assert_eq!(recorder.seen, vec!["delta", "reset"]);
    }

    #[test]
    fn test_router_stamps_player_id() {
        let router = MessageRouter::new("p-xyz");
        let text = router.encode(&router.ping(99)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["kind"], "ping");
        assert_eq!(value["playerId"], "p-xyz");
        assert_eq!(value["timestamp"], 99);
    }
}
