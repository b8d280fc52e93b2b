//! Wire protocol shared by the server and the client.
//!
//! Every datagram carries one JSON document of the form
//! `{"version": 1, "message": {"type": "<eventName>", "data": {...}}}`.
//! Messages are an exhaustive tagged union per direction, so both ends agree on
//! every event name and payload shape at compile time.

use crate::{GameSnapshot, InputState, PlayerId, PowerUpKind, MAX_DATAGRAM_SIZE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// Join names are trimmed and length-checked by the server; this only bounds the raw payload.
const MAX_RAW_NAME_BYTES: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported protocol version {0}, expected {expected}", expected = PROTOCOL_VERSION)]
    UnsupportedVersion(u32),
    #[error("message of {0} bytes exceeds the datagram limit")]
    Oversized(usize),
    #[error("invalid value in field `{0}`")]
    InvalidValue(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<M> {
    pub version: u32,
    pub message: M,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    PlayerJoin { name: String },
    PlayerInput { input_state: InputState },
    PlayerLeave,
}

impl ClientMessage {
    /// Checks values serde cannot rule out on its own.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        match self {
            ClientMessage::PlayerJoin { name } => {
                if name.len() > MAX_RAW_NAME_BYTES {
                    return Err(ProtocolError::InvalidValue("name"));
                }
                Ok(())
            }
            ClientMessage::PlayerInput { input_state } => {
                let touch_ok = [input_state.touch_x, input_state.touch_y]
                    .iter()
                    .flatten()
                    .all(|v| v.is_finite());
                if !touch_ok {
                    return Err(ProtocolError::InvalidValue("touch"));
                }
                if input_state.is_touch_active
                    && (input_state.touch_x.is_none() || input_state.touch_y.is_none())
                {
                    return Err(ProtocolError::InvalidValue("touch"));
                }
                Ok(())
            }
            ClientMessage::PlayerLeave => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScoreReason {
    Tag,
    Star,
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    GameJoined {
        player_id: PlayerId,
        game_state: GameSnapshot,
    },
    GameState(GameSnapshot),
    PlayerTagged {
        tagger: PlayerId,
        tagged: PlayerId,
        new_it: PlayerId,
    },
    ScoreUpdate {
        player_id: PlayerId,
        player_name: String,
        score: u32,
        change: i64,
        reason: ScoreReason,
    },
    StarCollected {
        player_id: PlayerId,
        star_id: u32,
        points: u32,
    },
    PowerUpCollected {
        player_id: PlayerId,
        power_up_id: u32,
        kind: PowerUpKind,
    },
    StunOrbCollected {
        player_id: PlayerId,
        orb_id: u32,
        granted: bool,
    },
    StunOrbExplosion {
        it_player_id: PlayerId,
        explosion_x: f32,
        explosion_y: f32,
        explosion_radius: f32,
        stun_duration: u64,
        affected_players: Vec<PlayerId>,
    },
    StunPulseActivated {
        it_player_name: String,
        affected_players: Vec<PlayerId>,
    },
    GameEnd {
        reason: String,
    },
    JoinError {
        message: String,
    },
}

impl ServerMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::GameJoined { .. } => "gameJoined",
            ServerMessage::GameState(_) => "gameState",
            ServerMessage::PlayerTagged { .. } => "playerTagged",
            ServerMessage::ScoreUpdate { .. } => "scoreUpdate",
            ServerMessage::StarCollected { .. } => "starCollected",
            ServerMessage::PowerUpCollected { .. } => "powerUpCollected",
            ServerMessage::StunOrbCollected { .. } => "stunOrbCollected",
            ServerMessage::StunOrbExplosion { .. } => "stunOrbExplosion",
            ServerMessage::StunPulseActivated { .. } => "stunPulseActivated",
            ServerMessage::GameEnd { .. } => "gameEnd",
            ServerMessage::JoinError { .. } => "joinError",
        }
    }
}

fn encode<M: Serialize>(message: &M) -> Result<Vec<u8>, ProtocolError> {
    let envelope = Envelope {
        version: PROTOCOL_VERSION,
        message,
    };
    let bytes = serde_json::to_vec(&envelope)?;
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::Oversized(bytes.len()));
    }
    Ok(bytes)
}

fn decode<M: DeserializeOwned>(bytes: &[u8]) -> Result<M, ProtocolError> {
    if bytes.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::Oversized(bytes.len()));
    }
    let envelope: Envelope<serde_json::Value> = serde_json::from_slice(bytes)?;
    if envelope.version != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion(envelope.version));
    }
    Ok(serde_json::from_value(envelope.message)?)
}

pub fn encode_client(message: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    encode(message)
}

/// Decodes and validates a client datagram before it reaches the game loop.
pub fn decode_client(bytes: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let message: ClientMessage = decode(bytes)?;
    message.validate()?;
    Ok(message)
}

pub fn encode_server(message: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    encode(message)
}

pub fn decode_server(bytes: &[u8]) -> Result<ServerMessage, ProtocolError> {
    decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_join_wire_shape() {
        let bytes = encode_client(&ClientMessage::PlayerJoin {
            name: "alice".into(),
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["version"], PROTOCOL_VERSION);
        assert_eq!(value["message"]["type"], "playerJoin");
        assert_eq!(value["message"]["data"]["name"], "alice");
    }

    #[test]
    fn test_decode_player_input_from_json() {
        let raw = br#"{"version":1,"message":{"type":"playerInput","data":{"inputState":{"up":true,"down":false,"left":false,"right":false,"isTouchActive":false,"timestamp":55}}}}"#;
        match decode_client(raw).unwrap() {
            ClientMessage::PlayerInput { input_state } => {
                assert!(input_state.up);
                assert_eq!(input_state.timestamp, 55);
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_player_leave_without_data() {
        let raw = br#"{"version":1,"message":{"type":"playerLeave"}}"#;
        assert_eq!(decode_client(raw).unwrap(), ClientMessage::PlayerLeave);
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let raw = br#"{"version":7,"message":{"type":"playerLeave"}}"#;
        assert!(matches!(
            decode_client(raw),
            Err(ProtocolError::UnsupportedVersion(7))
        ));
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        let raw = br#"{"version":1,"message":{"type":"teleport","data":{"x":1}}}"#;
        assert!(matches!(
            decode_client(raw),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_unexpected_input_fields() {
        let raw = br#"{"version":1,"message":{"type":"playerInput","data":{"inputState":{"up":true,"timestamp":1,"x":500}}}}"#;
        assert!(decode_client(raw).is_err());
    }

    #[test]
    fn test_decode_rejects_touch_without_coordinates() {
        let raw = br#"{"version":1,"message":{"type":"playerInput","data":{"inputState":{"isTouchActive":true,"timestamp":1}}}}"#;
        assert!(matches!(
            decode_client(raw),
            Err(ProtocolError::InvalidValue("touch"))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_client(b"not json").is_err());
        assert!(decode_server(b"{}").is_err());
    }

    #[test]
    fn test_server_message_event_names() {
        let msg = ServerMessage::PlayerTagged {
            tagger: 1,
            tagged: 2,
            new_it: 2,
        };
        let bytes = encode_server(&msg).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value["message"]["type"], msg.event_name());
        assert_eq!(value["message"]["data"]["newIt"], 2);
        assert_eq!(decode_server(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_stun_orb_explosion_field_names() {
        let msg = ServerMessage::StunOrbExplosion {
            it_player_id: 3,
            explosion_x: 10.0,
            explosion_y: 20.0,
            explosion_radius: 80.0,
            stun_duration: 3000,
            affected_players: vec![4, 5],
        };
        let value = serde_json::to_value(&msg).unwrap();
        let data = &value["data"];

        assert_eq!(data["itPlayerId"], 3);
        assert_eq!(data["explosionRadius"], 80.0);
        assert_eq!(data["affectedPlayers"][1], 5);
    }

    #[test]
    fn test_score_reason_lowercase() {
        let value = serde_json::to_value(ScoreReason::Star).unwrap();
        assert_eq!(value, "star");
    }
}
