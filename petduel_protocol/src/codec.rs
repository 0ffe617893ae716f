// Message codec: `Message` <-> JSON payload bytes.
//
// Encoding is plain serde: known messages go through an internally tagged
// enum (`"type": "MOVE"` next to the payload fields) and opaque messages
// write back the object they were decoded from.
//
// Decoding is two-step. The payload is first parsed into a generic JSON
// object so the `type` key can be inspected without committing to a shape.
// Known types are then deserialized strictly; unknown types are kept as
// `Message::Opaque`. Everything that cannot be read as one message becomes
// `MalformedMessage`, and the caller decides what to drop.
//
// Framing is not handled here; see `framing.rs`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::{
    BATTLE_START, BattleStart, JOIN_LOBBY, MAX_ABILITY_INDEX, MOVE, Message, MoveAction,
    OpaqueMessage,
};
use crate::snapshot::CreatureSnapshot;

/// A payload that does not parse as a protocol message.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed message: {reason}")]
pub struct MalformedMessage {
    reason: String,
}

impl MalformedMessage {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum WireRef<'a> {
    #[serde(rename = "JOIN_LOBBY")]
    JoinLobby { creature: &'a CreatureSnapshot },
    #[serde(rename = "BATTLE_START")]
    BattleStart(&'a BattleStart),
    #[serde(rename = "MOVE")]
    Move(&'a MoveAction),
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireOwned {
    #[serde(rename = "JOIN_LOBBY")]
    JoinLobby { creature: CreatureSnapshot },
    #[serde(rename = "BATTLE_START")]
    BattleStart(BattleStart),
    #[serde(rename = "MOVE")]
    Move(MoveAction),
}

/// Serialize a message to its JSON payload.
pub fn encode(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    match message {
        Message::JoinLobby { creature } => serde_json::to_vec(&WireRef::JoinLobby { creature }),
        Message::BattleStart(start) => serde_json::to_vec(&WireRef::BattleStart(start)),
        Message::Move(action) => serde_json::to_vec(&WireRef::Move(action)),
        Message::Opaque(opaque) => serde_json::to_vec(opaque.fields()),
    }
}

/// Parse one JSON payload into a message.
pub fn decode(bytes: &[u8]) -> Result<Message, MalformedMessage> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| MalformedMessage::new(format!("invalid JSON: {e}")))?;
    let Value::Object(fields) = value else {
        return Err(MalformedMessage::new("top level is not an object"));
    };

    let known = match fields.get("type") {
        Some(Value::String(kind)) => is_known_kind(kind),
        Some(_) => return Err(MalformedMessage::new("`type` is not a string")),
        None => return Err(MalformedMessage::new("missing `type`")),
    };
    if !known {
        return Ok(Message::Opaque(OpaqueMessage::from_fields(fields)));
    }

    let wire: WireOwned = serde_json::from_value(Value::Object(fields))
        .map_err(|e| MalformedMessage::new(e.to_string()))?;
    match wire {
        WireOwned::JoinLobby { creature } => Ok(Message::JoinLobby { creature }),
        WireOwned::BattleStart(start) => Ok(Message::BattleStart(start)),
        WireOwned::Move(action) => {
            if action.index > MAX_ABILITY_INDEX {
                return Err(MalformedMessage::new(format!(
                    "MOVE index {} outside 0..={MAX_ABILITY_INDEX}",
                    action.index
                )));
            }
            Ok(Message::Move(action))
        }
    }
}

fn is_known_kind(kind: &str) -> bool {
    matches!(kind, JOIN_LOBBY | BATTLE_START | MOVE)
}
