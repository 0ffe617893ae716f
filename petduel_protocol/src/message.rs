// Protocol messages exchanged between clients and the matchmaking server.
//
// Every message on the wire is a flat JSON object with a mandatory `type`
// key. Three types are understood:
// - `JOIN_LOBBY`   client → server: "pair me", carrying the creature.
// - `BATTLE_START` server → client: match formed, carrying both creatures,
//                  the receiver's role and the opening turn holder.
// - `MOVE`         client → server → client: one turn action.
//
// Anything else decodes to `Message::Opaque`, which keeps the whole JSON
// object so it can be re-encoded unchanged. The server never needs to
// understand a message once it relays it; see `codec.rs` for the encode /
// decode rules and `framing.rs` for how payloads are delimited.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::snapshot::CreatureSnapshot;
use crate::types::Role;

/// Largest ability index a `MOVE` may carry. Creatures hold at most four
/// abilities.
pub const MAX_ABILITY_INDEX: u8 = 3;

pub const JOIN_LOBBY: &str = "JOIN_LOBBY";
pub const BATTLE_START: &str = "BATTLE_START";
pub const MOVE: &str = "MOVE";

/// A decoded protocol message.
#[derive(Clone, Debug, PartialEq)]
pub enum Message {
    /// Ask the server to pair this connection with the next arrival.
    JoinLobby { creature: CreatureSnapshot },
    /// A match has formed.
    BattleStart(BattleStart),
    /// One turn action.
    Move(MoveAction),
    /// A message with a `type` this crate does not interpret.
    Opaque(OpaqueMessage),
}

impl Message {
    /// The wire `type` discriminator.
    pub fn kind(&self) -> &str {
        match self {
            Message::JoinLobby { .. } => JOIN_LOBBY,
            Message::BattleStart(_) => BATTLE_START,
            Message::Move(_) => MOVE,
            Message::Opaque(opaque) => opaque.kind(),
        }
    }
}

/// Server's announcement that two participants were paired. Each side gets
/// its own copy with `player_creature` set to its own creature.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BattleStart {
    pub player_creature: CreatureSnapshot,
    pub opponent_creature: CreatureSnapshot,
    pub your_role: Role,
    pub current_turn: Role,
}

/// One turn action. `index` selects an ability of the sender's creature,
/// `next_turn` hands the turn token over, and `sender_role` lets receivers
/// drop their own echoes under the broadcast relay policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAction {
    pub index: u8,
    pub next_turn: Role,
    pub sender_role: Role,
}

/// An uninterpreted message. Holds the complete JSON object, `type` key
/// included.
#[derive(Clone, Debug, PartialEq)]
pub struct OpaqueMessage {
    fields: Map<String, Value>,
}

impl OpaqueMessage {
    /// Build an opaque message of the given type. `fields` may omit `type`;
    /// it is set from `kind`.
    pub fn new(kind: &str, mut fields: Map<String, Value>) -> Self {
        fields.insert("type".into(), Value::String(kind.into()));
        Self { fields }
    }

    /// Wrap an already-validated JSON object (must carry a string `type`).
    pub(crate) fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn kind(&self) -> &str {
        self.fields
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}
