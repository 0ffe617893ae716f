// petduel_protocol — wire protocol for Pet Duel multiplayer.
//
// Shared by the matchmaking/relay server and game clients
// (`petduel_relay`) and by the turn-sync state machine (`petduel_sim`).
// No networking and no game rules live here.
//
// Module overview:
// - `types.rs`:    `Role`, the two match seats and the turn token.
// - `snapshot.rs`: `CreatureSnapshot` / `AbilitySnapshot` value objects.
// - `message.rs`:  `Message` (JOIN_LOBBY, BATTLE_START, MOVE, opaque).
// - `codec.rs`:    `encode` / `decode` between `Message` and JSON bytes,
//                  `MalformedMessage` for payloads that do not parse.
// - `framing.rs`:  4-byte big-endian length prefix framing over any
//                  `Read` / `Write` stream.
//
// Design decisions:
// - **JSON payloads with snake_case keys.** Human-readable on the wire and
//   compatible with snapshots dumped by the single-player save code.
// - **Unknown message types survive.** They decode to `Message::Opaque` and
//   the relay forwards the original frame bytes, so new message types only
//   need client support.
// - **No async runtime.** Framing works on `std::io::Read` / `Write`.

pub mod codec;
pub mod framing;
pub mod message;
pub mod snapshot;
pub mod types;

pub use codec::{MalformedMessage, decode, encode};
pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{BattleStart, MAX_ABILITY_INDEX, Message, MoveAction, OpaqueMessage};
pub use snapshot::{AbilityKind, AbilitySnapshot, CreatureSnapshot};
pub use types::Role;
