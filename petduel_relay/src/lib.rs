// petduel_relay — matchmaking server and client transport for Pet Duel.
//
// The server is a lobby plus a relay. Clients send `JOIN_LOBBY` with their
// creature; the first two arrivals are paired and each receives a
// `BATTLE_START`. From then on the server only forwards frames between the
// two clients. It never runs battle rules: each client runs its own
// `petduel_sim::TurnSync` mirror and decides the outcome locally.
//
// Module overview:
// - `client.rs`:  `Connection`, the client transport (background receive
//                 thread, non-blocking `poll`).
// - `server.rs`:  `start_server`, `ServerConfig`, `ServerHandle`; accept
//                 loop and per-connection handler threads.
// - `lobby.rs`:   `Lobby`, the single mutex-guarded waiting slot.
// - `relay.rs`:   `Relay`, connection tracking and frame forwarding under a
//                 `RelayPolicy`.
// - `error.rs`:   `NetError`, `ProtocolViolation`.
// - `logging.rs`: `init_tracing` for the binaries.
//
// Binaries: `relay` (src/main.rs) runs the server; `duel_bot`
// (src/bin/duel_bot.rs) is a headless client that plays one match.

pub mod client;
pub mod error;
pub mod lobby;
pub mod logging;
pub mod relay;
pub mod server;

pub use client::Connection;
pub use error::{NetError, ProtocolViolation};
pub use lobby::{Lobby, LobbyState, MatchAssignment, Participant};
pub use relay::{ConnectionId, Relay, RelayPolicy};
pub use server::{ServerConfig, ServerHandle, start_server};
