// petduel_sim — creature rules and the networked turn-sync state machine.
//
// Everything here is deterministic given a `DuelRng` seed and the ordered
// input messages. There is no I/O: `petduel_relay` owns the sockets and
// feeds decoded messages into `TurnSync`.
//
// Module overview:
// - `species.rs`:  the five species, base stats and ability pools.
// - `ability.rs`:  `Ability`, tier-scaled power, snapshot conversion.
// - `effect.rs`:   `Effect`, the buff / debuff / heal / status sum type.
// - `creature.rs`: `Creature`, generation, snapshots, XP gain and loss.
// - `config.rs`:   `ProgressionConfig`, JSON-loadable XP and growth tuning.
// - `battle.rs`:   `Battle`, the mirror both clients run, and
//                  `calculate_damage`.
// - `duel.rs`:     `TurnSync`, turn token handling, echo suppression,
//                  battle conclusion and the level-up decision flow.
// - `error.rs`:    `SimError`, `DuelError`.
//
// Battle outcome is decided independently by each client from its own
// mirror. Both mirrors agree only if every MOVE arrives exactly once and in
// order, which the TCP relay provides for a live connection.

pub mod ability;
pub mod battle;
pub mod config;
pub mod creature;
pub mod duel;
pub mod effect;
pub mod error;
pub mod species;

pub use ability::Ability;
pub use battle::{ActionOutcome, ActionResult, Battle, Rejection, Side, calculate_damage};
pub use config::{GrowthRange, ProgressionConfig};
pub use creature::{Creature, LevelUp};
pub use duel::{Handled, LevelUpPrompt, LevelUpStep, LocalAction, Outcome, Phase, TurnSync};
pub use effect::{Effect, EffectTarget, Stat, StatusKind};
pub use error::{DuelError, SimError};
pub use species::Species;
