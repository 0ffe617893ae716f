// Error types for the sim crate.
//
// `SimError` covers data that cannot become live state (unknown species,
// bad config). `DuelError` covers everything the turn-sync state machine
// refuses: out-of-turn actions, protocol violations from the network, and
// level-up decisions made at the wrong time.

use petduel_protocol::Role;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown creature type `{0}`")]
    UnknownSpecies(String),
    #[error("invalid progression config: {0}")]
    InvalidConfig(String),
    #[error("could not parse progression config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DuelError {
    #[error("no match in progress")]
    NoMatch,
    #[error("not your turn (turn belongs to {current})")]
    NotYourTurn { current: Role },
    #[error("the battle is over")]
    BattleOver,
    #[error("a level-up decision is pending")]
    LevelUpPending,
    #[error("ability index {0} is outside 0..=3")]
    InvalidAbilityIndex(usize),
    #[error("no level-up decision is pending")]
    NoLevelUpPending,
    #[error("ability slot {0} cannot be replaced by the new ability")]
    IneligibleReplacement(usize),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error(transparent)]
    Sim(#[from] SimError),
}
