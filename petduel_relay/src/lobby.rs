// Matchmaking: a single waiting slot.
//
// The lobby is either `Empty` or holds one waiting participant. The next
// `try_join` from a different connection pairs with the waiter: the waiter
// becomes `player1`, the arrival `player2`, and `player1` moves first. The
// lobby then returns to `Empty`, so a third arrival starts a fresh wait and
// is never merged into the match that just formed.
//
// Every server handler thread shares one `Lobby`; the slot lives behind a
// mutex so racing arrivals are serialised.

use std::sync::{Mutex, PoisonError};

use petduel_protocol::{BattleStart, CreatureSnapshot, Role};
use tracing::{debug, info};

use crate::relay::ConnectionId;

/// A connection waiting to be paired, with the creature it brought.
#[derive(Clone, Debug, PartialEq)]
pub struct Participant {
    pub id: ConnectionId,
    pub creature: CreatureSnapshot,
}

/// Two participants that were just paired.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchAssignment {
    pub player1: Participant,
    pub player2: Participant,
}

impl MatchAssignment {
    pub fn participant(&self, role: Role) -> &Participant {
        match role {
            Role::Player1 => &self.player1,
            Role::Player2 => &self.player2,
        }
    }

    /// The `BATTLE_START` the participant in `role` should receive.
    pub fn battle_start_for(&self, role: Role) -> BattleStart {
        BattleStart {
            player_creature: self.participant(role).creature.clone(),
            opponent_creature: self.participant(role.opponent()).creature.clone(),
            your_role: role,
            current_turn: Role::FIRST_TO_MOVE,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LobbyState {
    Empty,
    Waiting(ConnectionId),
}

#[derive(Debug, Default)]
pub struct Lobby {
    waiting: Mutex<Option<Participant>>,
}

impl Lobby {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the lobby. Returns the assignment when this arrival completes
    /// a pair. A repeat join from the connection already waiting only
    /// replaces its creature.
    pub fn try_join(&self, participant: Participant) -> Option<MatchAssignment> {
        let mut slot = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            None => {
                info!(conn = %participant.id, creature = %participant.creature.creature_type, "waiting for opponent");
                *slot = Some(participant);
                None
            }
            Some(waiter) if waiter.id == participant.id => {
                debug!(conn = %participant.id, "refreshed waiting creature");
                *slot = Some(participant);
                None
            }
            Some(waiter) => {
                info!(player1 = %waiter.id, player2 = %participant.id, "paired");
                Some(MatchAssignment {
                    player1: waiter,
                    player2: participant,
                })
            }
        }
    }

    /// Vacate the slot if `id` holds it. Returns whether it did.
    pub fn leave(&self, id: ConnectionId) -> bool {
        let mut slot = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|w| w.id == id) {
            *slot = None;
            info!(conn = %id, "waiting participant left, lobby empty");
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> LobbyState {
        let slot = self.waiting.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(waiter) => LobbyState::Waiting(waiter.id),
            None => LobbyState::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn creature(kind: &str) -> CreatureSnapshot {
        serde_json::from_value(serde_json::json!({
            "creature_type": kind,
            "max_hp": 50, "attack": 10, "defense": 5, "speed": 7,
            "current_hp": 50, "level": 1, "xp": 0, "evolution_stage": 1,
            "age": 0.0, "is_alive": true, "abilities": []
        }))
        .unwrap()
    }

    fn participant(id: u64, kind: &str) -> Participant {
        Participant {
            id: ConnectionId(id),
            creature: creature(kind),
        }
    }

    #[test]
    fn first_arrival_is_player1() {
        let lobby = Lobby::new();
        assert!(lobby.try_join(participant(1, "Skeleton")).is_none());
        assert_eq!(lobby.state(), LobbyState::Waiting(ConnectionId(1)));
        let assignment = lobby.try_join(participant(2, "Goblin")).unwrap();
        assert_eq!(assignment.player1.id, ConnectionId(1));
        assert_eq!(assignment.player2.id, ConnectionId(2));

        let for_a = assignment.battle_start_for(Role::Player1);
        assert_eq!(for_a.your_role, Role::Player1);
        assert_eq!(for_a.current_turn, Role::Player1);
        assert_eq!(for_a.player_creature.creature_type, "Skeleton");
        assert_eq!(for_a.opponent_creature.creature_type, "Goblin");

        let for_b = assignment.battle_start_for(Role::Player2);
        assert_eq!(for_b.your_role, Role::Player2);
        assert_eq!(for_b.current_turn, Role::Player1);
        assert_eq!(for_b.player_creature.creature_type, "Goblin");
        assert_eq!(for_b.opponent_creature.creature_type, "Skeleton");
    }

    #[test]
    fn lobby_empties_after_pairing() {
        let lobby = Lobby::new();
        lobby.try_join(participant(1, "Skeleton"));
        lobby.try_join(participant(2, "Goblin")).unwrap();
        assert_eq!(lobby.state(), LobbyState::Empty);
        assert!(lobby.try_join(participant(3, "Troll")).is_none());
        assert_eq!(lobby.state(), LobbyState::Waiting(ConnectionId(3)));
    }

    #[test]
    fn repeat_join_refreshes_snapshot() {
        let lobby = Lobby::new();
        lobby.try_join(participant(1, "Skeleton"));
        assert!(lobby.try_join(participant(1, "Knight")).is_none());
        let assignment = lobby.try_join(participant(2, "Goblin")).unwrap();
        assert_eq!(assignment.player1.creature.creature_type, "Knight");
    }

    #[test]
    fn leave_only_vacates_own_slot() {
        let lobby = Lobby::new();
        lobby.try_join(participant(1, "Skeleton"));
        assert!(!lobby.leave(ConnectionId(2)));
        assert_eq!(lobby.state(), LobbyState::Waiting(ConnectionId(1)));
        assert!(lobby.leave(ConnectionId(1)));
        assert_eq!(lobby.state(), LobbyState::Empty);
    }

    #[test]
    fn concurrent_arrivals_pair_exactly_once() {
        let lobby = Arc::new(Lobby::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let lobby = lobby.clone();
                thread::spawn(move || lobby.try_join(participant(i, "Goblin")))
            })
            .collect();
        let assignments: Vec<MatchAssignment> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(assignments.len(), 8);
        let mut seen: Vec<u64> = assignments
            .iter()
            .flat_map(|a| [a.player1.id.0, a.player2.id.0])
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
        assert_eq!(lobby.state(), LobbyState::Empty);
    }
}
