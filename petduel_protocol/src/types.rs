// Role identifiers shared by the lobby, the relay and the turn-sync state
// machine.
//
// A match has exactly two seats. The participant who was waiting in the
// lobby becomes `Player1`, the arrival that completed the pair becomes
// `Player2`, and `Player1` always moves first. The same enum doubles as the
// turn token: `current_turn` and `next_turn` on the wire are `Role` values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two seats in a match. Encoded as `"player1"` / `"player2"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player1,
    Player2,
}

impl Role {
    /// The role that opens every match.
    pub const FIRST_TO_MOVE: Role = Role::Player1;

    /// The other seat.
    pub fn opponent(self) -> Role {
        match self {
            Role::Player1 => Role::Player2,
            Role::Player2 => Role::Player1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Player1 => "player1",
            Role::Player2 => "player2",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opponent_is_an_involution() {
        assert_eq!(Role::Player1.opponent(), Role::Player2);
        assert_eq!(Role::Player2.opponent(), Role::Player1);
        assert_eq!(Role::Player1.opponent().opponent(), Role::Player1);
    }

    #[test]
    fn wire_names_match_display() {
        for role in [Role::Player1, Role::Player2] {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }
}
