// Test-only duel client for multiplayer integration tests.
//
// Wraps a real `Connection` (from `petduel_relay`) and a real `TurnSync`
// (from `petduel_sim`) behind a synchronous, test-friendly API for the full
// pipeline: JOIN_LOBBY -> server pairing -> BATTLE_START -> alternating
// MOVEs through the relay -> independent battle conclusion on each side.
//
// The only test-specific code is the blocking poll loops. Networking and
// battle logic run through the same code paths as `duel_bot`.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use petduel_prng::DuelRng;
use petduel_protocol::{Message, Role};
use petduel_relay::Connection;
use petduel_sim::{
    ActionOutcome, Battle, Creature, Handled, Outcome, Phase, ProgressionConfig, Species, TurnSync,
};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Energy given to test creatures so a battle never stalls on exhausted
/// energy before someone is knocked out.
pub const TEST_ENERGY: f64 = 10_000.0;

pub struct TestDuelClient {
    conn: Connection,
    pub sync: TurnSync,
    pub creature: Creature,
}

impl TestDuelClient {
    /// Connect with a generated creature of `species`.
    pub fn connect(addr: SocketAddr, species: Species, seed: u64) -> Self {
        let mut creature = Creature::generate(species, &mut DuelRng::new(seed));
        creature.energy = TEST_ENERGY;
        Self::connect_with(addr, creature, seed)
    }

    pub fn connect_with(addr: SocketAddr, creature: Creature, seed: u64) -> Self {
        let conn = Connection::connect(&addr.to_string()).expect("TestDuelClient::connect failed");
        let sync = TurnSync::new(DuelRng::new(seed ^ 0x5EED), ProgressionConfig::default());
        Self {
            conn,
            sync,
            creature,
        }
    }

    pub fn join_lobby(&self) {
        self.send(&self.sync.join_lobby(&self.creature));
    }

    /// Send a message as-is, bypassing `TurnSync`.
    pub fn send(&self, message: &Message) {
        self.conn.send(message).expect("send failed");
    }

    pub fn phase(&self) -> Phase {
        self.sync.phase()
    }

    pub fn battle(&self) -> &Battle {
        self.sync.battle().expect("no battle in progress")
    }

    pub fn outcome(&self) -> Outcome {
        self.sync.outcome().expect("battle not over")
    }

    /// Blocking poll until `BATTLE_START` arrives. Returns the assigned role.
    pub fn poll_until_started(&mut self) -> Role {
        self.poll_until("BATTLE_START", |handled| {
            matches!(handled, Handled::Started)
        });
        self.sync.my_role().expect("started without a role")
    }

    /// Blocking poll until an opponent move is applied.
    pub fn poll_until_applied(&mut self) -> ActionOutcome {
        let handled = self.poll_until("an opponent MOVE", |handled| {
            matches!(handled, Handled::Applied(_))
        });
        match handled {
            Handled::Applied(outcome) => outcome,
            other => unreachable!("poll_until returned {other:?}"),
        }
    }

    /// Use ability `index` and send the resulting MOVE.
    pub fn play(&mut self, index: usize) -> ActionOutcome {
        let action = self.sync.request_action(index).expect("request_action failed");
        self.send(&action.message);
        action.outcome
    }

    /// Non-blocking: feed every queued message to `TurnSync`.
    pub fn drain(&mut self) -> Vec<Handled> {
        let messages = self.conn.poll_all().expect("poll failed");
        messages
            .iter()
            .map(|m| self.sync.handle_message(m).expect("message rejected"))
            .collect()
    }

    /// Wait `duration` and then drain.
    pub fn drain_after(&mut self, duration: Duration) -> Vec<Handled> {
        thread::sleep(duration);
        self.drain()
    }

    fn poll_until(&mut self, what: &str, mut wanted: impl FnMut(&Handled) -> bool) -> Handled {
        let start = Instant::now();
        loop {
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for {what}");
            while let Some(message) = self.conn.poll().expect("poll failed") {
                let handled = self.sync.handle_message(&message).expect("message rejected");
                if wanted(&handled) {
                    return handled;
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn close(&self) {
        self.conn.close();
    }
}

/// Play until both sides conclude. Each turn the mover uses ability
/// `turn % 4`. Returns the number of moves made.
pub fn play_to_the_end(a: &mut TestDuelClient, b: &mut TestDuelClient) -> usize {
    let mut moves = 0;
    while a.phase() != Phase::BattleOver && a.phase() != Phase::LevelUp {
        assert!(moves < 500, "battle did not end");
        let (mover, waiter) = if a.phase() == Phase::MyTurn {
            (&mut *a, &mut *b)
        } else {
            (&mut *b, &mut *a)
        };
        assert_eq!(mover.phase(), Phase::MyTurn);
        mover.play(moves % 4);
        waiter.poll_until_applied();
        moves += 1;
    }
    moves
}
