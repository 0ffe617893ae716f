// End-to-end integration tests for the multiplayer pipeline.
//
// Each test starts a real server, connects real `Connection`s (via
// `TestDuelClient`) and checks the full path: JOIN_LOBBY -> pairing ->
// BATTLE_START -> MOVEs relayed turn by turn -> both mirrors conclude the
// same battle and each side applies its own XP change.

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use multiplayer_tests::{TestDuelClient, play_to_the_end};
use petduel_protocol::{Message, MoveAction, Role};
use petduel_relay::{LobbyState, RelayPolicy, ServerConfig, ServerHandle, start_server};
use petduel_sim::{Handled, LevelUpStep, Phase, Species};

fn start(policy: RelayPolicy) -> (ServerHandle, SocketAddr) {
    start_server(ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        relay_policy: policy,
    })
    .unwrap()
}

fn wait_until_waiting(handle: &ServerHandle) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !matches!(handle.lobby_state(), LobbyState::Waiting(_)) {
        assert!(Instant::now() < deadline, "nobody entered the lobby");
        thread::sleep(Duration::from_millis(10));
    }
}

/// Connect two clients, join A then B, and wait for both BATTLE_STARTs.
fn start_match(
    handle: &ServerHandle,
    addr: SocketAddr,
    (species_a, seed_a): (Species, u64),
    (species_b, seed_b): (Species, u64),
) -> (TestDuelClient, TestDuelClient) {
    let mut a = TestDuelClient::connect(addr, species_a, seed_a);
    let mut b = TestDuelClient::connect(addr, species_b, seed_b);
    a.join_lobby();
    wait_until_waiting(handle);
    b.join_lobby();
    assert_eq!(a.poll_until_started(), Role::Player1);
    assert_eq!(b.poll_until_started(), Role::Player2);
    (a, b)
}

fn assert_mirrors_agree(a: &TestDuelClient, b: &TestDuelClient) {
    assert_eq!(a.battle().own(), b.battle().opponent());
    assert_eq!(a.battle().opponent(), b.battle().own());
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

#[test]
fn full_battle_concludes_identically_on_both_sides() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = start_match(
        &handle,
        addr,
        (Species::Skeleton, 1),
        (Species::Goblin, 2),
    );
    assert_eq!(a.phase(), Phase::MyTurn);
    assert_eq!(b.phase(), Phase::OpponentTurn);

    let moves = play_to_the_end(&mut a, &mut b);
    assert!(moves > 0);
    assert_mirrors_agree(&a, &b);

    let (winner, loser) = if a.outcome().won { (&a, &b) } else { (&b, &a) };
    assert!(!loser.outcome().won);

    assert_eq!(winner.outcome().xp_delta, 100);
    assert!(winner.outcome().leveled_up);
    assert_eq!(winner.phase(), Phase::LevelUp);
    let winner_creature = winner.sync.own_creature().unwrap();
    assert_eq!(winner_creature.level, 2);
    assert_eq!(winner_creature.xp, 0);

    assert_eq!(loser.outcome().xp_delta, -50);
    assert_eq!(loser.phase(), Phase::BattleOver);
    let loser_creature = loser.sync.own_creature().unwrap();
    assert_eq!(loser_creature.level, 1);
    assert_eq!(loser_creature.xp, -50);
    assert_eq!(loser.battle().own().current_hp, 0);

    handle.stop();
}

#[test]
fn turn_token_alternates_across_the_wire() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = start_match(&handle, addr, (Species::Troll, 3), (Species::Knight, 4));

    let hp_before = b.battle().own().current_hp;
    a.play(0);
    assert_eq!(a.phase(), Phase::OpponentTurn);
    let applied = b.poll_until_applied();
    assert_eq!(applied.attacker, petduel_sim::Side::Opponent);
    assert!(b.battle().own().current_hp < hp_before);
    assert_eq!(b.sync.current_turn(), Some(Role::Player2));
    assert_eq!(b.phase(), Phase::MyTurn);

    b.play(1);
    a.poll_until_applied();
    assert_eq!(a.phase(), Phase::MyTurn);
    assert_mirrors_agree(&a, &b);
    handle.stop();
}

#[test]
fn winner_can_take_the_new_ability() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = start_match(
        &handle,
        addr,
        (Species::FireElemental, 5),
        (Species::Troll, 6),
    );
    play_to_the_end(&mut a, &mut b);
    let winner = if a.outcome().won { &mut a } else { &mut b };

    let prompt = winner.sync.level_up_prompt().expect("winner should be offered an ability");
    let LevelUpStep::ChooseReplacement(choice) = winner.sync.decide_level_up(true).unwrap() else {
        panic!("a creature with four abilities must choose a slot");
    };
    assert_eq!(choice.candidate, prompt.candidate);
    let slot = choice.eligible_indices[0];
    assert!(matches!(
        winner.sync.choose_replacement(Some(slot)).unwrap(),
        LevelUpStep::Replaced { .. }
    ));
    assert_eq!(
        winner.sync.own_creature().unwrap().abilities[slot],
        prompt.candidate
    );
    assert_eq!(winner.phase(), Phase::BattleOver);
    handle.stop();
}

#[test]
fn two_matches_run_side_by_side_without_crosstalk() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = start_match(&handle, addr, (Species::Skeleton, 7), (Species::Goblin, 8));
    let (mut c, mut d) = start_match(&handle, addr, (Species::Knight, 9), (Species::Troll, 10));

    // Interleave the two matches move by move, one move per side.
    for index in 0..2 {
        let player1_moves = index == 0;
        let (mover, waiter) = if player1_moves { (&mut a, &mut b) } else { (&mut b, &mut a) };
        mover.play(index);
        waiter.poll_until_applied();
        let (mover, waiter) = if player1_moves { (&mut c, &mut d) } else { (&mut d, &mut c) };
        mover.play(index);
        waiter.poll_until_applied();
    }
    assert_mirrors_agree(&a, &b);
    assert_mirrors_agree(&c, &d);
    assert!(a.drain_after(Duration::from_millis(100)).is_empty());
    assert!(c.drain_after(Duration::from_millis(100)).is_empty());
    handle.stop();
}

#[test]
fn broadcast_echoes_are_suppressed() {
    let (handle, addr) = start(RelayPolicy::Broadcast);
    let (mut a, b) = start_match(&handle, addr, (Species::Goblin, 11), (Species::Skeleton, 12));

    // A third client replays A's move, so A hears its own role back.
    let intruder = TestDuelClient::connect(addr, Species::Troll, 13);
    let own_before = a.battle().own().clone();
    let opp_before = a.battle().opponent().clone();
    intruder.send(&Message::Move(MoveAction {
        index: 0,
        next_turn: Role::Player2,
        sender_role: Role::Player1,
    }));

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut handled = Vec::new();
    while handled.is_empty() {
        assert!(Instant::now() < deadline, "echo never arrived");
        handled = a.drain_after(Duration::from_millis(10));
    }
    assert_eq!(handled, vec![Handled::EchoIgnored]);
    assert_eq!(a.battle().own(), &own_before);
    assert_eq!(a.battle().opponent(), &opp_before);
    assert_eq!(a.phase(), Phase::MyTurn);
    drop(b);
    handle.stop();
}

#[test]
fn moves_after_partner_disconnect_go_nowhere() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, b) = start_match(&handle, addr, (Species::Knight, 14), (Species::Goblin, 15));
    b.close();
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.connection_count() != 1 {
        assert!(Instant::now() < deadline, "server never noticed the disconnect");
        thread::sleep(Duration::from_millis(10));
    }
    a.play(0);
    assert_eq!(a.phase(), Phase::OpponentTurn);
    assert!(a.drain_after(Duration::from_millis(200)).is_empty());
    handle.stop();
}
