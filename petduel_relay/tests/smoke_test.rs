// Integration smoke test for the matchmaking server.
//
// Starts a server on localhost port 0 and drives it with plain TCP sockets
// using the protocol crate's framing and codec, with no `Connection` or
// `TurnSync` involved. Covers lobby pairing order, slot exclusivity,
// waiting-participant disconnects, malformed and opaque frames, and both
// relay policies.

use std::io::{BufReader, BufWriter};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use petduel_prng::DuelRng;
use petduel_protocol::{
    BattleStart, CreatureSnapshot, Message, MoveAction, Role, decode, encode, read_frame,
    write_frame,
};
use petduel_relay::{LobbyState, RelayPolicy, ServerConfig, ServerHandle, start_server};
use petduel_sim::{Creature, Species};

const LONG_WAIT: Duration = Duration::from_secs(5);
const SHORT_WAIT: Duration = Duration::from_millis(250);

struct MockClient {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl MockClient {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        Self {
            reader,
            writer: BufWriter::new(stream),
        }
    }

    fn send(&mut self, message: &Message) {
        self.send_raw(&encode(message).unwrap());
    }

    fn send_raw(&mut self, payload: &[u8]) {
        write_frame(&mut self.writer, payload).unwrap();
    }

    fn recv_raw(&mut self) -> Vec<u8> {
        self.reader
            .get_ref()
            .set_read_timeout(Some(LONG_WAIT))
            .unwrap();
        read_frame(&mut self.reader).expect("expected a frame")
    }

    fn recv(&mut self) -> Message {
        decode(&self.recv_raw()).unwrap()
    }

    fn recv_battle_start(&mut self) -> BattleStart {
        match self.recv() {
            Message::BattleStart(start) => start,
            other => panic!("expected BATTLE_START, got {other:?}"),
        }
    }

    /// Whether anything arrives within `SHORT_WAIT`.
    fn nothing_pending(&mut self) -> bool {
        self.reader
            .get_ref()
            .set_read_timeout(Some(SHORT_WAIT))
            .unwrap();
        read_frame(&mut self.reader).is_err()
    }
}

fn creature(species: Species) -> CreatureSnapshot {
    Creature::generate(species, &mut DuelRng::new(42)).to_snapshot()
}

fn join(species: Species) -> Message {
    Message::JoinLobby {
        creature: creature(species),
    }
}

fn start(policy: RelayPolicy) -> (ServerHandle, SocketAddr) {
    start_server(ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        relay_policy: policy,
    })
    .unwrap()
}

fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + LONG_WAIT;
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

fn is_waiting(handle: &ServerHandle) -> bool {
    matches!(handle.lobby_state(), LobbyState::Waiting(_))
}

/// Connect two clients and pair them, A first.
fn paired(handle: &ServerHandle, addr: SocketAddr) -> (MockClient, MockClient) {
    let mut a = MockClient::connect(addr);
    let mut b = MockClient::connect(addr);
    a.send(&join(Species::Skeleton));
    wait_for("A to wait", || is_waiting(handle));
    b.send(&join(Species::Goblin));
    a.recv_battle_start();
    b.recv_battle_start();
    (a, b)
}

fn p1_move(index: u8) -> Message {
    Message::Move(MoveAction {
        index,
        next_turn: Role::Player2,
        sender_role: Role::Player1,
    })
}

#[test]
fn first_arrival_is_player1_and_moves_first() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let mut a = MockClient::connect(addr);
    let mut b = MockClient::connect(addr);

    a.send(&join(Species::Skeleton));
    wait_for("A to wait", || is_waiting(&handle));
    assert!(a.nothing_pending(), "no reply before a partner arrives");
    b.send(&join(Species::Goblin));

    let for_a = a.recv_battle_start();
    assert_eq!(for_a.your_role, Role::Player1);
    assert_eq!(for_a.current_turn, Role::Player1);
    assert_eq!(for_a.player_creature, creature(Species::Skeleton));
    assert_eq!(for_a.opponent_creature, creature(Species::Goblin));

    let for_b = b.recv_battle_start();
    assert_eq!(for_b.your_role, Role::Player2);
    assert_eq!(for_b.current_turn, Role::Player1);
    assert_eq!(for_b.player_creature, creature(Species::Goblin));
    assert_eq!(for_b.opponent_creature, creature(Species::Skeleton));

    assert_eq!(handle.lobby_state(), LobbyState::Empty);
    handle.stop();
}

#[test]
fn third_arrival_waits_alone() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (_a, _b) = paired(&handle, addr);
    assert_eq!(handle.lobby_state(), LobbyState::Empty);

    let mut c = MockClient::connect(addr);
    c.send(&join(Species::Troll));
    wait_for("C to wait", || is_waiting(&handle));
    assert!(c.nothing_pending());
    handle.stop();
}

#[test]
fn waiting_disconnect_vacates_slot() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let mut a = MockClient::connect(addr);
    a.send(&join(Species::Knight));
    wait_for("A to wait", || is_waiting(&handle));
    drop(a);
    wait_for("slot to empty", || handle.lobby_state() == LobbyState::Empty);

    let mut b = MockClient::connect(addr);
    let mut c = MockClient::connect(addr);
    b.send(&join(Species::Goblin));
    wait_for("B to wait", || is_waiting(&handle));
    assert!(b.nothing_pending());
    c.send(&join(Species::Troll));
    assert_eq!(b.recv_battle_start().your_role, Role::Player1);
    assert_eq!(c.recv_battle_start().your_role, Role::Player2);
    handle.stop();
}

#[test]
fn moves_reach_only_the_partner() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = paired(&handle, addr);
    let mut c = MockClient::connect(addr);
    c.send(&join(Species::Troll));
    wait_for("C to wait", || is_waiting(&handle));

    a.send(&p1_move(1));
    assert_eq!(b.recv(), p1_move(1));
    assert!(a.nothing_pending(), "sender gets no echo");
    assert!(c.nothing_pending(), "bystander sees nothing");
    handle.stop();
}

#[test]
fn unpaired_moves_are_dropped() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (_a, mut b) = paired(&handle, addr);
    let mut c = MockClient::connect(addr);
    c.send(&p1_move(0));
    assert!(b.nothing_pending());

    // C's connection is still usable.
    let mut d = MockClient::connect(addr);
    c.send(&join(Species::Troll));
    wait_for("C to wait", || is_waiting(&handle));
    d.send(&join(Species::Knight));
    assert_eq!(c.recv_battle_start().your_role, Role::Player1);
    handle.stop();
}

#[test]
fn malformed_frames_are_dropped_and_connection_survives() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = paired(&handle, addr);
    a.send_raw(b"{not json");
    a.send_raw(br#"{"no_type": true}"#);
    a.send_raw(br#"{"type":"MOVE","index":7,"next_turn":"player2","sender_role":"player1"}"#);
    a.send(&p1_move(2));
    assert_eq!(b.recv(), p1_move(2));
    handle.stop();
}

#[test]
fn unknown_types_are_forwarded_byte_for_byte() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (mut a, mut b) = paired(&handle, addr);
    let chat = br#"{"type":"CHAT","text":"good luck","meta":{"emoji":[1,2,3]}}"#;
    a.send_raw(chat);
    assert_eq!(b.recv_raw(), chat.to_vec());
    handle.stop();
}

#[test]
fn broadcast_reaches_every_other_connection() {
    let (handle, addr) = start(RelayPolicy::Broadcast);
    let (mut a, mut b) = paired(&handle, addr);
    let mut c = MockClient::connect(addr);
    wait_for("C to register", || handle.connection_count() == 3);

    a.send(&p1_move(3));
    assert_eq!(b.recv(), p1_move(3));
    assert_eq!(c.recv(), p1_move(3));
    assert!(a.nothing_pending());
    handle.stop();
}

#[test]
fn partner_disconnect_dissolves_match() {
    let (handle, addr) = start(RelayPolicy::Paired);
    let (a, mut b) = paired(&handle, addr);
    drop(a);
    wait_for("A to be untracked", || handle.connection_count() == 1);
    let reply = Message::Move(MoveAction {
        index: 0,
        next_turn: Role::Player1,
        sender_role: Role::Player2,
    });
    b.send(&reply);
    assert!(b.nothing_pending());
    handle.stop();
}
