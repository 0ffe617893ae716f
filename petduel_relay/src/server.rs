// TCP server: accept loop plus one handler thread per connection.
//
// Architecture:
// - **Accept thread**: non-blocking `TcpListener::accept()` loop that checks
//   `keep_running` between attempts. Each accepted socket gets a fresh
//   `ConnectionId`, is registered with the `Relay` (write half) and handed
//   to its own handler thread (read half).
// - **Handler threads**: block in `read_frame()`; the handler is the
//   connection's receive loop. A `JOIN_LOBBY` goes to the shared `Lobby`;
//   when it completes a pair the handler records the pairing and sends both
//   `BATTLE_START`s (the arrival is re-queued if the waiter is already
//   gone). Every other frame goes to `Relay::forward` as the original
//   bytes.
//
// A frame that does not decode is dropped and the connection stays open.
// EOF or a transport error ends the handler: the connection leaves the
// lobby if it was waiting and is removed from the relay, dissolving its
// match.
//
// Shutdown: `ServerHandle::stop()` clears `keep_running`, shuts down every
// tracked socket so blocked handlers see EOF, and joins the accept thread.

use std::io::{self, BufReader, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use petduel_protocol::{Message, Role, decode, encode, read_frame};
use tracing::{debug, info, warn};

use crate::lobby::{Lobby, LobbyState, MatchAssignment, Participant};
use crate::relay::{ConnectionId, Relay, RelayPolicy};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Configuration for `start_server`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    /// 0 lets the OS pick a free port.
    pub port: u16,
    pub relay_policy: RelayPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9999,
            relay_policy: RelayPolicy::Paired,
        }
    }
}

/// State shared by the accept thread and every handler thread.
struct Shared {
    lobby: Lobby,
    relay: Relay,
    next_id: AtomicU64,
}

/// Handle returned by `start_server` to inspect and stop the server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn lobby_state(&self) -> LobbyState {
        self.shared.lobby.state()
    }

    /// Connections currently tracked by the relay.
    pub fn connection_count(&self) -> usize {
        self.shared.relay.connection_count()
    }

    /// Stop accepting, disconnect everyone and wait for the accept thread.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.shared.relay.shutdown_all();
        info!("server stopped");
    }
}

/// Bind and start serving on background threads. Returns the handle and
/// the bound address.
pub fn start_server(config: ServerConfig) -> io::Result<(ServerHandle, SocketAddr)> {
    let listener = TcpListener::bind((config.host.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;

    let shared = Arc::new(Shared {
        lobby: Lobby::new(),
        relay: Relay::new(config.relay_policy),
        next_id: AtomicU64::new(1),
    });
    let keep_running = Arc::new(AtomicBool::new(true));

    let shared_accept = shared.clone();
    let keep_running_accept = keep_running.clone();
    let thread = thread::Builder::new()
        .name("petduel-accept".into())
        .spawn(move || accept_loop(listener, shared_accept, keep_running_accept))?;

    info!(%addr, policy = ?config.relay_policy, "listening");
    Ok((
        ServerHandle {
            keep_running,
            shared,
            thread: Some(thread),
        },
        addr,
    ))
}

fn accept_loop(listener: TcpListener, shared: Arc<Shared>, keep_running: Arc<AtomicBool>) {
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, addr)) => {
                let id = ConnectionId(shared.next_id.fetch_add(1, Ordering::SeqCst));
                if let Err(e) = spawn_handler(stream, id, addr, shared.clone()) {
                    warn!(conn = %id, %addr, error = %e, "could not start handler");
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL_INTERVAL),
            Err(e) => {
                warn!(error = %e, "accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn spawn_handler(
    stream: TcpStream,
    id: ConnectionId,
    addr: SocketAddr,
    shared: Arc<Shared>,
) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true).ok();
    let reader = BufReader::new(stream.try_clone()?);
    shared.relay.register(id, stream)?;
    info!(conn = %id, %addr, "connected");
    let shared_handler = shared.clone();
    thread::Builder::new()
        .name(format!("petduel-{id}"))
        .spawn(move || {
            handle_connection(reader, id, &shared_handler);
            disconnect(id, &shared_handler);
        })
        .inspect_err(|_| {
            shared.relay.unregister(id);
        })?;
    Ok(())
}

/// The connection's receive loop.
fn handle_connection(mut reader: BufReader<TcpStream>, id: ConnectionId, shared: &Shared) {
    loop {
        match read_frame(&mut reader) {
            Ok(frame) => dispatch(id, &frame, shared),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(conn = %id, "end of stream");
                break;
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!(conn = %id, error = %e, "unreadable frame, closing");
                break;
            }
            Err(e) => {
                debug!(conn = %id, error = %e, "read failed");
                break;
            }
        }
    }
}

fn dispatch(id: ConnectionId, frame: &[u8], shared: &Shared) {
    let message = match decode(frame) {
        Ok(message) => message,
        Err(e) => {
            warn!(conn = %id, error = %e, "dropping malformed message");
            return;
        }
    };
    match message {
        Message::JoinLobby { creature } => {
            if let Some(partner) = shared.relay.unpair(id) {
                info!(conn = %id, %partner, "left match to rejoin the lobby");
            }
            if let Some(assignment) = shared.lobby.try_join(Participant { id, creature }) {
                start_match(assignment, shared);
            }
        }
        other => {
            debug!(conn = %id, kind = other.kind(), "relaying");
            if let Err(violation) = shared.relay.forward(id, frame) {
                warn!(%violation, kind = other.kind(), "dropping frame");
            }
        }
    }
}

/// Pair the two participants and send each its `BATTLE_START`, the waiter
/// first. A waiter that can no longer be reached never enters the match:
/// the arrival goes back to the lobby instead, and may pair with whoever is
/// waiting there now.
///
/// Runs on the arrival's handler thread, so the arrival is still connected.
fn start_match(mut assignment: MatchAssignment, shared: &Shared) {
    loop {
        let (player1, player2) = (assignment.player1.id, assignment.player2.id);
        shared.relay.pair(player1, player2);
        if send_battle_start(&assignment, Role::Player1, shared) {
            send_battle_start(&assignment, Role::Player2, shared);
            info!(%player1, %player2, "match started");
            return;
        }
        shared.relay.unpair(player1);
        info!(%player1, %player2, "waiter is gone, returning arrival to the lobby");
        match shared.lobby.try_join(assignment.player2) {
            Some(next) => assignment = next,
            None => return,
        }
    }
}

fn send_battle_start(assignment: &MatchAssignment, role: Role, shared: &Shared) -> bool {
    let participant = assignment.participant(role);
    let message = Message::BattleStart(assignment.battle_start_for(role));
    let delivered = match encode(&message) {
        Ok(bytes) => shared.relay.send_to(participant.id, &bytes),
        Err(e) => {
            warn!(conn = %participant.id, error = %e, "could not encode BATTLE_START");
            false
        }
    };
    if !delivered {
        warn!(conn = %participant.id, %role, "BATTLE_START not delivered");
    }
    delivered
}

fn disconnect(id: ConnectionId, shared: &Shared) {
    shared.lobby.leave(id);
    if let Some(partner) = shared.relay.unregister(id) {
        info!(conn = %id, %partner, "match dissolved by disconnect");
    }
    info!(conn = %id, "disconnected");
}
