// Frame forwarding between connected clients.
//
// The relay tracks every live server-side connection (`Peer`) and, once the
// lobby pairs two of them, the pairing. Frames other than `JOIN_LOBBY` are
// forwarded as the original bytes; the relay never re-encodes a payload, so
// message types it does not understand pass through untouched.
//
// Two policies:
// - `Paired` (default): forward only to the sender's partner. A frame from
//   an unpaired connection is a protocol violation and is dropped.
// - `Broadcast`: forward to every other tracked connection. This is the
//   legacy behaviour clients defend against with echo suppression; it
//   misroutes moves once more than one match is running.
//
// A failed write drops the receiving peer: it is removed from the tracked
// set, unpaired, and its socket is shut down so its handler thread exits.
// The sender is never told.
//
// Lock discipline: `peers` and `partners` are only held long enough to copy
// out what is needed. Socket writes happen after both locks are released,
// under the target peer's own writer lock.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, BufWriter};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{Arc, Mutex, PoisonError};

use petduel_protocol::write_frame;
use tracing::{debug, info, warn};

use crate::error::ProtocolViolation;

/// Server-assigned id of an accepted connection, unique for the server's
/// lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum RelayPolicy {
    /// Forward only within a match.
    #[default]
    Paired,
    /// Forward to every other connection.
    Broadcast,
}

struct Peer {
    addr: SocketAddr,
    writer: Mutex<BufWriter<TcpStream>>,
    control: TcpStream,
}

impl Peer {
    fn write(&self, frame: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_frame(&mut *writer, frame)
    }
}

pub struct Relay {
    policy: RelayPolicy,
    peers: Mutex<BTreeMap<ConnectionId, Arc<Peer>>>,
    partners: Mutex<BTreeMap<ConnectionId, ConnectionId>>,
}

impl Relay {
    pub fn new(policy: RelayPolicy) -> Self {
        Self {
            policy,
            peers: Mutex::new(BTreeMap::new()),
            partners: Mutex::new(BTreeMap::new()),
        }
    }

    /// Track a connection. `stream` becomes the write half; reads stay
    /// with the caller.
    pub fn register(&self, id: ConnectionId, stream: TcpStream) -> io::Result<()> {
        let addr = stream.peer_addr()?;
        let control = stream.try_clone()?;
        let peer = Arc::new(Peer {
            addr,
            writer: Mutex::new(BufWriter::new(stream)),
            control,
        });
        self.peers().insert(id, peer);
        debug!(conn = %id, %addr, "registered");
        Ok(())
    }

    /// Stop tracking a connection. Returns the partner it was paired with.
    pub fn unregister(&self, id: ConnectionId) -> Option<ConnectionId> {
        if let Some(peer) = self.peers().remove(&id) {
            debug!(conn = %id, addr = %peer.addr, "unregistered");
        }
        self.unpair(id)
    }

    /// Record a match between `a` and `b`, replacing any earlier pairing
    /// either had.
    pub fn pair(&self, a: ConnectionId, b: ConnectionId) {
        self.unpair(a);
        self.unpair(b);
        let mut partners = self.partners();
        partners.insert(a, b);
        partners.insert(b, a);
    }

    /// Dissolve the pairing `id` is part of, if any.
    pub fn unpair(&self, id: ConnectionId) -> Option<ConnectionId> {
        let mut partners = self.partners();
        let partner = partners.remove(&id)?;
        partners.remove(&partner);
        debug!(conn = %id, %partner, "unpaired");
        Some(partner)
    }

    pub fn partner(&self, id: ConnectionId) -> Option<ConnectionId> {
        self.partners().get(&id).copied()
    }

    pub fn connection_count(&self) -> usize {
        self.peers().len()
    }

    /// Write one frame to `id`. A failed write drops the peer.
    pub fn send_to(&self, id: ConnectionId, frame: &[u8]) -> bool {
        let Some(peer) = self.peers().get(&id).cloned() else {
            debug!(conn = %id, "send to untracked connection");
            return false;
        };
        self.write_or_drop(id, &peer, frame)
    }

    /// Forward a frame from `from` according to the policy. Returns how many
    /// peers received it.
    pub fn forward(&self, from: ConnectionId, frame: &[u8]) -> Result<usize, ProtocolViolation> {
        let targets: Vec<(ConnectionId, Arc<Peer>)> = match self.policy {
            RelayPolicy::Paired => {
                let partner = self.partner(from).ok_or_else(|| ProtocolViolation {
                    conn: from,
                    reason: "message from a connection that is not in a match".into(),
                })?;
                self.peers()
                    .get(&partner)
                    .map(|peer| vec![(partner, peer.clone())])
                    .unwrap_or_default()
            }
            RelayPolicy::Broadcast => self
                .peers()
                .iter()
                .filter(|(id, _)| **id != from)
                .map(|(id, peer)| (*id, peer.clone()))
                .collect(),
        };
        let delivered = targets
            .iter()
            .filter(|(id, peer)| self.write_or_drop(*id, peer, frame))
            .count();
        debug!(conn = %from, delivered, "forwarded");
        Ok(delivered)
    }

    /// Shut down every tracked socket, unblocking their handler threads.
    pub fn shutdown_all(&self) {
        for peer in self.peers().values() {
            let _ = peer.control.shutdown(Shutdown::Both);
        }
    }

    fn write_or_drop(&self, id: ConnectionId, peer: &Peer, frame: &[u8]) -> bool {
        match peer.write(frame) {
            Ok(()) => true,
            Err(e) => {
                warn!(conn = %id, addr = %peer.addr, error = %e, "write failed, dropping peer");
                self.drop_peer(id);
                false
            }
        }
    }

    fn drop_peer(&self, id: ConnectionId) {
        let removed = self.peers().remove(&id);
        if let Some(peer) = removed {
            let _ = peer.control.shutdown(Shutdown::Both);
        }
        if let Some(partner) = self.unpair(id) {
            info!(conn = %id, %partner, "match dissolved after failed write");
        }
    }

    fn peers(&self) -> std::sync::MutexGuard<'_, BTreeMap<ConnectionId, Arc<Peer>>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn partners(&self) -> std::sync::MutexGuard<'_, BTreeMap<ConnectionId, ConnectionId>> {
        self.partners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
