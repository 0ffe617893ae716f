// Client side of a Pet Duel connection.
//
// `Connection` wraps one TCP stream to the matchmaking server:
// - `connect()` opens the stream on the calling thread, then spawns a
//   background receive thread.
// - The receive thread calls `read_frame()` in a loop, decodes each payload
//   into a `Message`, and pushes it onto an `mpsc` channel in arrival order.
// - `send()` encodes, frames and flushes synchronously on the caller's
//   thread (messages are small).
// - `poll()` pops the oldest queued message without blocking.
//
// The game loop therefore never blocks on network reads. Every method takes
// `&self`, so a `Connection` can sit in an `Arc` and be closed from any
// thread; `close()` shuts the socket down, which unblocks the receive thread
// with EOF.
//
// The same type is used by the `duel_bot` binary and by the
// `multiplayer_tests` crate.

use std::io::{self, BufReader, BufWriter, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use petduel_protocol::{Message, decode, encode, read_frame, write_frame};
use tracing::{debug, info, warn};

use crate::error::NetError;

/// Connect timeout used by `Connection::connect`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Connection {
    peer: SocketAddr,
    writer: Mutex<BufWriter<TcpStream>>,
    /// Kept for `shutdown()`, which unblocks the receive thread.
    control: TcpStream,
    inbox: Mutex<Receiver<Message>>,
    closed: AtomicBool,
    receiving: Arc<AtomicBool>,
    reader_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Connect with `DEFAULT_CONNECT_TIMEOUT`.
    pub fn connect(addr: &str) -> Result<Self, NetError> {
        Self::connect_timeout(addr, DEFAULT_CONNECT_TIMEOUT)
    }

    /// Connect to the first address `addr` resolves to that accepts within
    /// `timeout`.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<Self, NetError> {
        let connect_err = |source: io::Error| NetError::Connect {
            addr: addr.to_string(),
            source,
        };
        let candidates = addr.to_socket_addrs().map_err(connect_err)?;
        let mut last_err = io::Error::new(ErrorKind::NotFound, "address resolved to nothing");
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    info!(server = %candidate, "connected");
                    return Self::from_stream(stream);
                }
                Err(e) => {
                    debug!(server = %candidate, error = %e, "connect attempt failed");
                    last_err = e;
                }
            }
        }
        Err(connect_err(last_err))
    }

    /// Take over an already-connected stream and start its receive thread.
    pub fn from_stream(stream: TcpStream) -> Result<Self, NetError> {
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true).ok();
        let reader = BufReader::new(stream.try_clone()?);
        let control = stream.try_clone()?;
        let writer = BufWriter::new(stream);

        let (tx, rx) = mpsc::channel();
        let receiving = Arc::new(AtomicBool::new(true));
        let receiving_reader = receiving.clone();
        let reader_thread = thread::Builder::new()
            .name(format!("petduel-recv-{peer}"))
            .spawn(move || {
                receive_loop(reader, tx, peer);
                receiving_reader.store(false, Ordering::SeqCst);
            })?;

        Ok(Self {
            peer,
            writer: Mutex::new(writer),
            control,
            inbox: Mutex::new(rx),
            closed: AtomicBool::new(false),
            receiving,
            reader_thread: Mutex::new(Some(reader_thread)),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Encode and send one message.
    pub fn send(&self, message: &Message) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }
        let payload = encode(message)?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        write_frame(&mut *writer, &payload).map_err(NetError::Send)?;
        debug!(kind = message.kind(), "sent");
        Ok(())
    }

    /// Pop the oldest received message, if any. Never blocks.
    pub fn poll(&self) -> Result<Option<Message>, NetError> {
        if self.is_closed() {
            return Err(NetError::Closed);
        }
        let inbox = self.inbox.lock().unwrap_or_else(PoisonError::into_inner);
        match inbox.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }

    /// Drain every queued message, oldest first.
    pub fn poll_all(&self) -> Result<Vec<Message>, NetError> {
        let mut messages = Vec::new();
        while let Some(message) = self.poll()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Whether the receive thread is still reading. False after EOF, a
    /// transport error or `close()`.
    pub fn is_receiving(&self) -> bool {
        !self.is_closed() && self.receiving.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Stop the receive thread and release the socket. Safe to call more
    /// than once and from any thread.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.control.shutdown(Shutdown::Both) {
            debug!(error = %e, "shutdown on close");
        }
        let handle = self
            .reader_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .filter(|h| h.thread().id() != thread::current().id());
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        info!(server = %self.peer, "connection closed");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

/// Receive thread: read frames until EOF or error, decode, queue.
fn receive_loop(mut reader: BufReader<TcpStream>, tx: Sender<Message>, peer: SocketAddr) {
    loop {
        let bytes = match read_frame(&mut reader) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                debug!(server = %peer, "end of stream");
                break;
            }
            Err(e) => {
                debug!(server = %peer, error = %e, "receive loop stopped");
                break;
            }
        };
        match decode(&bytes) {
            Ok(message) => {
                debug!(kind = message.kind(), "received");
                if tx.send(message).is_err() {
                    // Connection dropped.
                    break;
                }
            }
            Err(e) => warn!(server = %peer, error = %e, "skipping malformed message"),
        }
    }
}
