// Transport errors for `Connection`.
//
// Receive-loop failures never surface here: the loop logs them and stops,
// and the owner notices through `Connection::is_receiving()`.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    #[error("connection is closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A frame the relay refused to forward.
#[derive(Debug, Error)]
#[error("protocol violation from {conn}: {reason}")]
pub struct ProtocolViolation {
    pub conn: crate::relay::ConnectionId,
    pub reason: String,
}
