//! Error taxonomy for a client session.
//!
//! Every error here is local to one session: it is caught at the session
//! boundary, logged with the session's name, and ends that session only.

use std::io;

use harness_protocol::{ProtocolError, LOGIN_RESPONSE_LEN};
use thiserror::Error;

/// Why the login exchange failed.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Server closed before sending anything.
    #[error("connection closed before login response")]
    Closed,

    /// The single handshake read returned fewer than 5 bytes.
    #[error("short login response: got {got} of {} bytes", LOGIN_RESPONSE_LEN)]
    Short { got: usize },

    /// The first message on the connection was not a login response.
    #[error("expected LoginResponse, got tag {0}")]
    UnexpectedType(u8),

    #[error("login response malformed: {0}")]
    Malformed(#[source] ProtocolError),

    #[error("handshake read failed: {0}")]
    Io(#[source] io::Error),
}

/// Anything that can end a session early.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport could not be established.
    #[error("cannot connect to {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// Bytes from the server did not decode.
    #[error("malformed message: {0}")]
    Malformed(#[from] ProtocolError),

    /// A write failed part-way through delivery.
    #[error("transmit failed after {sent} bytes: {source}")]
    Transmit {
        sent: usize,
        #[source]
        source: io::Error,
    },

    /// A read during the observation window failed.
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    /// The session was told to stop from outside.
    #[error("session aborted")]
    Aborted,

    /// The session's task panicked; reported for that session only.
    #[error("session task failed: {0}")]
    Panicked(String),
}

impl SessionError {
    /// Short machine-readable class, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::Connection { .. } => "connection",
            SessionError::Handshake(_) => "handshake",
            SessionError::Malformed(_) => "malformed_message",
            SessionError::Transmit { .. } => "transmit",
            SessionError::Receive(_) => "receive",
            SessionError::Aborted => "aborted",
            SessionError::Panicked(_) => "panicked",
        }
    }
}
