//! The mandatory first exchange on every connection.
//!
//! The server speaks first: it pushes a 5-byte login response carrying
//! the client id. The client must receive and validate it before sending
//! anything. The receive is a single read. A short read is a hard
//! failure, never a cue to keep reading, and nothing is retried.

use harness_protocol::{decode_exact, Message, MessageType, LOGIN_RESPONSE_LEN};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::HandshakeError;

/// Lifecycle of a client session.
///
/// ```text
/// Connected → AwaitingHandshake → Ready → Sending → Closed
///      │              │             │
///      └──────────────┴─────────────┴──────────────→ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connected,
    AwaitingHandshake,
    Ready,
    Sending,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connected, AwaitingHandshake)
                | (AwaitingHandshake, Ready)
                | (Ready, Sending)
                | (Connected | AwaitingHandshake | Ready | Sending, Closed)
        )
    }
}

/// Receive and validate the login response; returns the assigned client id.
pub async fn perform_handshake<R>(reader: &mut R) -> Result<u32, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; LOGIN_RESPONSE_LEN];
    let n = reader.read(&mut buf).await.map_err(HandshakeError::Io)?;

    if n == 0 {
        return Err(HandshakeError::Closed);
    }
    if n < LOGIN_RESPONSE_LEN {
        return Err(HandshakeError::Short { got: n });
    }
    if buf[0] != MessageType::LoginResponse as u8 {
        return Err(HandshakeError::UnexpectedType(buf[0]));
    }

    match decode_exact(&buf).map_err(HandshakeError::Malformed)? {
        Message::LoginResponse(login) => Ok(login.client_id),
        other => Err(HandshakeError::UnexpectedType(other.message_type() as u8)),
    }
}
