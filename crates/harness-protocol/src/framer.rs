//! Reassembly of a byte stream into messages.
//!
//! TCP delivers bytes, not messages: one read may carry several messages
//! back-to-back, or only part of one. `StreamDecoder` buffers whatever
//! arrives and hands out a message only once all of its fixed-length bytes
//! are present. The tag of the message at the head of the buffer is the
//! only thing that decides where the next one starts.

use bytes::{Buf, BytesMut};

use crate::binary_codec::{self, ProtocolError};
use crate::messages::Message;
use crate::wire_types::{Direction, MAX_WIRE_LEN};

/// Incremental decoder for one direction of one connection.
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: BytesMut,
    accept: Option<Direction>,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    /// Decoder that accepts every known message type.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            accept: None,
        }
    }

    /// Decoder that treats messages flowing the other way as malformed.
    ///
    /// A server reading client bytes uses `Direction::ClientToServer`.
    pub fn for_direction(direction: Direction) -> Self {
        Self {
            accept: Some(direction),
            ..Self::new()
        }
    }

    /// Append freshly received bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes received but not yet handed out as a message.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete message, if one is fully buffered.
    ///
    /// `Ok(None)` means "wait for more bytes". An unknown tag is a hard
    /// error: without it the decoder cannot know where the next message
    /// starts, so the stream is unrecoverable. A known tag flowing the
    /// wrong way is rejected as `WrongDirection`.
    pub fn next_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let (msg_type, need) = binary_codec::frame_len(&self.buffer)?;
        if let Some(direction) = self.accept {
            if msg_type.direction() != direction {
                return Err(ProtocolError::WrongDirection(msg_type));
            }
        }

        if self.buffer.len() < need {
            return Ok(None);
        }

        let (msg, used) = binary_codec::decode(&self.buffer[..need])?;
        self.buffer.advance(used);
        Ok(Some(msg))
    }

    /// Feed a chunk and drain every message it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Message>, ProtocolError> {
        self.extend(chunk);
        let mut out = Vec::with_capacity(chunk.len() / MAX_WIRE_LEN + 1);
        while let Some(msg) = self.next_message()? {
            out.push(msg);
        }
        Ok(out)
    }
}
