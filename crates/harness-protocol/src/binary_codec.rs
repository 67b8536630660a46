//! Binary encoding/decoding for protocol messages.
//!
//! All multi-byte integers are big-endian. Every message starts with a
//! one-byte tag and has a fixed total length determined by that tag:
//!
//! ```text
//! LoginResponse (tag=5, 5 bytes):
//!   [1..5]   client_id (u32 BE)
//!
//! NewOrder (tag=1, 24 bytes):
//!   [1..9]   order_id (u64 BE)
//!   [9..17]  price (u64 BE)
//!   [17..21] quantity (u32 BE)
//!   [21]     side (0=Bid, 1=Ask)
//!   [22]     kind (0=Limit, 1=Market)
//!   [23]     tif  (0=GTC, 1=IOC)
//!
//! CancelOrder (tag=2, 9 bytes):
//!   [1..9]   order_id (u64 BE)
//!
//! ExecutionReport (tag=3, 32 bytes):
//!   [1..5]   client_id (u32 BE)
//!   [5..13]  order_id (u64 BE)
//!   [13..21] price (u64 BE)
//!   [21..25] last_quantity (u32 BE)
//!   [25..29] remaining_quantity (u32 BE)
//!   [29]     exec_type
//!   [30]     reject_reason
//!   [31]     side
//!
//! Trade (tag=4, 38 bytes):
//!   [1..9]   maker_order_id (u64 BE)
//!   [9..17]  taker_order_id (u64 BE)
//!   [17..25] timestamp (u64 BE)
//!   [25..33] price (u64 BE)
//!   [33..37] quantity (u32 BE)
//!   [37]     aggressor_side
//! ```
//!
//! NOTE: There is no length prefix and no delimiter. A reader finds the
//! next message boundary only by knowing the current message's tag. Do not
//! add framing here; the external server depends on this exact layout.

use thiserror::Error;

use crate::messages::{CancelOrder, ExecutionReport, LoginResponse, Message, NewOrder, Trade};
use crate::wire_types::{ExecType, MessageType, OrderKind, RejectReason, Side, TimeInForce};

/// Errors that can arise when decoding a binary message.
///
/// Every variant is a "malformed message": the decoder never guesses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// No bytes at all.
    #[error("empty buffer")]
    Empty,

    /// Leading tag is not a known message type.
    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    /// A known message type that never travels this way on the connection.
    #[error("{} ({}) sent in the wrong direction", .0.name(), *.0 as u8)]
    WrongDirection(MessageType),

    /// Buffer too short for the tag's fixed length.
    #[error("{} truncated: need {need} bytes, got {got}", .msg_type.name())]
    Truncated {
        msg_type: MessageType,
        need: usize,
        got: usize,
    },

    /// A one-byte enum field holds an out-of-range value.
    #[error("invalid {field}: {value}")]
    InvalidField { field: &'static str, value: u8 },

    /// Bytes left over after the last complete message.
    #[error("{0} trailing bytes after last message")]
    TrailingBytes(usize),
}

// ============================================================================
// ENCODE
// ============================================================================

/// Encode a single message.
///
/// Exactly `msg.wire_len()` bytes are appended to `out`.
pub fn encode(msg: &Message, out: &mut Vec<u8>) {
    out.reserve(msg.wire_len());
    out.push(msg.message_type() as u8);

    match msg {
        Message::NewOrder(n) => {
            out.extend_from_slice(&n.order_id.to_be_bytes());
            out.extend_from_slice(&n.price.to_be_bytes());
            out.extend_from_slice(&n.quantity.to_be_bytes());
            out.push(n.side as u8);
            out.push(n.kind as u8);
            out.push(n.tif as u8);
        }
        Message::CancelOrder(c) => {
            out.extend_from_slice(&c.order_id.to_be_bytes());
        }
        Message::LoginResponse(l) => {
            out.extend_from_slice(&l.client_id.to_be_bytes());
        }
        Message::ExecutionReport(e) => {
            out.extend_from_slice(&e.client_id.to_be_bytes());
            out.extend_from_slice(&e.order_id.to_be_bytes());
            out.extend_from_slice(&e.price.to_be_bytes());
            out.extend_from_slice(&e.last_quantity.to_be_bytes());
            out.extend_from_slice(&e.remaining_quantity.to_be_bytes());
            out.push(e.exec_type as u8);
            out.push(e.reason as u8);
            out.push(e.side as u8);
        }
        Message::Trade(t) => {
            out.extend_from_slice(&t.maker_order_id.to_be_bytes());
            out.extend_from_slice(&t.taker_order_id.to_be_bytes());
            out.extend_from_slice(&t.timestamp.to_be_bytes());
            out.extend_from_slice(&t.price.to_be_bytes());
            out.extend_from_slice(&t.quantity.to_be_bytes());
            out.push(t.aggressor_side as u8);
        }
    }
}

/// Encode a single message into a fresh buffer.
pub fn encode_to_vec(msg: &Message) -> Vec<u8> {
    let mut out = Vec::with_capacity(msg.wire_len());
    encode(msg, &mut out);
    out
}

/// Encode several messages back-to-back into one buffer.
pub fn encode_all<'a, I>(msgs: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut out = Vec::new();
    for msg in msgs {
        encode(msg, &mut out);
    }
    out
}

// ============================================================================
// DECODE
// ============================================================================

/// Peek at the leading tag and return the length the message must have.
pub fn frame_len(buf: &[u8]) -> Result<(MessageType, usize), ProtocolError> {
    let tag = *buf.first().ok_or(ProtocolError::Empty)?;
    let msg_type = MessageType::from_u8(tag).ok_or(ProtocolError::UnknownMessageType(tag))?;
    Ok((msg_type, msg_type.wire_len()))
}

/// Decode the leading message of `buf`.
///
/// Returns the message and the number of bytes it occupied. Any bytes
/// after that are left untouched for the caller.
pub fn decode(buf: &[u8]) -> Result<(Message, usize), ProtocolError> {
    let (msg_type, need) = frame_len(buf)?;
    if buf.len() < need {
        return Err(ProtocolError::Truncated {
            msg_type,
            need,
            got: buf.len(),
        });
    }

    let mut r = Reader::new(&buf[1..need]);
    let msg = match msg_type {
        MessageType::NewOrder => Message::NewOrder(NewOrder {
            order_id: r.u64(),
            price: r.u64(),
            quantity: r.u32(),
            side: r.side("side")?,
            kind: r.byte_enum("order_kind", OrderKind::from_u8)?,
            tif: r.byte_enum("time_in_force", TimeInForce::from_u8)?,
        }),
        MessageType::CancelOrder => Message::CancelOrder(CancelOrder { order_id: r.u64() }),
        MessageType::LoginResponse => Message::LoginResponse(LoginResponse {
            client_id: r.u32(),
        }),
        MessageType::ExecutionReport => Message::ExecutionReport(ExecutionReport {
            client_id: r.u32(),
            order_id: r.u64(),
            price: r.u64(),
            last_quantity: r.u32(),
            remaining_quantity: r.u32(),
            exec_type: r.byte_enum("exec_type", ExecType::from_u8)?,
            reason: r.byte_enum("reject_reason", RejectReason::from_u8)?,
            side: r.side("side")?,
        }),
        MessageType::Trade => Message::Trade(Trade {
            maker_order_id: r.u64(),
            taker_order_id: r.u64(),
            timestamp: r.u64(),
            price: r.u64(),
            quantity: r.u32(),
            aggressor_side: r.side("aggressor_side")?,
        }),
    };

    Ok((msg, need))
}

/// Decode a buffer that must hold exactly one message.
pub fn decode_exact(buf: &[u8]) -> Result<Message, ProtocolError> {
    let (msg, used) = decode(buf)?;
    if used != buf.len() {
        return Err(ProtocolError::TrailingBytes(buf.len() - used));
    }
    Ok(msg)
}

/// Slice a coalesced buffer into its messages, in order.
///
/// The buffer must end exactly on a message boundary.
pub fn decode_all(mut buf: &[u8]) -> Result<Vec<Message>, ProtocolError> {
    let mut msgs = Vec::new();
    while !buf.is_empty() {
        let (msg, used) = match decode(buf) {
            Ok(ok) => ok,
            Err(ProtocolError::Truncated { got, .. }) => {
                return Err(ProtocolError::TrailingBytes(got))
            }
            Err(e) => return Err(e),
        };
        msgs.push(msg);
        buf = &buf[used..];
    }
    Ok(msgs)
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

/// Cursor over a body whose length was already checked against the tag.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        arr
    }

    fn u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    fn u32(&mut self) -> u32 {
        u32::from_be_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_be_bytes(self.take())
    }

    fn byte_enum<T>(
        &mut self,
        field: &'static str,
        parse: fn(u8) -> Option<T>,
    ) -> Result<T, ProtocolError> {
        let value = self.u8();
        parse(value).ok_or(ProtocolError::InvalidField { field, value })
    }

    fn side(&mut self, field: &'static str) -> Result<Side, ProtocolError> {
        self.byte_enum(field, Side::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> Message {
        Message::ExecutionReport(ExecutionReport {
            client_id: 4,
            order_id: 1001,
            price: 100050,
            last_quantity: 0,
            remaining_quantity: 10,
            exec_type: ExecType::New,
            reason: RejectReason::None,
            side: Side::Bid,
        })
    }

    fn sample_trade() -> Message {
        Message::Trade(Trade {
            maker_order_id: 11,
            taker_order_id: 12,
            timestamp: 987_654_321,
            price: 100000,
            quantity: 5,
            aggressor_side: Side::Ask,
        })
    }

    fn every_variant() -> Vec<Message> {
        vec![
            Message::limit_order(5000, 100000, 10, Side::Bid),
            Message::NewOrder(NewOrder {
                order_id: u64::MAX,
                price: u64::MAX,
                quantity: u32::MAX,
                side: Side::Ask,
                kind: OrderKind::Market,
                tif: TimeInForce::Ioc,
            }),
            Message::cancel(1001),
            Message::login(u32::MAX),
            sample_report(),
            sample_trade(),
        ]
    }

    #[test]
    fn round_trip_every_variant() {
        for msg in every_variant() {
            let bytes = encode_to_vec(&msg);
            assert_eq!(decode_exact(&bytes), Ok(msg));
        }
    }

    #[test]
    fn encoded_length_matches_tag() {
        for msg in every_variant() {
            assert_eq!(encode_to_vec(&msg).len(), msg.message_type().wire_len());
        }
        assert_eq!(encode_to_vec(&Message::limit_order(0, 0, 0, Side::Bid)).len(), 24);
        assert_eq!(encode_to_vec(&Message::cancel(0)).len(), 9);
        assert_eq!(encode_to_vec(&Message::login(0)).len(), 5);
    }

    #[test]
    fn new_order_layout_is_big_endian() {
        let bytes = encode_to_vec(&Message::limit_order(1001, 100050, 10, Side::Bid));
        let expected: Vec<u8> = [
            &[1u8][..],
            &1001u64.to_be_bytes(),
            &100050u64.to_be_bytes(),
            &10u32.to_be_bytes(),
            &[0, 0, 0],
        ]
        .concat();
        assert_eq!(bytes, expected);
    }

    #[test]
    fn cancel_and_login_layout() {
        assert_eq!(
            encode_to_vec(&Message::cancel(1001)),
            [&[2u8][..], &1001u64.to_be_bytes()].concat()
        );
        assert_eq!(encode_to_vec(&Message::login(7)), vec![5, 0, 0, 0, 7]);
    }

    #[test]
    fn short_input_never_partially_decodes() {
        for msg in every_variant() {
            let bytes = encode_to_vec(&msg);
            for cut in 1..bytes.len() {
                match decode(&bytes[..cut]) {
                    Err(ProtocolError::Truncated { need, got, .. }) => {
                        assert_eq!(need, bytes.len());
                        assert_eq!(got, cut);
                    }
                    other => panic!("cut {} of {:?} gave {:?}", cut, msg, other),
                }
            }
        }
    }

    #[test]
    fn unknown_tag_and_empty_fail() {
        assert_eq!(decode(&[]), Err(ProtocolError::Empty));
        assert_eq!(decode(&[9, 0, 0, 0, 0]), Err(ProtocolError::UnknownMessageType(9)));
        assert_eq!(decode(&[0; 24]), Err(ProtocolError::UnknownMessageType(0)));
    }

    #[test]
    fn out_of_range_enum_is_malformed() {
        let mut bytes = encode_to_vec(&Message::limit_order(1, 1, 1, Side::Bid));
        bytes[21] = 2;
        assert_eq!(
            decode(&bytes),
            Err(ProtocolError::InvalidField {
                field: "side",
                value: 2
            })
        );
    }

    #[test]
    fn decode_reports_consumed_and_leaves_rest() {
        let mut bytes = encode_to_vec(&Message::cancel(1));
        bytes.extend_from_slice(&[1, 2, 3]);
        let (msg, used) = decode(&bytes).unwrap();
        assert_eq!(msg, Message::cancel(1));
        assert_eq!(used, 9);
        assert_eq!(decode_exact(&bytes), Err(ProtocolError::TrailingBytes(3)));
    }

    #[test]
    fn three_coalesced_orders_slice_from_72_bytes() {
        let orders: Vec<Message> = (0..3)
            .map(|i| Message::limit_order(5000 + i, 100000, 10, Side::Bid))
            .collect();
        let buf = encode_all(&orders);
        assert_eq!(buf.len(), 72);
        assert_eq!(decode_all(&buf).unwrap(), orders);
    }

    #[test]
    fn decode_all_rejects_ragged_tail() {
        let mut buf = encode_all(&[Message::cancel(1), Message::cancel(2)]);
        buf.extend_from_slice(&[1, 0, 0]);
        assert_eq!(decode_all(&buf), Err(ProtocolError::TrailingBytes(3)));
    }

    #[test]
    fn errors_render_readably() {
        let err = decode(&[1, 0]).unwrap_err();
        assert_eq!(err.to_string(), "NewOrder truncated: need 24 bytes, got 2");
    }
}
