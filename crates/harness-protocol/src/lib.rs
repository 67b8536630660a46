//! harness-protocol
//!
//! Wire-level encoding/decoding for the order-entry protocol.
//!
//! This crate is responsible for turning logical messages
//! ([`Message`]) into bytes and back again.
//!
//! - [`wire_types`]   : tags, fixed lengths, one-byte enums
//! - [`messages`]     : logical message structs
//! - [`binary_codec`] : fixed-length big-endian wire format
//! - [`framer`]       : stream reassembly across partial reads
//! - [`text_codec`]   : scenario scripts and readable log lines

pub mod wire_types;
pub mod messages;
pub mod binary_codec;
pub mod framer;
pub mod text_codec;

pub use wire_types::{
    Direction, ExecType, MessageType, OrderKind, RejectReason, Side, TimeInForce,
    LOGIN_RESPONSE_LEN, MAX_WIRE_LEN,
};

pub use messages::{CancelOrder, ExecutionReport, LoginResponse, Message, NewOrder, Trade};

pub use binary_codec::{
    ProtocolError,
    decode,
    decode_all,
    decode_exact,
    encode,
    encode_all,
    encode_to_vec,
};

pub use framer::StreamDecoder;
pub use text_codec::{format_message, parse_message_line, parse_script, ScriptError};
