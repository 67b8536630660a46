//! Low-level wire types and constants.
//!
//! This module defines:
//! - Message type tags (the first byte of every message).
//! - The fixed total length implied by each tag.
//! - One-byte enums carried inside message bodies.
//!
//! There is no length prefix and no delimiter on the wire: the tag alone
//! tells the reader how many bytes belong to the message. The actual
//! encode/decode logic lives in `binary_codec`.

/// Message type tags.
///
/// These IDs are used in the first byte of each message.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// New order (client → server).
    NewOrder = 1,

    /// Cancel an order by id (client → server).
    CancelOrder = 2,

    /// Execution report (server → client).
    ExecutionReport = 3,

    /// Public trade print (server → client).
    Trade = 4,

    /// Login response carrying the assigned client id (server → client).
    LoginResponse = 5,
}

/// Which side of the connection is allowed to send a message type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

pub const NEW_ORDER_LEN: usize = 24;
pub const CANCEL_ORDER_LEN: usize = 9;
pub const EXECUTION_REPORT_LEN: usize = 32;
pub const TRADE_LEN: usize = 38;
pub const LOGIN_RESPONSE_LEN: usize = 5;

/// Largest fixed message length; handy for stack buffers.
pub const MAX_WIRE_LEN: usize = TRADE_LEN;

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(MessageType::NewOrder),
            2 => Some(MessageType::CancelOrder),
            3 => Some(MessageType::ExecutionReport),
            4 => Some(MessageType::Trade),
            5 => Some(MessageType::LoginResponse),
            _ => None,
        }
    }

    /// Total encoded length, tag byte included.
    pub const fn wire_len(self) -> usize {
        match self {
            MessageType::NewOrder => NEW_ORDER_LEN,
            MessageType::CancelOrder => CANCEL_ORDER_LEN,
            MessageType::ExecutionReport => EXECUTION_REPORT_LEN,
            MessageType::Trade => TRADE_LEN,
            MessageType::LoginResponse => LOGIN_RESPONSE_LEN,
        }
    }

    pub const fn direction(self) -> Direction {
        match self {
            MessageType::NewOrder | MessageType::CancelOrder => Direction::ClientToServer,
            MessageType::ExecutionReport | MessageType::Trade | MessageType::LoginResponse => {
                Direction::ServerToClient
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MessageType::NewOrder => "NewOrder",
            MessageType::CancelOrder => "CancelOrder",
            MessageType::ExecutionReport => "ExecutionReport",
            MessageType::Trade => "Trade",
            MessageType::LoginResponse => "LoginResponse",
        }
    }
}

/// Order side.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {
    /// Highest price a buyer is willing to pay.
    Bid = 0,
    /// Lowest price a seller will accept.
    Ask = 1,
}

impl Side {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Side::Bid),
            1 => Some(Side::Ask),
            _ => None,
        }
    }

    /// Script representation (`'B'` / `'S'`).
    pub fn as_char(self) -> char {
        match self {
            Side::Bid => 'B',
            Side::Ask => 'S',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(Side::Bid),
            'S' => Some(Side::Ask),
            _ => None,
        }
    }
}

/// Order kind (limit vs market).
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OrderKind {
    Limit = 0,
    Market = 1,
}

impl OrderKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(OrderKind::Limit),
            1 => Some(OrderKind::Market),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            OrderKind::Limit => 'L',
            OrderKind::Market => 'M',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'L' => Some(OrderKind::Limit),
            'M' => Some(OrderKind::Market),
            _ => None,
        }
    }
}

/// Order lifetime policy.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TimeInForce {
    /// Good till cancelled.
    Gtc = 0,
    /// Immediate or cancel.
    Ioc = 1,
}

impl TimeInForce {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(TimeInForce::Gtc),
            1 => Some(TimeInForce::Ioc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
        }
    }

    pub fn from_str_code(s: &str) -> Option<Self> {
        match s {
            "GTC" => Some(TimeInForce::Gtc),
            "IOC" => Some(TimeInForce::Ioc),
            _ => None,
        }
    }
}

/// What an execution report is telling the client.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ExecType {
    New = 0,
    Canceled = 1,
    Rejected = 2,
    Trade = 3,
    Expired = 4,
}

impl ExecType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ExecType::New),
            1 => Some(ExecType::Canceled),
            2 => Some(ExecType::Rejected),
            3 => Some(ExecType::Trade),
            4 => Some(ExecType::Expired),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExecType::New => "NEW",
            ExecType::Canceled => "CANCELED",
            ExecType::Rejected => "REJECTED",
            ExecType::Trade => "TRADE",
            ExecType::Expired => "EXPIRED",
        }
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RejectReason {
    None = 0,
    OrderNotFound = 1,
    PriceInvalid = 2,
    QuantityInvalid = 3,
    MarketClosed = 4,
    SelfTrade = 5,
    InvalidOrderType = 6,
}

impl RejectReason {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(RejectReason::None),
            1 => Some(RejectReason::OrderNotFound),
            2 => Some(RejectReason::PriceInvalid),
            3 => Some(RejectReason::QuantityInvalid),
            4 => Some(RejectReason::MarketClosed),
            5 => Some(RejectReason::SelfTrade),
            6 => Some(RejectReason::InvalidOrderType),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::None => "NONE",
            RejectReason::OrderNotFound => "ORDER_NOT_FOUND",
            RejectReason::PriceInvalid => "PRICE_INVALID",
            RejectReason::QuantityInvalid => "QUANTITY_INVALID",
            RejectReason::MarketClosed => "MARKET_CLOSED",
            RejectReason::SelfTrade => "SELF_TRADE",
            RejectReason::InvalidOrderType => "INVALID_ORDER_TYPE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_map_to_fixed_lengths() {
        assert_eq!(MessageType::from_u8(1).map(MessageType::wire_len), Some(24));
        assert_eq!(MessageType::from_u8(2).map(MessageType::wire_len), Some(9));
        assert_eq!(MessageType::from_u8(3).map(MessageType::wire_len), Some(32));
        assert_eq!(MessageType::from_u8(4).map(MessageType::wire_len), Some(38));
        assert_eq!(MessageType::from_u8(5).map(MessageType::wire_len), Some(5));
    }

    #[test]
    fn unknown_tags_are_rejected() {
        for tag in [0u8, 6, 7, 42, 255] {
            assert_eq!(MessageType::from_u8(tag), None, "tag {}", tag);
        }
    }

    #[test]
    fn max_wire_len_covers_every_type() {
        for tag in 1..=5u8 {
            let t = MessageType::from_u8(tag).unwrap();
            assert!(t.wire_len() <= MAX_WIRE_LEN);
        }
    }

    #[test]
    fn only_orders_flow_client_to_server() {
        assert_eq!(MessageType::NewOrder.direction(), Direction::ClientToServer);
        assert_eq!(MessageType::CancelOrder.direction(), Direction::ClientToServer);
        assert_eq!(MessageType::LoginResponse.direction(), Direction::ServerToClient);
        assert_eq!(MessageType::ExecutionReport.direction(), Direction::ServerToClient);
        assert_eq!(MessageType::Trade.direction(), Direction::ServerToClient);
    }
}
