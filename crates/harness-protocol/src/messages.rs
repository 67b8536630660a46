//! Logical message types carried on the wire.
//!
//! - [`Message`]: the tagged variant every encoded message decodes into.
//!
//! Client → server: [`NewOrder`], [`CancelOrder`].
//! Server → client: [`LoginResponse`], [`ExecutionReport`], [`Trade`].
//!
//! Note: Byte layouts live in `binary_codec`; this module is purely logical.

use crate::wire_types::{ExecType, MessageType, OrderKind, RejectReason, Side, TimeInForce};

/// One protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NewOrder(NewOrder),
    CancelOrder(CancelOrder),
    ExecutionReport(ExecutionReport),
    Trade(Trade),
    LoginResponse(LoginResponse),
}

/// New order (input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: u64,

    /// Price in fixed-point ticks (four implied decimals, e.g. 129224 = 12.9224).
    pub price: u64,

    pub quantity: u32,
    pub side: Side,
    pub kind: OrderKind,
    pub tif: TimeInForce,
}

/// Cancel request (input).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelOrder {
    pub order_id: u64,
}

/// Login response: the first message on every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginResponse {
    pub client_id: u32,
}

/// Execution report (output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReport {
    pub client_id: u32,
    pub order_id: u64,

    /// Last fill price, or 0.
    pub price: u64,

    /// Quantity filled by this event.
    pub last_quantity: u32,

    pub remaining_quantity: u32,
    pub exec_type: ExecType,

    /// Only meaningful when `exec_type` is `Rejected`.
    pub reason: RejectReason,

    pub side: Side,
}

/// Public trade (output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trade {
    /// Resting order.
    pub maker_order_id: u64,
    /// Incoming order.
    pub taker_order_id: u64,
    /// Nanoseconds since start of trading day.
    pub timestamp: u64,
    pub price: u64,
    pub quantity: u32,
    pub aggressor_side: Side,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::NewOrder(_) => MessageType::NewOrder,
            Message::CancelOrder(_) => MessageType::CancelOrder,
            Message::ExecutionReport(_) => MessageType::ExecutionReport,
            Message::Trade(_) => MessageType::Trade,
            Message::LoginResponse(_) => MessageType::LoginResponse,
        }
    }

    /// Encoded length; fixed per message type.
    pub fn wire_len(&self) -> usize {
        self.message_type().wire_len()
    }

    /// Order id the message refers to, if any. Trades report the taker.
    pub fn order_id(&self) -> Option<u64> {
        match self {
            Message::NewOrder(n) => Some(n.order_id),
            Message::CancelOrder(c) => Some(c.order_id),
            Message::ExecutionReport(e) => Some(e.order_id),
            Message::Trade(t) => Some(t.taker_order_id),
            Message::LoginResponse(_) => None,
        }
    }

    /// Limit / good-till-cancel order, the shape every built-in scenario uses.
    pub fn limit_order(order_id: u64, price: u64, quantity: u32, side: Side) -> Self {
        Message::NewOrder(NewOrder {
            order_id,
            price,
            quantity,
            side,
            kind: OrderKind::Limit,
            tif: TimeInForce::Gtc,
        })
    }

    pub fn cancel(order_id: u64) -> Self {
        Message::CancelOrder(CancelOrder { order_id })
    }

    pub fn login(client_id: u32) -> Self {
        Message::LoginResponse(LoginResponse { client_id })
    }
}

impl From<NewOrder> for Message {
    fn from(n: NewOrder) -> Self {
        Message::NewOrder(n)
    }
}

impl From<CancelOrder> for Message {
    fn from(c: CancelOrder) -> Self {
        Message::CancelOrder(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_order_defaults_to_limit_gtc() {
        let Message::NewOrder(n) = Message::limit_order(7, 100, 3, Side::Ask) else {
            panic!("expected NewOrder");
        };
        assert_eq!(n.kind, OrderKind::Limit);
        assert_eq!(n.tif, TimeInForce::Gtc);
        assert_eq!(n.side, Side::Ask);
    }

    #[test]
    fn order_id_accessor() {
        assert_eq!(Message::cancel(1001).order_id(), Some(1001));
        assert_eq!(Message::login(3).order_id(), None);
        assert_eq!(Message::cancel(1).wire_len(), 9);
    }
}
