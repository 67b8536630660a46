//! Line-oriented text codec.
//!
//! Used for scenario scripts (what a session should send) and for
//! human-readable diagnostics (what a session sent or received).
//!
//! Input format (lines → client messages):
//!
//! - New order:
//!   `N, orderId(int), price(int ticks), qty(int), side(B or S), kind(L or M), tif(GTC or IOC)`
//!
//! - Cancel:
//!   `C, orderId(int)`
//!
//! Output-only formats:
//!
//! - LoginResponse:   `L, clientId`
//! - ExecutionReport: `E, clientId, orderId, price, lastQty, remainingQty, execType, reason, side`
//! - Trade:           `T, makerOrderId, takerOrderId, timestamp, price, qty, aggressorSide`
//!
//! Blank lines and lines starting with `#` are ignored.

use thiserror::Error;

use crate::messages::{Message, NewOrder};
use crate::wire_types::{OrderKind, Side, TimeInForce};

/// A script line that could not be parsed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}: cannot parse `{text}`")]
pub struct ScriptError {
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

/// Parse a single line into a client → server message.
///
/// Returns `None` for blank lines, comments and anything malformed.
pub fn parse_message_line(line: &str) -> Option<Message> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let tokens = split_and_trim(trimmed, ',');
    match tokens.first().map(String::as_str) {
        Some("N") => parse_new_order(&tokens),
        Some("C") => parse_cancel(&tokens),
        _ => None,
    }
}

/// Parse a whole script.
///
/// Unlike [`parse_message_line`], a non-blank, non-comment line that does
/// not parse is an error rather than silently skipped.
pub fn parse_script(text: &str) -> Result<Vec<Message>, ScriptError> {
    let mut msgs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        match parse_message_line(trimmed) {
            Some(msg) => msgs.push(msg),
            None => {
                return Err(ScriptError {
                    line: idx + 1,
                    text: trimmed.to_string(),
                })
            }
        }
    }
    Ok(msgs)
}

fn parse_new_order(tokens: &[String]) -> Option<Message> {
    // N, orderId, price, qty, side, kind, tif
    if tokens.len() != 7 {
        return None;
    }

    let order_id = tokens[1].parse::<u64>().ok()?;
    let price = tokens[2].parse::<u64>().ok()?;
    let quantity = tokens[3].parse::<u32>().ok()?;
    let side = Side::from_char(single_char(&tokens[4])?)?;
    let kind = OrderKind::from_char(single_char(&tokens[5])?)?;
    let tif = TimeInForce::from_str_code(&tokens[6])?;

    Some(Message::NewOrder(NewOrder {
        order_id,
        price,
        quantity,
        side,
        kind,
        tif,
    }))
}

fn parse_cancel(tokens: &[String]) -> Option<Message> {
    // C, orderId
    if tokens.len() != 2 {
        return None;
    }

    let order_id = tokens[1].parse::<u64>().ok()?;
    Some(Message::cancel(order_id))
}

/// Format any message as a single line.
pub fn format_message(msg: &Message) -> String {
    match msg {
        Message::NewOrder(n) => format!(
            "N, {}, {}, {}, {}, {}, {}",
            n.order_id,
            n.price,
            n.quantity,
            n.side.as_char(),
            n.kind.as_char(),
            n.tif.as_str()
        ),
        Message::CancelOrder(c) => format!("C, {}", c.order_id),
        Message::LoginResponse(l) => format!("L, {}", l.client_id),
        Message::ExecutionReport(e) => format!(
            "E, {}, {}, {}, {}, {}, {}, {}, {}",
            e.client_id,
            e.order_id,
            e.price,
            e.last_quantity,
            e.remaining_quantity,
            e.exec_type.as_str(),
            e.reason.as_str(),
            e.side.as_char()
        ),
        Message::Trade(t) => format!(
            "T, {}, {}, {}, {}, {}, {}",
            t.maker_order_id,
            t.taker_order_id,
            t.timestamp,
            t.price,
            t.quantity,
            t.aggressor_side.as_char()
        ),
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn split_and_trim(s: &str, delimiter: char) -> Vec<String> {
    s.split(delimiter)
        .map(|tok| tok.trim().to_string())
        .collect()
}

fn single_char(s: &str) -> Option<char> {
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}
