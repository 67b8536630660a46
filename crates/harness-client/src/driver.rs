//! Delivery-mode drivers.
//!
//! Both modes put the same encoded bytes on the wire in the same order;
//! they differ only in how those bytes are grouped into writes:
//!
//! - `Coalesced`: every message concatenated, one write.
//! - `Fragmented`: one write per message (or per `n`-byte chunk of each
//!   message), with a pacing pause between consecutive writes.
//!
//! A receiver that frames correctly must decode the same sequence either way.

use std::num::NonZeroUsize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use harness_protocol::{encode, encode_to_vec, Message, Side};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::delay::Delay;
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    Coalesced,
    Fragmented,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coalesced" | "batch" => Ok(DeliveryMode::Coalesced),
            "fragmented" => Ok(DeliveryMode::Fragmented),
            other => Err(format!("unknown delivery mode: {}", other)),
        }
    }
}

/// How fragmented mode slices bytes into writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fragmentation {
    /// One write per whole message.
    #[default]
    PerMessage,
    /// Each message split into writes of at most `n` bytes.
    Chunked(NonZeroUsize),
}

impl Fragmentation {
    pub fn from_chunk_size(chunk: Option<usize>) -> Self {
        chunk
            .and_then(NonZeroUsize::new)
            .map_or(Fragmentation::PerMessage, Fragmentation::Chunked)
    }
}

/// Pause strategy plus the gap to leave between fragmented writes.
#[derive(Debug, Clone)]
pub struct Pacing {
    pub delay: Arc<dyn Delay>,
    pub interval: Duration,
}

/// What a delivery put on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    pub bytes_sent: usize,
    pub writes: usize,
    /// Messages whose last byte has been written.
    pub messages_sent: usize,
    /// Size of each write, in order.
    pub write_sizes: Vec<usize>,
}

/// Group the encoded messages into the writes a mode would issue.
pub fn segments(messages: &[Message], mode: DeliveryMode, frag: Fragmentation) -> Vec<Vec<u8>> {
    match mode {
        DeliveryMode::Coalesced => {
            let mut buf = Vec::with_capacity(messages.iter().map(Message::wire_len).sum());
            for msg in messages {
                encode(msg, &mut buf);
            }
            if buf.is_empty() {
                Vec::new()
            } else {
                vec![buf]
            }
        }
        DeliveryMode::Fragmented => match frag {
            Fragmentation::PerMessage => messages.iter().map(encode_to_vec).collect(),
            Fragmentation::Chunked(n) => messages
                .iter()
                .flat_map(|msg| {
                    encode_to_vec(msg)
                        .chunks(n.get())
                        .map(<[u8]>::to_vec)
                        .collect::<Vec<_>>()
                })
                .collect(),
        },
    }
}

/// Push `messages` onto `writer` using `mode`.
///
/// `stats` is updated after every successful write so a caller that
/// aborts mid-delivery still knows how far it got.
pub async fn deliver<W>(
    writer: &mut W,
    messages: &[Message],
    mode: DeliveryMode,
    frag: Fragmentation,
    pacing: &Pacing,
    stats: &mut DeliveryStats,
) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let writes = segments(messages, mode, frag);
    let ends: Vec<usize> = messages
        .iter()
        .scan(0, |end, msg| {
            *end += msg.wire_len();
            Some(*end)
        })
        .collect();
    let mut written = 0;

    for (i, chunk) in writes.iter().enumerate() {
        if i > 0 && mode == DeliveryMode::Fragmented {
            pacing.delay.pause(pacing.interval).await;
        }

        let sent = stats.bytes_sent;
        writer
            .write_all(chunk)
            .await
            .map_err(|source| SessionError::Transmit { sent, source })?;
        writer
            .flush()
            .await
            .map_err(|source| SessionError::Transmit { sent, source })?;

        written += chunk.len();
        stats.bytes_sent += chunk.len();
        stats.writes += 1;
        stats.messages_sent = ends.iter().take_while(|&&end| end <= written).count();
        stats.write_sizes.push(chunk.len());
        debug!(write = i + 1, of = writes.len(), bytes = chunk.len(), "sent");
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// Order plans
// -----------------------------------------------------------------------------

/// The logical messages one session sends, independent of delivery mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderPlan {
    messages: Vec<Message>,
}

impl OrderPlan {
    pub const BATCH_BASE_ID: u64 = 5000;
    pub const BATCH_COUNT: usize = 3;
    pub const BATCH_PRICE: u64 = 100000;
    pub const SINGLE_ORDER_ID: u64 = 1001;
    pub const SINGLE_PRICE: u64 = 100050;
    pub const QUANTITY: u32 = 10;

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// `count` limit bids with consecutive ids starting at `base_id`.
    ///
    /// `None` if the last id would not fit in a `u64`.
    pub fn batch(base_id: u64, count: usize, price: u64, quantity: u32) -> Option<Self> {
        if count > 0 {
            base_id.checked_add(u64::try_from(count - 1).ok()?)?;
        }
        let messages = (0..count as u64)
            .map(|i| Message::limit_order(base_id + i, price, quantity, Side::Bid))
            .collect();
        Some(Self { messages })
    }

    /// One limit bid followed by a cancel of the same id.
    pub fn new_then_cancel(order_id: u64, price: u64, quantity: u32) -> Self {
        Self {
            messages: vec![
                Message::limit_order(order_id, price, quantity, Side::Bid),
                Message::cancel(order_id),
            ],
        }
    }

    /// The classic plan for each mode: three batched orders, or order + cancel.
    pub fn default_for(mode: DeliveryMode) -> Self {
        match mode {
            DeliveryMode::Coalesced => OrderPlan::batch(
                Self::BATCH_BASE_ID,
                Self::BATCH_COUNT,
                Self::BATCH_PRICE,
                Self::QUANTITY,
            )
            .unwrap_or_default(),
            DeliveryMode::Fragmented => {
                OrderPlan::new_then_cancel(Self::SINGLE_ORDER_ID, Self::SINGLE_PRICE, Self::QUANTITY)
            }
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn wire_len(&self) -> usize {
        self.messages.iter().map(Message::wire_len).sum()
    }

    /// Number of distinct order ids the plan touches.
    pub fn distinct_order_ids(&self) -> usize {
        let mut ids: Vec<u64> = self.messages.iter().filter_map(Message::order_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// Same plan with every order id shifted by `offset`.
    ///
    /// Lets concurrent sessions send equivalent content without colliding ids.
    /// `None` if any shifted id would overflow.
    pub fn offset_ids(&self, offset: u64) -> Option<Self> {
        let messages = self
            .messages
            .iter()
            .map(|msg| match *msg {
                Message::NewOrder(mut n) => {
                    n.order_id = n.order_id.checked_add(offset)?;
                    Some(Message::NewOrder(n))
                }
                Message::CancelOrder(mut c) => {
                    c.order_id = c.order_id.checked_add(offset)?;
                    Some(Message::CancelOrder(c))
                }
                other => Some(other),
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { messages })
    }
}
