//! harness-server
//!
//! Reference loopback server for the order-entry protocol. It speaks the
//! server side of the handshake and reassembles client bytes into
//! messages, recording them per client so tests can compare what arrived
//! under different delivery disciplines. It does no matching.

pub mod config;
pub mod types;
pub mod server;

// internal module, not re-exported
mod client;

pub use config::Config;
pub use types::{ClientId, ConnectionRecord, ServerState};
