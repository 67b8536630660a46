//! harness-client
//!
//! Drives N simulated clients against an order-entry server. Every
//! session waits for the server's login response, then sends its orders
//! either coalesced into one write or fragmented into paced writes, so a
//! server's stream framing can be checked against both.

pub mod config;
pub mod delay;
pub mod driver;
pub mod error;
pub mod handshake;
pub mod runner;
pub mod session;

pub use config::{Config, ConfigError};
pub use delay::{Delay, NoDelay, RecordingDelay, TokioDelay};
pub use driver::{deliver, DeliveryMode, DeliveryStats, Fragmentation, OrderPlan, Pacing};
pub use error::{HandshakeError, SessionError};
pub use handshake::{perform_handshake, SessionState};
pub use runner::{ScenarioReport, ScenarioRunner};
pub use session::{run_session, ClientSession, SessionReport, SessionSettings, SessionSpec};
