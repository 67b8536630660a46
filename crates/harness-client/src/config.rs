//! Configuration for a harness run.
//!
//! Layering, lowest precedence first:
//! 1. built-in defaults
//! 2. an optional TOML file (`--config harness.toml`)
//! 3. environment variables
//! 4. command-line flags (applied by the binary)
//!
//! Environment variables:
//!
//! - `HARNESS_HOST`       (default: "127.0.0.1")
//! - `HARNESS_PORT`       (default: "12345")
//! - `HARNESS_CLIENTS`    (default: "1")
//! - `HARNESS_MODE`       (default: "fragmented")
//! - `HARNESS_CHUNK_SIZE` (default: unset, one write per message)
//! - `HARNESS_PACE_MS`    (default: "1000")
//! - `HARNESS_OBSERVE_MS` (default: "1000")

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use harness_protocol::{parse_script, ScriptError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::driver::{DeliveryMode, Fragmentation, OrderPlan};
use crate::session::{SessionSettings, SessionSpec};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: ScriptError,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server host.
    pub host: String,

    /// Server TCP port.
    pub port: u16,

    /// Number of concurrent client sessions.
    pub clients: usize,

    pub mode: DeliveryMode,

    /// In fragmented mode, split each message into writes of this many
    /// bytes instead of one write per message.
    pub chunk_size: Option<usize>,

    /// Pause between fragmented writes.
    pub pace_ms: u64,

    /// How long to keep the connection open after the last send.
    pub observe_ms: u64,

    /// Give up connecting after this long.
    pub connect_timeout_ms: u64,

    /// First order id; defaults to 5000 (coalesced) or 1001 (fragmented).
    pub order_id: Option<u64>,

    /// Orders per coalesced batch.
    pub orders: usize,

    /// Price in ticks; defaults to 100000 (coalesced) or 100050 (fragmented).
    pub price: Option<u64>,

    pub quantity: u32,

    /// Script of messages to send instead of the built-in plan.
    pub script: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 12345,
            clients: 1,
            mode: DeliveryMode::Fragmented,
            chunk_size: None,
            pace_ms: 1000,
            observe_ms: 1000,
            connect_timeout_ms: 5000,
            order_id: None,
            orders: OrderPlan::BATCH_COUNT,
            price: None,
            quantity: OrderPlan::QUANTITY,
            script: None,
        }
    }
}

impl Config {
    /// Defaults, overlaid with environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// File (if given) or defaults, overlaid with environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_toml_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Config::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("HARNESS_HOST") {
            self.host = host;
        }
        override_from_env("HARNESS_PORT", &mut self.port)?;
        override_from_env("HARNESS_CLIENTS", &mut self.clients)?;
        override_from_env("HARNESS_MODE", &mut self.mode)?;
        override_from_env("HARNESS_PACE_MS", &mut self.pace_ms)?;
        override_from_env("HARNESS_OBSERVE_MS", &mut self.observe_ms)?;

        let mut chunk = 0usize;
        if override_from_env("HARNESS_CHUNK_SIZE", &mut chunk)? {
            self.chunk_size = Some(chunk);
        }
        Ok(())
    }

    /// Convenience: `host:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fragmentation(&self) -> Fragmentation {
        Fragmentation::from_chunk_size(self.chunk_size)
    }

    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            addr: self.socket_addr_string(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            pace: Duration::from_millis(self.pace_ms),
            observe: Duration::from_millis(self.observe_ms),
        }
    }

    /// The plan one session sends, before per-session id offsets.
    pub fn base_plan(&self) -> Result<OrderPlan, ConfigError> {
        if let Some(path) = &self.script {
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
            let msgs = parse_script(&text).map_err(|source| ConfigError::Script {
                path: path.clone(),
                source,
            })?;
            return Ok(OrderPlan::from_messages(msgs));
        }

        Ok(match self.mode {
            DeliveryMode::Coalesced => OrderPlan::batch(
                self.order_id.unwrap_or(OrderPlan::BATCH_BASE_ID),
                self.orders,
                self.price.unwrap_or(OrderPlan::BATCH_PRICE),
                self.quantity,
            )
            .ok_or_else(id_overflow)?,
            DeliveryMode::Fragmented => OrderPlan::new_then_cancel(
                self.order_id.unwrap_or(OrderPlan::SINGLE_ORDER_ID),
                self.price.unwrap_or(OrderPlan::SINGLE_PRICE),
                self.quantity,
            ),
        })
    }

    /// One `SessionSpec` per client.
    ///
    /// Built-in plans are shifted so sessions never share an order id;
    /// a script is sent verbatim by every session.
    pub fn session_specs(&self) -> Result<Vec<SessionSpec>, ConfigError> {
        if self.clients == 0 {
            return Err(ConfigError::Invalid("clients must be at least 1".into()));
        }

        let plan = self.base_plan()?;
        if plan.is_empty() {
            return Err(ConfigError::Invalid("nothing to send".into()));
        }

        let stride = if self.script.is_some() {
            0
        } else {
            plan.distinct_order_ids() as u64
        };

        (0..self.clients)
            .map(|i| {
                let plan = stride
                    .checked_mul(i as u64)
                    .and_then(|offset| plan.offset_ids(offset))
                    .ok_or_else(id_overflow)?;
                Ok(SessionSpec {
                    name: session_name(i),
                    plan,
                    mode: self.mode,
                    fragmentation: self.fragmentation(),
                })
            })
            .collect()
    }
}

fn id_overflow() -> ConfigError {
    ConfigError::Invalid("order ids run past u64::MAX; lower --order-id, --orders or --clients".into())
}

/// `Trader-A`, `Trader-B`, ... then `Trader-26`, `Trader-27`, ...
pub fn session_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => format!("Trader-{}", (b'A' + i) as char),
        _ => format!("Trader-{}", index),
    }
}

/// Overwrite `slot` if `key` is set; returns whether it was.
fn override_from_env<T: FromStr>(key: &'static str, slot: &mut T) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => {
            *slot = value
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnv { key, value })?;
            Ok(true)
        }
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness_protocol::Message;

    #[test]
    fn defaults_target_local_server() {
        let c = Config::default();
        assert_eq!(c.socket_addr_string(), "127.0.0.1:12345");
        assert_eq!(c.settings().pace, Duration::from_secs(1));
    }

    #[test]
    fn toml_overrides_selected_fields() {
        let c = Config::from_toml_str(
            r#"
            port = 9100
            clients = 4
            mode = "coalesced"
            chunk_size = 3
            "#,
        )
        .unwrap();
        assert_eq!(c.port, 9100);
        assert_eq!(c.clients, 4);
        assert_eq!(c.mode, DeliveryMode::Coalesced);
        assert_eq!(c.host, "127.0.0.1");
        assert_eq!(c.fragmentation(), Fragmentation::from_chunk_size(Some(3)));
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(matches!(
            Config::from_toml_str("mode = \"sideways\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn mode_defaults_pick_classic_plans() {
        let mut c = Config::default();
        c.mode = DeliveryMode::Coalesced;
        let plan = c.base_plan().unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.messages()[0].order_id(), Some(5000));

        c.mode = DeliveryMode::Fragmented;
        let plan = c.base_plan().unwrap();
        assert_eq!(plan.messages()[1], Message::cancel(1001));
    }

    #[test]
    fn sessions_get_disjoint_ids() {
        let c = Config {
            clients: 3,
            mode: DeliveryMode::Coalesced,
            ..Config::default()
        };
        let specs = c.session_specs().unwrap();
        let firsts: Vec<Option<u64>> = specs.iter().map(|s| s.plan.messages()[0].order_id()).collect();
        assert_eq!(firsts, vec![Some(5000), Some(5003), Some(5006)]);
        assert_eq!(specs[2].name, "Trader-C");
    }

    #[test]
    fn zero_clients_rejected() {
        let c = Config {
            clients: 0,
            ..Config::default()
        };
        assert!(matches!(c.session_specs(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn order_id_overflow_is_a_config_error() {
        let c = Config {
            clients: 2,
            order_id: Some(u64::MAX),
            mode: DeliveryMode::Fragmented,
            ..Config::default()
        };
        assert!(matches!(c.session_specs(), Err(ConfigError::Invalid(_))));

        let c = Config {
            order_id: Some(u64::MAX),
            orders: 2,
            mode: DeliveryMode::Coalesced,
            ..Config::default()
        };
        assert!(matches!(c.base_plan(), Err(ConfigError::Invalid(_))));

        // The last representable id is still fine for a single session.
        let c = Config {
            order_id: Some(u64::MAX),
            mode: DeliveryMode::Fragmented,
            ..Config::default()
        };
        assert_eq!(c.session_specs().unwrap().len(), 1);
    }

    #[test]
    fn session_names() {
        assert_eq!(session_name(0), "Trader-A");
        assert_eq!(session_name(25), "Trader-Z");
        assert_eq!(session_name(26), "Trader-26");
    }
}
