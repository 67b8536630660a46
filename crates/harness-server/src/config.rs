//! Configuration for the reference server.
//!
//! Defaults can be overridden via a few environment variables:
//!
//! - `HARNESS_BIND_ADDR`   (default: "127.0.0.1")
//! - `HARNESS_PORT`        (default: "12345")
//! - `HARNESS_MAX_CLIENTS` (default: "1024")
//! - `HARNESS_ACKS`        (default: "true") send an execution report per message
//! - `HARNESS_KEEP_RECORDS` (default: "false") keep what closed clients sent

use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on. `0` picks an ephemeral port.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Acknowledge each received order/cancel with an execution report.
    pub send_acks: bool,

    /// Keep per-client records after disconnect. Off for the long-running
    /// binary so memory stays bounded; on for tests that inspect them.
    pub keep_records: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "127.0.0.1".to_string(),
            port: 12345,
            max_clients: 1024,
            send_acks: true,
            keep_records: false,
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();
        let bind_addr = env::var("HARNESS_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let port = read_env_or_default("HARNESS_PORT", defaults.port)?;
        let max_clients = read_env_or_default("HARNESS_MAX_CLIENTS", defaults.max_clients)?;
        let send_acks = read_env_or_default("HARNESS_ACKS", defaults.send_acks)?;
        let keep_records = read_env_or_default("HARNESS_KEEP_RECORDS", defaults.keep_records)?;

        Ok(Config {
            bind_addr,
            port,
            max_clients,
            send_acks,
            keep_records,
        })
    }

    /// Loopback config on an ephemeral port, for tests.
    pub fn ephemeral() -> Self {
        Config {
            port: 0,
            keep_records: true,
            ..Config::default()
        }
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, val)),
        Err(_) => Ok(default),
    }
}
