//! Reference TCP server for the order-entry harness.

use anyhow::Result;
use harness_server::config::Config;
use harness_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    info!(
        bind = %config.bind_addr,
        port = config.port,
        max_clients = config.max_clients,
        acks = config.send_acks,
        keep_records = config.keep_records,
        "starting harness-server"
    );

    server::run(config).await
}
