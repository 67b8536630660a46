//! Conformance harness CLI.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use harness_client::{Config, DeliveryMode, ScenarioRunner, TokioDelay};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "harness")]
#[clap(about = "Send orders to an order-entry server coalesced or fragmented")]
struct Cli {
    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Server host
    #[clap(long)]
    host: Option<String>,

    /// Server port
    #[clap(short, long)]
    port: Option<u16>,

    /// Number of concurrent clients
    #[clap(short = 'n', long)]
    clients: Option<usize>,

    /// Delivery mode
    #[clap(short, long, value_enum)]
    mode: Option<DeliveryMode>,

    /// Split each fragmented message into writes of this many bytes
    #[clap(long)]
    chunk_size: Option<usize>,

    /// Pause between fragmented writes, in milliseconds
    #[clap(long)]
    pace_ms: Option<u64>,

    /// How long to stay connected after sending, in milliseconds
    #[clap(long)]
    observe_ms: Option<u64>,

    /// First order id
    #[clap(long)]
    order_id: Option<u64>,

    /// Orders per coalesced batch
    #[clap(long)]
    orders: Option<usize>,

    /// Order price in ticks
    #[clap(long)]
    price: Option<u64>,

    /// Order quantity
    #[clap(long)]
    quantity: Option<u32>,

    /// Send the messages in this script instead of the built-in plan
    #[clap(short, long)]
    script: Option<PathBuf>,

    /// Print the report as JSON
    #[clap(long)]
    json: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(clients) = self.clients {
            config.clients = clients;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if self.chunk_size.is_some() {
            config.chunk_size = self.chunk_size;
        }
        if let Some(pace) = self.pace_ms {
            config.pace_ms = pace;
        }
        if let Some(observe) = self.observe_ms {
            config.observe_ms = observe;
        }
        if self.order_id.is_some() {
            config.order_id = self.order_id;
        }
        if let Some(orders) = self.orders {
            config.orders = orders;
        }
        if self.price.is_some() {
            config.price = self.price;
        }
        if let Some(quantity) = self.quantity {
            config.quantity = quantity;
        }
        if self.script.is_some() {
            config.script = self.script;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    let json = cli.json;
    cli.apply(&mut config);

    let specs = config.session_specs()?;
    info!(
        addr = %config.socket_addr_string(),
        clients = config.clients,
        mode = ?config.mode,
        "harness configured"
    );

    let runner = ScenarioRunner::new(config.settings(), Arc::new(TokioDelay));
    let shutdown = runner.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, closing sessions");
            shutdown.send_replace(true);
        }
    });

    let report = runner.run(specs).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if !report.all_succeeded() {
        bail!("{} of {} sessions failed", report.failed(), report.sessions.len());
    }
    Ok(())
}
