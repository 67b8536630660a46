//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Listens on the configured address/port.
//! - Accepts new TCP connections.
//! - Assigns each connection a `ClientId`.
//! - Spawns a per-client task that pushes the login response and then
//!   reassembles the client's bytes (see `client`).

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client;
use crate::config::Config;
use crate::types::ServerState;

/// Run the TCP server with the given configuration.
pub async fn run(config: Config) -> Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!(addr = %listener.local_addr()?, "listening");

    serve(listener, state_for(&config)).await
}

/// Accept loop over an already-bound listener.
pub async fn serve(listener: TcpListener, state: ServerState) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;

        let Some(client_id) = state.admit().await else {
            warn!(
                peer = %peer_addr,
                max_clients = state.max_clients,
                "rejecting connection: max_clients reached"
            );
            // Just drop the stream; client will see the connection closed.
            continue;
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!(client = client_id.0, error = %e, "set_nodelay failed");
        }
        info!(client = client_id.0, peer = %peer_addr, "accepted connection");

        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = client::run_client(client_id, stream, state).await {
                warn!(client = client_id.0, error = %e, "client error");
            }
        });
    }
}

/// Bind per `config` and serve in the background.
///
/// Returns the bound address (useful with port 0), the shared state for
/// inspecting what clients sent, and the accept-loop handle.
pub async fn spawn(config: Config) -> Result<(SocketAddr, ServerState, JoinHandle<Result<()>>)> {
    let listener = TcpListener::bind(config.socket_addr_string()).await?;
    let addr = listener.local_addr()?;
    let state = state_for(&config);
    let handle = tokio::spawn(serve(listener, state.clone()));
    Ok((addr, state, handle))
}

fn state_for(config: &Config) -> ServerState {
    let state = ServerState::new(config.max_clients, config.send_acks);
    if config.keep_records {
        state
    } else {
        state.forget_closed()
    }
}
