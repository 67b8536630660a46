//! Shared types for the reference server.
//!
//! This module defines:
//! - `ClientId`: the id handed out in each login response
//! - `ConnectionRecord`: everything observed on one connection
//! - `ServerState`: the id allocator plus the per-client record registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use harness_protocol::Message;
use tokio::sync::{mpsc, Notify, RwLock};

/// Identifier for a connected client.
///
/// Unique over the lifetime of one `ServerState`; starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

/// What the server saw on one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Messages reassembled from the client's bytes, in arrival order.
    pub messages: Vec<Message>,

    /// Number of non-empty reads that delivered those bytes.
    pub reads: usize,

    /// Total bytes received from the client.
    pub bytes: usize,

    /// Set once the connection has been torn down.
    pub closed: bool,

    /// Why the server dropped the client, if it did.
    pub error: Option<String>,
}

/// Registry of clients → what they sent.
pub type ClientRegistry = Arc<RwLock<HashMap<ClientId, ConnectionRecord>>>;

/// Per-client outbound queue feeding the writer task.
pub type OutboundTx = mpsc::UnboundedSender<Message>;
pub type OutboundRx = mpsc::UnboundedReceiver<Message>;

/// State shared by the accept loop and every client task.
#[derive(Debug, Clone)]
pub struct ServerState {
    next_id: Arc<AtomicU32>,
    clients: ClientRegistry,
    changed: Arc<Notify>,
    pub max_clients: usize,
    pub send_acks: bool,
    /// Keep records of closed connections for inspection.
    pub keep_closed: bool,
}

impl ServerState {
    pub fn new(max_clients: usize, send_acks: bool) -> Self {
        Self {
            next_id: Arc::new(AtomicU32::new(1)),
            clients: Arc::new(RwLock::new(HashMap::new())),
            changed: Arc::new(Notify::new()),
            max_clients,
            send_acks,
            keep_closed: true,
        }
    }

    pub(crate) fn next_client_id(&self) -> ClientId {
        ClientId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of connections that are still open.
    pub async fn active_clients(&self) -> usize {
        let guard = self.clients.read().await;
        guard.values().filter(|r| !r.closed).count()
    }

    /// Drop each record as soon as its connection closes.
    ///
    /// For a long-running server where nobody inspects the records.
    pub fn forget_closed(mut self) -> Self {
        self.keep_closed = false;
        self
    }

    /// Reserve a slot for a new connection, or `None` if the server is full.
    ///
    /// Checking and registering happen under one lock, so connections
    /// accepted back-to-back cannot both slip past `max_clients`.
    pub(crate) async fn admit(&self) -> Option<ClientId> {
        let mut guard = self.clients.write().await;
        if guard.values().filter(|r| !r.closed).count() >= self.max_clients {
            return None;
        }
        let id = self.next_client_id();
        guard.insert(id, ConnectionRecord::default());
        Some(id)
    }

    pub(crate) async fn record_read(&self, id: ClientId, bytes: usize, msgs: &[Message]) {
        {
            let mut guard = self.clients.write().await;
            let rec = guard.entry(id).or_default();
            rec.reads += 1;
            rec.bytes += bytes;
            rec.messages.extend_from_slice(msgs);
        }
        self.changed.notify_waiters();
    }

    pub(crate) async fn close(&self, id: ClientId, error: Option<String>) {
        {
            let mut guard = self.clients.write().await;
            if self.keep_closed {
                let rec = guard.entry(id).or_default();
                rec.closed = true;
                rec.error = error;
            } else {
                guard.remove(&id);
            }
        }
        self.changed.notify_waiters();
    }

    /// Snapshot of one client's record.
    pub async fn record(&self, id: ClientId) -> Option<ConnectionRecord> {
        let guard = self.clients.read().await;
        guard.get(&id).cloned()
    }

    /// Snapshot of every record, ordered by client id.
    pub async fn records(&self) -> Vec<(ClientId, ConnectionRecord)> {
        let guard = self.clients.read().await;
        let mut all: Vec<_> = guard.iter().map(|(id, r)| (*id, r.clone())).collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Wait until client `id` has disconnected and return its record.
    pub async fn wait_closed(&self, id: ClientId) -> ConnectionRecord {
        loop {
            // Register before checking so a close in between is not missed.
            let notified = self.changed.notified();
            if let Some(rec) = self.record(id).await {
                if rec.closed {
                    return rec;
                }
            }
            notified.await;
        }
    }

    /// Wait until `n` clients have connected and all of them disconnected.
    pub async fn wait_all_closed(&self, n: usize) -> Vec<(ClientId, ConnectionRecord)> {
        loop {
            let notified = self.changed.notified();
            let all = self.records().await;
            if all.len() >= n && all.iter().all(|(_, r)| r.closed) {
                return all;
            }
            notified.await;
        }
    }
}
