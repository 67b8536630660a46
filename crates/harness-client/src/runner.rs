//! Scenario runner: N independent sessions at once.
//!
//! Each session runs in its own task. A failure (or even a panic) in one
//! is recorded in that session's report and never stops the others.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::delay::Delay;
use crate::error::SessionError;
use crate::session::{run_session, SessionReport, SessionSettings, SessionSpec};

pub struct ScenarioRunner {
    settings: SessionSettings,
    delay: Arc<dyn Delay>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl ScenarioRunner {
    pub fn new(settings: SessionSettings, delay: Arc<dyn Delay>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            settings,
            delay,
            shutdown: Arc::new(shutdown),
        }
    }

    /// Handle that aborts every running session when `send(true)` is called on it.
    pub fn shutdown_handle(&self) -> Arc<watch::Sender<bool>> {
        self.shutdown.clone()
    }

    /// Ask every running session to stop at its next blocking point.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Run every session concurrently and wait for all of them.
    ///
    /// Reports come back in the same order as `specs`.
    pub async fn run(&self, specs: Vec<SessionSpec>) -> ScenarioReport {
        info!(sessions = specs.len(), addr = %self.settings.addr, "starting scenario");

        let handles: Vec<_> = specs
            .iter()
            .cloned()
            .map(|spec| {
                tokio::spawn(run_session(
                    spec,
                    self.settings.clone(),
                    self.delay.clone(),
                    self.shutdown.subscribe(),
                ))
            })
            .collect();

        let sessions = join_all(handles)
            .await
            .into_iter()
            .zip(&specs)
            .map(|(joined, spec)| match joined {
                Ok(report) => report,
                Err(e) => {
                    warn!(session = %spec.name, error = %e, "session task died");
                    SessionReport::failed(spec, &SessionError::Panicked(e.to_string()))
                }
            })
            .collect();

        let report = ScenarioReport { sessions };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            bytes = report.total_bytes(),
            "scenario finished"
        );
        report
    }
}

/// Every session's outcome, in launch order.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub sessions: Vec<SessionReport>,
}

impl ScenarioReport {
    pub fn succeeded(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.sessions.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    pub fn total_bytes(&self) -> usize {
        self.sessions.iter().map(|s| s.delivery.bytes_sent).sum()
    }
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for s in &self.sessions {
            let id = s
                .client_id
                .map_or_else(|| "-".to_string(), |id| id.to_string());
            write!(
                f,
                "{:<10} {:<10} client={:<4} sent={} msgs/{} bytes/{} writes recv={}",
                s.name,
                format!("{:?}", s.mode).to_lowercase(),
                id,
                s.delivery.messages_sent,
                s.delivery.bytes_sent,
                s.delivery.writes,
                s.received.len(),
            )?;
            match &s.error {
                Some(e) => writeln!(f, " FAILED ({}): {}", s.error_kind.unwrap_or("error"), e)?,
                None => writeln!(f, " ok")?,
            }
        }
        write!(
            f,
            "{} of {} sessions succeeded",
            self.succeeded(),
            self.sessions.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DeliveryMode, DeliveryStats, Fragmentation, OrderPlan};
    use crate::handshake::SessionState;
    use crate::NoDelay;
    use std::time::Duration;

    fn settings(addr: String) -> SessionSettings {
        SessionSettings {
            addr,
            connect_timeout: Duration::from_secs(2),
            pace: Duration::ZERO,
            observe: Duration::ZERO,
        }
    }

    fn spec(name: &str) -> SessionSpec {
        SessionSpec {
            name: name.into(),
            plan: OrderPlan::default_for(DeliveryMode::Coalesced),
            mode: DeliveryMode::Coalesced,
            fragmentation: Fragmentation::PerMessage,
        }
    }

    fn report(name: &str, bytes: usize, error: Option<&str>) -> SessionReport {
        SessionReport {
            name: name.into(),
            mode: DeliveryMode::Coalesced,
            client_id: Some(1),
            final_state: SessionState::Closed,
            delivery: DeliveryStats {
                bytes_sent: bytes,
                writes: 1,
                messages_sent: 3,
                write_sizes: vec![bytes],
            },
            received: Vec::new(),
            error_kind: error.map(|_| "transmit"),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn summary_counts() {
        let r = ScenarioReport {
            sessions: vec![
                report("Trader-A", 72, None),
                report("Trader-B", 24, Some("broken pipe")),
            ],
        };
        assert_eq!(r.succeeded(), 1);
        assert_eq!(r.failed(), 1);
        assert!(!r.all_succeeded());
        assert_eq!(r.total_bytes(), 96);

        let text = r.to_string();
        assert!(text.contains("Trader-B"));
        assert!(text.contains("FAILED (transmit): broken pipe"));
        assert!(text.ends_with("1 of 2 sessions succeeded"));
    }

    #[test]
    fn json_report_flattens_delivery() {
        let r = ScenarioReport {
            sessions: vec![report("Trader-A", 72, None)],
        };
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["sessions"][0]["bytes_sent"], 72);
        assert_eq!(v["sessions"][0]["mode"], "coalesced");
        assert_eq!(v["sessions"][0]["final_state"], "closed");
    }

    #[tokio::test]
    async fn unreachable_server_fails_every_session_independently() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let runner = ScenarioRunner::new(settings(addr), Arc::new(NoDelay));
        let r = runner.run(vec![spec("Trader-A"), spec("Trader-B")]).await;

        assert_eq!(r.sessions.len(), 2);
        assert_eq!(r.failed(), 2);
        assert_eq!(r.sessions[0].name, "Trader-A");
        assert_eq!(r.sessions[1].name, "Trader-B");
        assert!(r.sessions.iter().all(|s| s.error_kind == Some("connection")));
    }

    #[tokio::test]
    async fn shutdown_before_start_aborts_everything() {
        let runner = ScenarioRunner::new(settings("127.0.0.1:9".into()), Arc::new(NoDelay));
        runner.shutdown();

        let r = runner.run(vec![spec("Trader-A")]).await;
        assert_eq!(r.sessions[0].error_kind, Some("aborted"));
        assert_eq!(r.sessions[0].delivery.bytes_sent, 0);
    }
}
