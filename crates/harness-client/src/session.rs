//! One simulated client.
//!
//! connect → handshake → deliver → observe → close, strictly in that
//! order. Any error closes the session and is recorded in its report;
//! nothing is retried and nothing escapes to sibling sessions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use harness_protocol::{format_message, Direction, Message, StreamDecoder};
use serde::{Serialize, Serializer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn, Instrument};

use crate::delay::Delay;
use crate::driver::{deliver, DeliveryMode, DeliveryStats, Fragmentation, OrderPlan, Pacing};
use crate::error::SessionError;
use crate::handshake::{perform_handshake, SessionState};

/// What one session should do.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub name: String,
    pub plan: OrderPlan,
    pub mode: DeliveryMode,
    pub fragmentation: Fragmentation,
}

/// Where and how long, shared by every session of a run.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// `host:port`
    pub addr: String,
    pub connect_timeout: Duration,
    /// Gap between fragmented writes.
    pub pace: Duration,
    /// How long to keep reading after the last send.
    pub observe: Duration,
}

/// Outcome of one session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub name: String,
    pub mode: DeliveryMode,
    pub client_id: Option<u32>,
    pub final_state: SessionState,
    #[serde(flatten)]
    pub delivery: DeliveryStats,
    /// Server → client messages seen during the observation window.
    #[serde(serialize_with = "serialize_messages")]
    pub received: Vec<Message>,
    pub error_kind: Option<&'static str>,
    pub error: Option<String>,
}

impl SessionReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Report for a session that never got to run its own logic.
    pub fn failed(spec: &SessionSpec, err: &SessionError) -> Self {
        SessionReport {
            name: spec.name.clone(),
            mode: spec.mode,
            client_id: None,
            final_state: SessionState::Closed,
            delivery: DeliveryStats::default(),
            received: Vec::new(),
            error_kind: Some(err.kind()),
            error: Some(err.to_string()),
        }
    }
}

fn serialize_messages<S: Serializer>(msgs: &[Message], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(msgs.iter().map(format_message))
}

/// A live connection plus what has happened on it so far.
pub struct ClientSession<S> {
    name: String,
    stream: S,
    state: SessionState,
    client_id: Option<u32>,
    delivery: DeliveryStats,
    received: Vec<Message>,
    shutdown: watch::Receiver<bool>,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream.
    pub fn new(name: impl Into<String>, stream: S, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            name: name.into(),
            stream,
            state: SessionState::Connected,
            client_id: None,
            delivery: DeliveryStats::default(),
            received: Vec::new(),
            shutdown,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "state");
        self.state = next;
    }

    /// Receive and validate the login response.
    pub async fn handshake(&mut self) -> Result<u32, SessionError> {
        self.transition(SessionState::AwaitingHandshake);
        let res = abortable(&mut self.shutdown, perform_handshake(&mut self.stream)).await;

        match res {
            Ok(client_id) => {
                self.client_id = Some(client_id);
                self.transition(SessionState::Ready);
                info!(client_id, "logged in");
                Ok(client_id)
            }
            Err(e) => {
                self.transition(SessionState::Closed);
                Err(e)
            }
        }
    }

    /// Send the plan using the given delivery mode.
    pub async fn send(
        &mut self,
        plan: &OrderPlan,
        mode: DeliveryMode,
        frag: Fragmentation,
        pacing: &Pacing,
    ) -> Result<(), SessionError> {
        self.transition(SessionState::Sending);

        let res = abortable(
            &mut self.shutdown,
            deliver(&mut self.stream, plan.messages(), mode, frag, pacing, &mut self.delivery),
        )
        .await;

        match &res {
            Ok(()) => info!(
                bytes = self.delivery.bytes_sent,
                writes = self.delivery.writes,
                messages = self.delivery.messages_sent,
                "sent"
            ),
            Err(_) => self.transition(SessionState::Closed),
        }
        res
    }

    /// Keep the connection open for `window`, decoding anything the server sends.
    ///
    /// Ends early if the server closes the connection.
    pub async fn observe(&mut self, window: Duration, delay: &dyn Delay) -> Result<(), SessionError> {
        let reading = read_until_closed(&mut self.stream, &mut self.received);

        let observed = async {
            tokio::select! {
                biased;
                _ = delay.pause(window) => Ok(()),
                res = reading => res,
            }
        };

        abortable(&mut self.shutdown, observed).await
    }

    /// Close the transport. Always ends in `Closed`.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(error = %e, "shutdown");
        }
        if self.state != SessionState::Closed {
            self.transition(SessionState::Closed);
        }
    }

    /// Handshake, deliver, observe, close; never returns an error.
    pub async fn run(
        mut self,
        spec: &SessionSpec,
        pacing: &Pacing,
        observe: Duration,
    ) -> SessionReport {
        let outcome = self.run_steps(spec, pacing, observe).await;
        self.close().await;

        if let Err(e) = &outcome {
            warn!(error = %e, kind = e.kind(), "session failed");
        } else {
            info!("disconnected");
        }

        SessionReport {
            name: self.name,
            mode: spec.mode,
            client_id: self.client_id,
            final_state: self.state,
            delivery: self.delivery,
            received: self.received,
            error_kind: outcome.as_ref().err().map(SessionError::kind),
            error: outcome.err().map(|e| e.to_string()),
        }
    }

    async fn run_steps(
        &mut self,
        spec: &SessionSpec,
        pacing: &Pacing,
        observe: Duration,
    ) -> Result<(), SessionError> {
        self.handshake().await?;
        self.send(&spec.plan, spec.mode, spec.fragmentation, pacing).await?;
        self.observe(observe, pacing.delay.as_ref()).await
    }
}

/// Decode server messages into `received` until the server hangs up.
async fn read_until_closed<R>(stream: &mut R, received: &mut Vec<Message>) -> Result<(), SessionError>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = StreamDecoder::for_direction(Direction::ServerToClient);
    let mut buf = [0u8; 1024];

    loop {
        let n = stream.read(&mut buf).await.map_err(SessionError::Receive)?;
        if n == 0 {
            debug!("server closed during observation");
            return Ok(());
        }
        for msg in decoder.push(&buf[..n])? {
            info!(msg = %format_message(&msg), "received");
            received.push(msg);
        }
    }
}

/// Open the transport for one session.
pub async fn connect(addr: &str, limit: Duration) -> Result<TcpStream, SessionError> {
    let res = timeout(limit, TcpStream::connect(addr)).await.unwrap_or_else(|_| {
        Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "connect timed out",
        ))
    });

    let stream = res.map_err(|source| SessionError::Connection {
        addr: addr.to_string(),
        source,
    })?;
    stream.set_nodelay(true).map_err(|source| SessionError::Connection {
        addr: addr.to_string(),
        source,
    })?;
    Ok(stream)
}

/// Run one full session against a TCP server.
pub async fn run_session(
    spec: SessionSpec,
    settings: SessionSettings,
    delay: Arc<dyn Delay>,
    mut shutdown: watch::Receiver<bool>,
) -> SessionReport {
    let span = tracing::info_span!("session", name = %spec.name);

    async move {
        let pacing = Pacing {
            delay,
            interval: settings.pace,
        };

        let stream = match abortable(
            &mut shutdown,
            connect(&settings.addr, settings.connect_timeout),
        )
        .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "session failed");
                return SessionReport::failed(&spec, &e);
            }
        };
        debug!(addr = %settings.addr, "connected");

        ClientSession::new(spec.name.clone(), stream, shutdown)
            .run(&spec, &pacing, settings.observe)
            .await
    }
    .instrument(span)
    .await
}

/// Race `fut` against the shutdown signal.
///
/// Dropping `fut` on abort releases whatever it was blocked on. A dropped
/// sender means nobody can ask for a stop, so it never aborts.
async fn abortable<T, E, F>(shutdown: &mut watch::Receiver<bool>, fut: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<SessionError>,
{
    if *shutdown.borrow() {
        return Err(SessionError::Aborted);
    }

    let stopped = async {
        let signalled = shutdown.wait_for(|stop| *stop).await.is_ok();
        if !signalled {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        res = fut => res.map_err(Into::into),
        _ = stopped => Err(SessionError::Aborted),
    }
}
