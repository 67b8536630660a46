// crates/harness-server/src/client.rs

use std::collections::HashMap;

use anyhow::Result;
use harness_protocol::{
    encode_to_vec, Direction, ExecType, ExecutionReport, Message, NewOrder, RejectReason, Side,
    StreamDecoder,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, WriteHalf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::types::{ClientId, OutboundRx, OutboundTx, ServerState};

/// Run the server side of one connection.
///
/// Pushes the login response first, then reassembles whatever the client
/// sends into messages until it disconnects or sends something malformed.
/// Acks go out through a separate writer task so a client that is busy
/// writing never stalls the reader.
pub async fn run_client<S>(client_id: ClientId, mut stream: S, state: ServerState) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let login = encode_to_vec(&Message::login(client_id.0));
    if let Err(e) = stream.write_all(&login).await {
        state.close(client_id, Some(e.to_string())).await;
        return Err(e.into());
    }

    // Split stream
    let (mut read_half, write_half) = tokio::io::split(stream);
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let _writer_handle = tokio::spawn(write_loop(client_id, write_half, out_rx));

    let result = read_loop(client_id, &mut read_half, &state, out_tx).await;
    let error = result.as_ref().err().map(|e| e.to_string());
    state.close(client_id, error).await;
    result
}

/// Writer task: drain queued acks onto the socket until the reader is done.
async fn write_loop<S>(client_id: ClientId, mut write_half: WriteHalf<S>, mut out_rx: OutboundRx)
where
    S: AsyncWrite,
{
    while let Some(msg) = out_rx.recv().await {
        if let Err(e) = write_half.write_all(&encode_to_vec(&msg)).await {
            debug!(client = client_id.0, error = %e, "ack write failed, dropping the rest");
            break;
        }
    }
}

async fn read_loop<R>(
    client_id: ClientId,
    stream: &mut R,
    state: &ServerState,
    out_tx: OutboundTx,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = StreamDecoder::for_direction(Direction::ClientToServer);
    let mut open_orders: HashMap<u64, NewOrder> = HashMap::new();
    let mut temp_buf = [0u8; 4096];

    loop {
        let n = stream.read(&mut temp_buf).await?;
        if n == 0 {
            // EOF - client disconnected
            if decoder.buffered() > 0 {
                warn!(
                    client = client_id.0,
                    pending = decoder.buffered(),
                    "client closed mid-message"
                );
            }
            info!(client = client_id.0, "client disconnected");
            return Ok(());
        }

        // Drain as many full messages as the buffer now holds.
        let msgs = match decoder.push(&temp_buf[..n]) {
            Ok(msgs) => msgs,
            Err(e) => {
                warn!(client = client_id.0, error = %e, "bad client data, closing");
                return Err(e.into());
            }
        };

        debug!(client = client_id.0, bytes = n, messages = msgs.len(), "read");
        state.record_read(client_id, n, &msgs).await;

        if state.send_acks {
            for ack in msgs.iter().filter_map(|m| acknowledge(client_id, m, &mut open_orders)) {
                // A closed writer only means the client stopped listening.
                let _ = out_tx.send(ack);
            }
        }
    }
}

/// Receipt acknowledgement for one client message.
///
/// No matching happens here; a new order is reported as accepted and a
/// cancel succeeds only for an id this connection previously sent.
fn acknowledge(
    client_id: ClientId,
    msg: &Message,
    open_orders: &mut HashMap<u64, NewOrder>,
) -> Option<Message> {
    let report = match msg {
        Message::NewOrder(n) => {
            open_orders.insert(n.order_id, *n);
            ExecutionReport {
                client_id: client_id.0,
                order_id: n.order_id,
                price: n.price,
                last_quantity: 0,
                remaining_quantity: n.quantity,
                exec_type: ExecType::New,
                reason: RejectReason::None,
                side: n.side,
            }
        }
        Message::CancelOrder(c) => match open_orders.remove(&c.order_id) {
            Some(n) => ExecutionReport {
                client_id: client_id.0,
                order_id: c.order_id,
                price: 0,
                last_quantity: 0,
                remaining_quantity: 0,
                exec_type: ExecType::Canceled,
                reason: RejectReason::None,
                side: n.side,
            },
            None => ExecutionReport {
                client_id: client_id.0,
                order_id: c.order_id,
                price: 0,
                last_quantity: 0,
                remaining_quantity: 0,
                exec_type: ExecType::Rejected,
                reason: RejectReason::OrderNotFound,
                side: Side::Bid,
            },
        },
        _ => return None,
    };
    Some(Message::ExecutionReport(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use harness_protocol::{decode_all, decode_exact, encode_all, LOGIN_RESPONSE_LEN};
    use tokio::io::duplex;

    #[tokio::test]
    async fn sends_login_then_records_fragmented_bytes() {
        let state = ServerState::new(8, false);
        let (client, server) = duplex(1024);
        let task = tokio::spawn(run_client(ClientId(7), server, state.clone()));

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut login = [0u8; LOGIN_RESPONSE_LEN];
        rd.read_exact(&mut login).await.unwrap();
        assert_eq!(login, [5, 0, 0, 0, 7]);

        let bytes = encode_to_vec(&Message::limit_order(1001, 100050, 10, Side::Bid));
        wr.write_all(&bytes[..10]).await.unwrap();
        wr.flush().await.unwrap();
        tokio::task::yield_now().await;
        wr.write_all(&bytes[10..]).await.unwrap();
        wr.write_all(&encode_to_vec(&Message::cancel(1001))).await.unwrap();
        wr.shutdown().await.unwrap();
        drop(wr);
        drop(rd);

        task.await.unwrap().unwrap();
        let rec = state.wait_closed(ClientId(7)).await;
        assert_eq!(
            rec.messages,
            vec![
                Message::limit_order(1001, 100050, 10, Side::Bid),
                Message::cancel(1001)
            ]
        );
        assert_eq!(rec.bytes, 33);
        assert!(rec.error.is_none());
    }

    #[tokio::test]
    async fn acks_new_and_cancel() {
        let state = ServerState::new(8, true);
        let (client, server) = duplex(1024);
        let task = tokio::spawn(run_client(ClientId(2), server, state.clone()));

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut login = [0u8; LOGIN_RESPONSE_LEN];
        rd.read_exact(&mut login).await.unwrap();

        let msgs = [
            Message::limit_order(1, 100, 5, Side::Ask),
            Message::cancel(1),
            Message::cancel(99),
        ];
        wr.write_all(&encode_all(&msgs)).await.unwrap();

        let mut acks = [0u8; 96];
        rd.read_exact(&mut acks).await.unwrap();
        let acks = decode_all(&acks).unwrap();
        let kinds: Vec<(ExecType, RejectReason)> = acks
            .iter()
            .map(|m| match m {
                Message::ExecutionReport(e) => (e.exec_type, e.reason),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ExecType::New, RejectReason::None),
                (ExecType::Canceled, RejectReason::None),
                (ExecType::Rejected, RejectReason::OrderNotFound),
            ]
        );

        drop(wr);
        drop(rd);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reading_continues_while_client_ignores_acks() {
        let state = ServerState::new(8, true);
        // Small pipe: acks back up almost at once if the client never reads.
        let (client, server) = duplex(64);
        let task = tokio::spawn(run_client(ClientId(4), server, state.clone()));

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut login = [0u8; LOGIN_RESPONSE_LEN];
        rd.read_exact(&mut login).await.unwrap();

        let orders: Vec<Message> = (0..500)
            .map(|id| Message::limit_order(id, 100, 1, Side::Bid))
            .collect();
        let wrote = tokio::time::timeout(Duration::from_secs(10), async {
            wr.write_all(&encode_all(&orders)).await.unwrap();
            wr.shutdown().await.unwrap();
        })
        .await;
        assert!(wrote.is_ok(), "server stopped reading while acks were pending");

        let rec = state.wait_closed(ClientId(4)).await;
        assert_eq!(rec.messages, orders);
        assert_eq!(rec.bytes, 500 * 24);

        // The first acks are still there for a late reader.
        let mut first = [0u8; 32];
        rd.read_exact(&mut first).await.unwrap();
        assert!(matches!(
            decode_exact(&first).unwrap(),
            Message::ExecutionReport(ExecutionReport { order_id: 0, .. })
        ));

        drop(wr);
        drop(rd);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn server_bound_tag_from_client_is_rejected() {
        let state = ServerState::new(8, false);
        let (client, server) = duplex(1024);
        let task = tokio::spawn(run_client(ClientId(3), server, state.clone()));

        let (mut rd, mut wr) = tokio::io::split(client);
        let mut login = [0u8; LOGIN_RESPONSE_LEN];
        rd.read_exact(&mut login).await.unwrap();
        wr.write_all(&encode_to_vec(&Message::login(1))).await.unwrap();

        assert!(task.await.unwrap().is_err());
        let rec = state.wait_closed(ClientId(3)).await;
        assert!(rec.error.is_some());
        assert!(rec.messages.is_empty());
    }
}
