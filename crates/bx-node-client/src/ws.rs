use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::warn;

use crate::{NodeConnection, NodeError, NodeTransport};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type PendingMap = StdMutex<HashMap<u64, oneshot::Sender<Result<Value, NodeError>>>>;

/// WebSocket JSON-RPC transport. One connection per dial; requests are
/// id-matched against responses by a single reader task.
pub struct WsTransport;

#[async_trait]
impl NodeTransport for WsTransport {
    async fn connect(&self, endpoint: &str) -> Result<Arc<dyn NodeConnection>, NodeError> {
        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|err| NodeError::Transport(err.to_string()))?;
        let (sink, mut reader) = stream.split();

        let connection = Arc::new(WsConnection {
            sink: Mutex::new(sink),
            pending: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        });

        let reader_side = connection.clone();
        tokio::spawn(async move {
            while let Some(message) = reader.next().await {
                match message {
                    Ok(Message::Text(text)) => reader_side.route_response(&text),
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!("websocket read failed: {err}");
                        break;
                    }
                }
            }
            reader_side.mark_closed();
        });

        Ok(connection)
    }
}

struct WsConnection {
    sink: Mutex<WsSink>,
    pending: PendingMap,
    next_id: AtomicU64,
    closed: AtomicBool,
    close_signal: Notify,
}

impl WsConnection {
    fn route_response(&self, text: &str) {
        let Some((id, outcome)) = parse_response(text) else {
            return;
        };
        let Some(sender) = self.pending.lock().ok().and_then(|mut p| p.remove(&id)) else {
            return;
        };
        let _ = sender.send(outcome);
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Ok(mut pending) = self.pending.lock() {
            for (_, sender) in pending.drain() {
                let _ = sender.send(Err(NodeError::Closed));
            }
        }
        self.close_signal.notify_waiters();
    }
}

/// Split a raw frame into its request id and outcome. Frames without an
/// id are subscription pushes; nothing here subscribes, so they are
/// dropped, as are unparseable frames.
fn parse_response(text: &str) -> Option<(u64, Result<Value, NodeError>)> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(err) => {
            warn!("discarding unparseable frame: {err}");
            return None;
        }
    };
    let id = value.get("id").and_then(Value::as_u64)?;

    let outcome = if let Some(error) = value.get("error") {
        Err(NodeError::Rpc {
            code: error.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_owned(),
        })
    } else {
        Ok(value.get("result").cloned().unwrap_or(Value::Null))
    };
    Some((id, outcome))
}

#[async_trait]
impl NodeConnection for WsConnection {
    async fn request(&self, method: &str, params: Value) -> Result<Value, NodeError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(NodeError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let (sender, receiver) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, sender);
        }

        let sent = {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(payload.to_string())).await
        };
        if let Err(err) = sent {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(NodeError::Transport(err.to_string()));
        }

        receiver.await.unwrap_or(Err(NodeError::Closed))
    }

    async fn wait_closed(&self) {
        loop {
            let notified = self.close_signal.notified();
            if self.closed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(err) = sink.close().await {
            warn!("websocket close failed: {err}");
        }
        drop(sink);
        self.mark_closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_frames_carry_their_id() {
        let (id, outcome) =
            parse_response(r#"{"jsonrpc":"2.0","id":7,"result":"Bookchain"}"#).unwrap();
        assert_eq!(id, 7);
        assert_eq!(outcome.unwrap(), json!("Bookchain"));
    }

    #[test]
    fn error_frames_map_to_rpc_errors() {
        let (id, outcome) = parse_response(
            r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        assert_eq!(id, 3);
        assert_eq!(
            outcome.unwrap_err(),
            NodeError::Rpc {
                code: -32601,
                message: "Method not found".to_owned(),
            }
        );
    }

    #[test]
    fn subscription_pushes_and_garbage_are_dropped() {
        assert!(parse_response(r#"{"jsonrpc":"2.0","method":"chain_newHead","params":{}}"#).is_none());
        assert!(parse_response("not json").is_none());
    }
}
