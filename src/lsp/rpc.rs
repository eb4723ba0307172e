// SPDX-License-Identifier: MIT
//! C2 — JSON-RPC peer.
//!
//! One dispatcher fiber owns the read half of the transport and a map of
//! pending calls; one writer fiber owns the write half exclusively, so that
//! stdin is never written from two places at once (spec.md §5's
//! single-writer rule). Requests and notifications are correlated the way
//! `mcp-language-server-port`'s `Client` does it: an always-increasing id
//! counter, a `oneshot::Sender` stashed per in-flight id, completed by the
//! dispatcher when a matching response frame arrives.

use crate::lsp::codec;
use crate::lsp::error::{LspError, LspResult};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex};

/// A handler for a server-pushed notification. Runs on the dispatcher fiber;
/// must not block — offload real work via `tokio::spawn`.
pub type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// A handler for a server-to-client request. Returns the JSON-RPC `result`
/// value to send back.
pub type RequestHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Value> + Send>> + Send + Sync>;

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<LspResult<Value>>>>>;

/// A concurrent JSON-RPC 2.0 peer over a framed stdio transport.
///
/// Construct with [`RpcPeer::spawn`], which starts the dispatcher and writer
/// fibers and returns a handle plus a join handle for the dispatcher's exit.
pub struct RpcPeer {
    next_id: AtomicI64,
    pending: PendingMap,
    outgoing: tokio::sync::mpsc::UnboundedSender<Value>,
    notification_handlers: Arc<Mutex<HashMap<String, NotificationHandler>>>,
    request_handlers: Arc<Mutex<HashMap<String, RequestHandler>>>,
    dead: Arc<std::sync::atomic::AtomicBool>,
}

impl RpcPeer {
    /// Start the dispatcher (read) and writer fibers over `reader`/`writer`,
    /// returning the peer handle immediately.
    pub fn spawn<R, W>(reader: R, writer: W) -> Arc<RpcPeer>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let notification_handlers: Arc<Mutex<HashMap<String, NotificationHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let request_handlers: Arc<Mutex<HashMap<String, RequestHandler>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let dead = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let (outgoing_tx, mut outgoing_rx) = tokio::sync::mpsc::unbounded_channel::<Value>();

        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(msg) = outgoing_rx.recv().await {
                if codec::write_message(&mut writer, &msg).await.is_err() {
                    break;
                }
            }
        });

        let peer = Arc::new(RpcPeer {
            next_id: AtomicI64::new(1),
            pending: pending.clone(),
            outgoing: outgoing_tx.clone(),
            notification_handlers: notification_handlers.clone(),
            request_handlers: request_handlers.clone(),
            dead: dead.clone(),
        });

        let dispatch_pending = pending.clone();
        let dispatch_notif = notification_handlers.clone();
        let dispatch_req = request_handlers.clone();
        let dispatch_outgoing = outgoing_tx.clone();
        let dispatch_dead = dead.clone();

        tokio::spawn(async move {
            let mut reader = reader;
            loop {
                match codec::read_message(&mut reader).await {
                    Ok(Some(msg)) => {
                        dispatch_one(
                            msg,
                            &dispatch_pending,
                            &dispatch_notif,
                            &dispatch_req,
                            &dispatch_outgoing,
                        )
                        .await;
                    }
                    Ok(None) => {
                        fail_all_pending(&dispatch_pending, LspError::TransportClosed(
                            "language server closed stdout".to_string(),
                        ))
                        .await;
                        dispatch_dead.store(true, Ordering::SeqCst);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "framing error, marking session dead");
                        // spec.md §8: a malformed frame fails every pending
                        // call with *transportClosed*, not the raw protocol
                        // error — the protocol error is logged above, but the
                        // caller-facing kind is the transport's death.
                        fail_all_pending(
                            &dispatch_pending,
                            LspError::TransportClosed(format!("framing error: {e}")),
                        )
                        .await;
                        dispatch_dead.store(true, Ordering::SeqCst);
                        break;
                    }
                }
            }
        });

        peer
    }

    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::SeqCst)
    }

    /// Register a handler for a server-pushed notification. Replaces any
    /// prior handler for the same method.
    pub async fn on_notification(&self, method: impl Into<String>, handler: NotificationHandler) {
        self.notification_handlers
            .lock()
            .await
            .insert(method.into(), handler);
    }

    /// Register a handler for a server-to-client request. Methods with no
    /// registered handler get the generic `null` response (spec.md §4.2) so
    /// the server is never blocked waiting on a reply.
    pub async fn on_request(&self, method: impl Into<String>, handler: RequestHandler) {
        self.request_handlers
            .lock()
            .await
            .insert(method.into(), handler);
    }

    /// Send a notification (no id, no reply expected).
    pub async fn notify(&self, method: &str, params: Value) -> LspResult<()> {
        if self.is_dead() {
            return Err(LspError::TransportClosed("session is dead".to_string()));
        }
        let msg = json!({"jsonrpc": "2.0", "method": method, "params": params});
        self.outgoing
            .send(msg)
            .map_err(|_| LspError::TransportClosed("writer fiber gone".to_string()))
    }

    /// Issue a request and await the matching response, with an optional
    /// deadline. On timeout the pending slot is removed and the call can be
    /// retried; a response that arrives after the deadline is dropped.
    pub async fn call(&self, method: &str, params: Value, timeout: Duration) -> LspResult<Value> {
        if self.is_dead() {
            return Err(LspError::TransportClosed("session is dead".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let msg = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
        if self.outgoing.send(msg).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(LspError::TransportClosed("writer fiber gone".to_string()));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LspError::TransportClosed(
                "dispatcher dropped pending call".to_string(),
            )),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(LspError::Timeout(timeout))
            }
        }
    }
}

async fn dispatch_one(
    msg: Value,
    pending: &PendingMap,
    notification_handlers: &Arc<Mutex<HashMap<String, NotificationHandler>>>,
    request_handlers: &Arc<Mutex<HashMap<String, RequestHandler>>>,
    outgoing: &tokio::sync::mpsc::UnboundedSender<Value>,
) {
    let id = msg.get("id").cloned();
    let method = msg.get("method").and_then(|m| m.as_str()).map(str::to_string);
    let has_result_or_error = msg.get("result").is_some() || msg.get("error").is_some();

    if let Some(id_value) = &id {
        if has_result_or_error && method.is_none() {
            if let Some(id) = id_value.as_i64() {
                let slot = pending.lock().await.remove(&id);
                if let Some(tx) = slot {
                    let result = if let Some(err) = msg.get("error") {
                        let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or(-32603);
                        let message = err
                            .get("message")
                            .and_then(|m| m.as_str())
                            .unwrap_or("unknown error")
                            .to_string();
                        Err(LspError::RpcError { code, message })
                    } else {
                        Ok(msg.get("result").cloned().unwrap_or(Value::Null))
                    };
                    let _ = tx.send(result);
                }
            }
            return;
        }
    }

    if let Some(method) = method {
        let params = msg.get("params").cloned().unwrap_or(Value::Null);

        if id.is_some() {
            let handler = request_handlers.lock().await.get(&method).cloned();
            let id = id.unwrap();
            let outgoing = outgoing.clone();
            tokio::spawn(async move {
                let result = match handler {
                    Some(h) => h(params).await,
                    None => Value::Null,
                };
                let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
                let _ = outgoing.send(response);
            });
        } else {
            let handler = notification_handlers.lock().await.get(&method).cloned();
            match handler {
                Some(h) => h(params),
                None => tracing::debug!(method = %method, "no handler for notification, dropping"),
            }
        }
    }
}

async fn fail_all_pending(pending: &PendingMap, err: LspError) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(err.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn make_pair() -> (
        Arc<RpcPeer>,
        tokio::io::DuplexStream,
    ) {
        let (client_io, server_io) = tokio::io::duplex(8192);
        let (client_read, client_write) = tokio::io::split(client_io);
        let peer = RpcPeer::spawn(BufReader::new(client_read), client_write);
        (peer, server_io)
    }

    #[tokio::test]
    async fn call_completes_on_matching_response() {
        let (peer, server_io) = make_pair();
        let mut server_reader = BufReader::new(server_io);

        let call = tokio::spawn({
            let peer = peer.clone();
            async move { peer.call("initialize", json!({}), Duration::from_secs(1)).await }
        });

        let req = codec::read_message(&mut server_reader).await.unwrap().unwrap();
        let id = req["id"].clone();
        let response = json!({"jsonrpc": "2.0", "id": id, "result": {"ok": true}});
        codec::write_message(server_reader.get_mut(), &response).await.unwrap();

        let result = call.await.unwrap().unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[tokio::test]
    async fn call_times_out_and_frees_the_slot() {
        let (peer, _server_io) = make_pair();
        let result = peer.call("hover", json!({}), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(LspError::Timeout(_))));
    }

    #[tokio::test]
    async fn rpc_error_response_surfaces_as_rpc_error() {
        let (peer, server_io) = make_pair();
        let mut server_reader = BufReader::new(server_io);

        let call = tokio::spawn({
            let peer = peer.clone();
            async move { peer.call("definition", json!({}), Duration::from_secs(1)).await }
        });

        let req = codec::read_message(&mut server_reader).await.unwrap().unwrap();
        let id = req["id"].clone();
        let response =
            json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "nope"}});
        codec::write_message(server_reader.get_mut(), &response).await.unwrap();

        let result = call.await.unwrap();
        assert!(matches!(
            result,
            Err(LspError::RpcError { code: -32601, .. })
        ));
    }

    #[tokio::test]
    async fn notification_invokes_registered_handler() {
        let (peer, mut server_io) = make_pair();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        peer.on_notification(
            "textDocument/publishDiagnostics",
            Arc::new(move |_params| {
                count_clone.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .await;

        let notif = json!({"jsonrpc": "2.0", "method": "textDocument/publishDiagnostics",
            "params": {"uri": "file:///a.rs", "diagnostics": []}});
        codec::write_message(&mut server_io, &notif).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unanswered_server_request_gets_generic_null_response() {
        let (_peer, mut server_io) = make_pair();

        let req = json!({"jsonrpc": "2.0", "id": 99, "method": "window/workDoneProgress/create",
            "params": {"token": "x"}});
        codec::write_message(&mut server_io, &req).await.unwrap();

        let mut server_reader = BufReader::new(&mut server_io);
        let response = codec::read_message(&mut server_reader).await.unwrap().unwrap();
        assert_eq!(response["id"], 99);
        assert_eq!(response["result"], Value::Null);
    }

    #[tokio::test]
    async fn malformed_frame_fails_pending_calls_with_transport_closed() {
        let (peer, server_io) = make_pair();
        let call = tokio::spawn({
            let peer = peer.clone();
            async move { peer.call("hover", json!({}), Duration::from_secs(5)).await }
        });

        let mut server_io = server_io;
        server_io.write_all(b"not-a-header\r\n\r\n").await.unwrap();

        let result = call.await.unwrap();
        assert!(matches!(result, Err(LspError::TransportClosed(_))));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(peer.is_dead());
    }

    #[tokio::test]
    async fn transport_closed_fails_pending_calls() {
        let (peer, server_io) = make_pair();
        let call = tokio::spawn({
            let peer = peer.clone();
            async move { peer.call("shutdown", json!(null), Duration::from_secs(5)).await }
        });

        drop(server_io);

        let result = call.await.unwrap();
        assert!(matches!(result, Err(LspError::TransportClosed(_))));
    }
}
