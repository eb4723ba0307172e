//! A minimal stub language server for end-to-end tests.
//!
//! Speaks just enough `Content-Length`-framed JSON-RPC (reusing the real
//! `lsp_bridge::lsp::codec` framing) to drive the scenarios in
//! `tests/bridge_e2e.rs`: `initialize`, `textDocument/didOpen` (replies with
//! one canned diagnostic for a fixed path), `textDocument/didChange` +
//! `textDocument/didSave` (replies with an empty diagnostics list),
//! `textDocument/hover`, `textDocument/definition`, and `shutdown`/`exit`.
//!
//! Not part of the library's public surface — built only as a fixture for
//! integration tests (see the `stub-lsp` entry in Cargo.toml).

use lsp_bridge::lsp::codec::{read_message, write_message};
use serde_json::{json, Value};
use tokio::io::BufReader;

const FIXTURE_PATH: &str = "src/App.scala";

#[tokio::main]
async fn main() {
    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut stdout = tokio::io::stdout();

    loop {
        let msg = match read_message(&mut reader).await {
            Ok(Some(m)) => m,
            Ok(None) => break,
            Err(_) => break,
        };

        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or_default();
        let id = msg.get("id").cloned();

        match method {
            "initialize" => {
                let result = json!({
                    "capabilities": {
                        "textDocumentSync": 1,
                        "hoverProvider": true,
                        "definitionProvider": true,
                    }
                });
                send_response(&mut stdout, id, result).await;
            }
            "initialized" => {
                // notification, no response
            }
            "textDocument/didOpen" => {
                let uri = msg.pointer("/params/textDocument/uri").and_then(|v| v.as_str());
                if uri.map(|u| u.ends_with(FIXTURE_PATH)).unwrap_or(false) {
                    let diagnostics = json!({
                        "uri": uri.unwrap(),
                        "diagnostics": [{
                            "range": {
                                "start": {"line": 10, "character": 4},
                                "end": {"line": 10, "character": 10}
                            },
                            "severity": 1,
                            "message": "type mismatch",
                        }]
                    });
                    send_notification(&mut stdout, "textDocument/publishDiagnostics", diagnostics).await;
                }
            }
            "textDocument/didChange" => {
                // Real resync happens once didSave lands; see below.
            }
            "textDocument/didSave" => {
                let uri = msg.pointer("/params/textDocument/uri").and_then(|v| v.as_str());
                if let Some(uri) = uri {
                    let diagnostics = json!({ "uri": uri, "diagnostics": [] });
                    send_notification(&mut stdout, "textDocument/publishDiagnostics", diagnostics).await;
                }
            }
            "textDocument/hover" => {
                let result = json!({ "contents": "def println(x: Any): Unit" });
                send_response(&mut stdout, id, result).await;
            }
            "textDocument/definition" => {
                let result = json!([{
                    "uri": "file:///w/src/models/User.scala",
                    "range": {
                        "start": {"line": 20, "character": 6},
                        "end": {"line": 20, "character": 13}
                    }
                }]);
                send_response(&mut stdout, id, result).await;
            }
            "shutdown" => {
                send_response(&mut stdout, id, Value::Null).await;
            }
            "exit" => {
                break;
            }
            _ => {
                if let Some(id) = id {
                    send_response(&mut stdout, Some(id), Value::Null).await;
                }
            }
        }
    }
}

async fn send_response<W>(writer: &mut W, id: Option<Value>, result: Value)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let msg = json!({ "jsonrpc": "2.0", "id": id.unwrap_or(Value::Null), "result": result });
    let _ = write_message(writer, &msg).await;
}

async fn send_notification<W>(writer: &mut W, method: &str, params: Value)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let msg = json!({ "jsonrpc": "2.0", "method": method, "params": params });
    let _ = write_message(writer, &msg).await;
}
