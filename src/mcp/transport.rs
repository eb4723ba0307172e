// SPDX-License-Identifier: MIT
//! MCP JSON-RPC 2.0 transport — line-delimited JSON over stdio.
//!
//! Mirrors the wire types of the teacher's `mcp::transport` (`McpMessage`,
//! `McpResponse`, `McpError`, the standard JSON-RPC error codes), but reads
//! and writes a single JSON value per line rather than `Content-Length`
//! framing — that framing is LSP's (see `lsp::codec`), not MCP's; the two
//! protocols this bridge speaks use different wire shapes on purpose
//! (spec.md §1).
//!
//! Unlike the teacher, which only ever spoke MCP as a *client* of upstream
//! servers, this bridge is itself the MCP *server*: `read_message` reads a
//! request/notification from the AI client on stdin, `write_response` writes
//! a reply to stdout. Nothing but MCP JSON-RPC may ever touch stdout — all
//! logging goes to stderr or a log file (see `main::setup_logging`).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ─── Core message types ───────────────────────────────────────────────────────

/// An incoming MCP JSON-RPC 2.0 request or notification. Notifications carry
/// no `id` and expect no response.
#[derive(Debug, Clone, Deserialize)]
pub struct McpMessage {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl McpMessage {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An outgoing MCP JSON-RPC 2.0 response (success or error).
#[derive(Debug, Clone, Serialize)]
pub struct McpResponse {
    pub jsonrpc: &'static str,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

impl McpResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: McpError) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// A MCP/JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl McpError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

// ─── Standard JSON-RPC error codes ────────────────────────────────────────────

pub const MCP_PARSE_ERROR: i32 = -32700;
pub const MCP_INVALID_REQUEST: i32 = -32600;
pub const MCP_METHOD_NOT_FOUND: i32 = -32601;
pub const MCP_INVALID_PARAMS: i32 = -32602;
pub const MCP_INTERNAL_ERROR: i32 = -32603;

// ─── Bridge-specific error codes ──────────────────────────────────────────────
//
// Mirror the nine kinds in spec.md §7 that the MCP layer can observe coming
// back out of the capability facade. Chosen in the JSON-RPC reserved
// "server error" band (-32000..-32099), the same band the teacher's
// `MCP_PROVIDER_NOT_AVAILABLE` (-32002) lives in.

pub const MCP_UNKNOWN_WORKSPACE: i32 = -32001;
pub const MCP_UNAVAILABLE: i32 = -32002;
pub const MCP_NOT_FOUND: i32 = -32003;
pub const MCP_TIMEOUT: i32 = -32004;
pub const MCP_IO_ERROR: i32 = -32005;

// ─── Lifecycle types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct McpServerInfo {
    pub name: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct McpInitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: &'static str,
    pub capabilities: Value,
    #[serde(rename = "serverInfo")]
    pub server_info: McpServerInfo,
}

/// Handle an `initialize` request: advertise this bridge's capabilities
/// (negotiated against the client's request — `mcp::capabilities::negotiate`)
/// and identify ourselves.
pub fn handle_initialize(id: Value, capabilities: Value) -> McpResponse {
    let result = McpInitializeResult {
        protocol_version: MCP_PROTOCOL_VERSION,
        capabilities,
        server_info: McpServerInfo {
            name: "lsp-bridge",
            version: env!("CARGO_PKG_VERSION"),
        },
    };
    McpResponse::ok(id, serde_json::to_value(result).unwrap_or(Value::Null))
}

/// Handle a `ping` request — respond with an empty result.
pub fn handle_ping(id: Value) -> McpResponse {
    McpResponse::ok(id, serde_json::json!({}))
}

/// Handle the `notifications/initialized` notification — no response. Logged
/// so a transcript shows the handshake completed.
pub fn handle_initialized() {
    tracing::debug!("MCP client sent 'initialized' — handshake complete");
}

// ─── Stdio framing ─────────────────────────────────────────────────────────────

/// Read one line-delimited JSON message, or `Ok(None)` on clean EOF.
/// Blank lines between messages are skipped.
pub async fn read_message<R>(reader: &mut R) -> std::io::Result<Option<McpMessage>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return match serde_json::from_str::<McpMessage>(trimmed) {
            Ok(msg) => Ok(Some(msg)),
            Err(e) => {
                tracing::warn!(error = %e, line = %trimmed, "malformed MCP message, skipping");
                continue;
            }
        };
    }
}

/// Write one JSON-RPC response as a single line and flush.
pub async fn write_response<W>(writer: &mut W, response: &McpResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut body = serde_json::to_vec(response).unwrap_or_default();
    body.push(b'\n');
    writer.write_all(&body).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_one_message_per_line() {
        let input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\",\"params\":{}}\n";
        let mut reader = BufReader::new(&input[..]);
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(msg.method, "ping");
        assert_eq!(msg.id, Some(serde_json::json!(1)));
    }

    #[tokio::test]
    async fn notification_has_no_id() {
        let input = b"{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\",\"params\":{}}\n";
        let mut reader = BufReader::new(&input[..]);
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert!(msg.is_notification());
    }

    #[tokio::test]
    async fn eof_returns_none() {
        let input: &[u8] = b"";
        let mut reader = BufReader::new(input);
        assert!(read_message(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_skipped_not_fatal() {
        let input = b"not json\n{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\",\"params\":{}}\n";
        let mut reader = BufReader::new(&input[..]);
        let msg = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(msg.id, Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn write_response_appends_newline() {
        let mut buf = Vec::new();
        let response = McpResponse::ok(serde_json::json!(1), serde_json::json!({"ok": true}));
        write_response(&mut buf, &response).await.unwrap();
        assert!(buf.ends_with(b"\n"));
        let line = String::from_utf8(buf).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn handle_initialize_reports_protocol_version() {
        let response = handle_initialize(serde_json::json!(1), serde_json::json!({}));
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "lsp-bridge");
    }
}
