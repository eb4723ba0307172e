//! C1 — framed stdio codec.
//!
//! LSP wraps every JSON-RPC body in a `Content-Length` header block
//! terminated by a blank line (spec.md §4.1). This module reads and writes
//! that framing over any `AsyncBufRead`/`AsyncWrite` pair, so sessions can be
//! driven by a real child process's stdio in production and by an in-memory
//! `tokio::io::duplex` pipe in tests — the same generic-transport shape used
//! by the pack's `mcp-language-server-port` client.

use crate::lsp::error::{LspError, LspResult};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const CONTENT_LENGTH_HEADER: &str = "content-length";

/// Read one framed message from `reader`, or `Ok(None)` on a clean
/// end-of-stream at a message boundary.
pub async fn read_message<R>(reader: &mut R) -> LspResult<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader
            .read_line(&mut line)
            .await
            .map_err(|e| LspError::ProtocolError(format!("reading header: {e}")))?;

        if n == 0 {
            if content_length.is_some() {
                return Err(LspError::ProtocolError(
                    "EOF mid-header block".to_string(),
                ));
            }
            return Ok(None);
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }

        let Some((name, value)) = trimmed.split_once(':') else {
            return Err(LspError::ProtocolError(format!(
                "malformed header line: {trimmed:?}"
            )));
        };

        if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH_HEADER) {
            let value = value.trim();
            content_length = Some(value.parse().map_err(|_| {
                LspError::ProtocolError(format!("invalid Content-Length: {value:?}"))
            })?);
        }
        // Content-Type and any other header is parsed (case-insensitively
        // split on ':') and ignored — spec.md §4.1.
    }

    let content_length = content_length
        .ok_or_else(|| LspError::ProtocolError("missing Content-Length header".to_string()))?;

    let mut body = vec![0u8; content_length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|e| LspError::ProtocolError(format!("EOF mid-body: {e}")))?;

    let text = String::from_utf8(body)
        .map_err(|e| LspError::ProtocolError(format!("non-UTF-8 message body: {e}")))?;

    let value: Value = serde_json::from_str(&text)
        .map_err(|e| LspError::ProtocolError(format!("invalid JSON body: {e}")))?;

    Ok(Some(value))
}

/// Write one framed message to `writer` and flush.
///
/// `Content-Length` is computed in bytes of the UTF-8 encoding, not chars —
/// required for correctness with any non-ASCII diagnostic text or file path.
pub async fn write_message<W>(writer: &mut W, value: &Value) -> LspResult<()>
where
    W: AsyncWrite + Unpin,
{
    let body = serde_json::to_vec(value)
        .map_err(|e| LspError::ProtocolError(format!("failed to serialize message: {e}")))?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());

    writer
        .write_all(header.as_bytes())
        .await
        .map_err(|e| LspError::TransportClosed(e.to_string()))?;
    writer
        .write_all(&body)
        .await
        .map_err(|e| LspError::TransportClosed(e.to_string()))?;
    writer
        .flush()
        .await
        .map_err(|e| LspError::TransportClosed(e.to_string()))?;

    Ok(())
}

/// Drain a child process's stderr pipe to `tracing::debug!`, line by line.
///
/// Without this, a language server that writes diagnostic chatter to stderr
/// eventually fills the pipe buffer and blocks — wedging the whole session
/// (SUPPLEMENTED FEATURES, grounded on `mcp-language-server-port`'s stderr
/// drain task).
pub async fn drain_stderr<R>(stderr: R, server_name: String)
where
    R: AsyncRead + Unpin,
{
    let mut reader = tokio::io::BufReader::new(stderr);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {
                tracing::debug!(server = %server_name, "{}", line.trim_end());
            }
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn roundtrip_single_message() {
        let (mut client, server) = tokio::io::duplex(4096);
        let msg = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
        write_message(&mut client, &msg).await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        let got = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(got, msg);
    }

    #[tokio::test]
    async fn clean_eof_at_boundary_returns_none() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);
        let mut reader = BufReader::new(server);
        let got = read_message(&mut reader).await.unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn eof_mid_body_is_protocol_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client
            .write_all(b"Content-Length: 100\r\n\r\n{\"incomplete\"")
            .await
            .unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, LspError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn malformed_header_is_protocol_error() {
        let (mut client, server) = tokio::io::duplex(4096);
        client.write_all(b"not-a-header\r\n\r\n").await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, LspError::ProtocolError(_)));
    }

    #[tokio::test]
    async fn non_ascii_body_uses_byte_length() {
        let (mut client, server) = tokio::io::duplex(4096);
        let msg = json!({"jsonrpc": "2.0", "method": "textDocument/publishDiagnostics",
            "params": {"message": "类型不匹配 — mismatch"}});
        write_message(&mut client, &msg).await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        let got = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(got, msg);
    }

    #[tokio::test]
    async fn content_type_header_is_ignored() {
        let (mut client, server) = tokio::io::duplex(4096);
        let body = br#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let header = format!(
            "Content-Length: {}\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\n\r\n",
            body.len()
        );
        client.write_all(header.as_bytes()).await.unwrap();
        client.write_all(body).await.unwrap();
        drop(client);

        let mut reader = BufReader::new(server);
        let got = read_message(&mut reader).await.unwrap().unwrap();
        assert_eq!(got["id"], 1);
    }
}
