// SPDX-License-Identifier: MIT
//! The ten error kinds the protocol engine can surface (spec §7).
//!
//! Every fallible capability-facade operation returns `Result<T, LspError>`
//! rather than `anyhow::Error` — callers (the MCP adapter) need to match on
//! the kind to pick the right MCP/JSON-RPC error code, which an opaque error
//! type would not allow.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LspError {
    #[error("invalid server config: {0}")]
    ConfigError(String),

    #[error("failed to spawn language server: {0}")]
    SpawnError(String),

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("language server returned an error: {message} (code {code})")]
    RpcError { code: i64, message: String },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("transport closed: {0}")]
    TransportClosed(String),

    #[error("unknown workspace: {0}")]
    UnknownWorkspace(String),

    #[error("workspace unavailable: {0}")]
    Unavailable(String),

    #[error("local file IO error: {0}")]
    IoError(String),

    #[error("not found")]
    NotFound,
}

pub type LspResult<T> = Result<T, LspError>;
