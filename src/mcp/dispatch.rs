// SPDX-License-Identifier: MIT
//! MCP `tools/call` dispatcher — routes tool invocations to the capability
//! facade (C8) and maps its `LspError` kinds (spec.md §7) onto MCP/JSON-RPC
//! error codes.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::lsp::error::LspError;
use crate::BridgeContext;

use super::transport::{
    McpError, MCP_INVALID_PARAMS, MCP_IO_ERROR, MCP_METHOD_NOT_FOUND, MCP_NOT_FOUND,
    MCP_TIMEOUT, MCP_UNAVAILABLE, MCP_UNKNOWN_WORKSPACE,
};
use super::tools::lsp_bridge_tools;

pub struct McpDispatcher {
    ctx: Arc<BridgeContext>,
}

impl McpDispatcher {
    pub fn new(ctx: Arc<BridgeContext>) -> Self {
        Self { ctx }
    }

    /// Dispatch a `tools/call` invocation. `arguments` is the `arguments`
    /// object from the MCP request params.
    pub async fn dispatch(&self, tool_name: &str, arguments: Value) -> Result<Value, McpError> {
        let known = lsp_bridge_tools().into_iter().any(|t| t.name == tool_name);
        if !known {
            warn!(tool = tool_name, "MCP unknown tool");
            return Err(McpError::new(
                MCP_METHOD_NOT_FOUND,
                format!("unknown tool: {tool_name}"),
            ));
        }

        let result = match tool_name {
            "list_workspaces" => {
                let names = self.ctx.facade.list_workspaces().await;
                Ok(json!({ "workspaces": names }))
            }
            "get_status" => {
                let name = require_str(&arguments, "workspace")?;
                self.ctx
                    .facade
                    .get_status(name)
                    .await
                    .map(|status| serde_json::to_value(status).unwrap_or(Value::Null))
                    .map_err(classify_error)
            }
            "get_diagnostics" => {
                let name = require_str(&arguments, "workspace")?;
                let path = arguments.get("path").and_then(|v| v.as_str());
                self.ctx
                    .facade
                    .get_diagnostics(name, path)
                    .await
                    .map(|report| serde_json::to_value(report).unwrap_or(Value::Null))
                    .map_err(classify_error)
            }
            "trigger_compilation" => {
                let name = require_str(&arguments, "workspace")?;
                let workspace_root = arguments
                    .get("workspace_root")
                    .and_then(|v| v.as_str())
                    .map(PathBuf::from);
                self.ctx
                    .facade
                    .trigger_compilation(name, workspace_root)
                    .await
                    .map(|report| serde_json::to_value(report).unwrap_or(Value::Null))
                    .map_err(classify_error)
            }
            "get_hover" => {
                let name = require_str(&arguments, "workspace")?;
                let path = require_str(&arguments, "path")?;
                let line = require_u32(&arguments, "line")?;
                let character = require_u32(&arguments, "character")?;
                self.ctx
                    .facade
                    .get_hover(name, path, line, character)
                    .await
                    .map(|text| json!({ "contents": text }))
                    .map_err(classify_error)
            }
            "get_definition" => {
                let name = require_str(&arguments, "workspace")?;
                let path = require_str(&arguments, "path")?;
                let line = require_u32(&arguments, "line")?;
                let character = require_u32(&arguments, "character")?;
                self.ctx
                    .facade
                    .get_definition(name, path, line, character)
                    .await
                    .map(|locations| {
                        json!({ "locations": serde_json::to_value(locations).unwrap_or(Value::Null) })
                    })
                    .map_err(classify_error)
            }
            other => Err(McpError::new(
                MCP_METHOD_NOT_FOUND,
                format!("unknown tool: {other}"),
            )),
        };

        if result.is_ok() {
            info!(tool = tool_name, "MCP tool executed");
        }
        result
    }
}

fn require_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str, McpError> {
    arguments.get(key).and_then(|v| v.as_str()).ok_or_else(|| {
        McpError::new(MCP_INVALID_PARAMS, format!("missing required field '{key}'"))
    })
}

fn require_u32(arguments: &Value, key: &str) -> Result<u32, McpError> {
    arguments
        .get(key)
        .and_then(|v| v.as_u64())
        .map(|n| n as u32)
        .ok_or_else(|| McpError::new(MCP_INVALID_PARAMS, format!("missing required field '{key}'")))
}

/// Map spec.md §7's nine error kinds onto a MCP error code + message.
fn classify_error(err: LspError) -> McpError {
    match err {
        LspError::UnknownWorkspace(name) => {
            McpError::new(MCP_UNKNOWN_WORKSPACE, format!("unknown workspace: {name}"))
        }
        LspError::Unavailable(msg) => McpError::new(MCP_UNAVAILABLE, msg),
        LspError::NotFound => McpError::new(MCP_NOT_FOUND, "not found"),
        LspError::Timeout(d) => McpError::new(MCP_TIMEOUT, format!("timed out after {d:?}")),
        LspError::IoError(msg) => McpError::new(MCP_IO_ERROR, msg),
        LspError::ConfigError(msg) => McpError::new(MCP_INVALID_PARAMS, msg),
        LspError::SpawnError(msg) | LspError::ProtocolError(msg) | LspError::TransportClosed(msg) => {
            McpError::new(super::transport::MCP_INTERNAL_ERROR, msg)
        }
        LspError::RpcError { code, message } => McpError::new(
            super::transport::MCP_INTERNAL_ERROR,
            format!("language server error {code}: {message}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, Timeouts};
    use std::path::PathBuf;

    fn empty_ctx() -> Arc<BridgeContext> {
        Arc::new(BridgeContext::new(BridgeConfig {
            data_dir: PathBuf::from("/tmp/lsp-bridge-test"),
            log: "info".to_string(),
            notify_file: PathBuf::from("/tmp/lsp-bridge-notify-test.txt"),
            timeouts: Timeouts::default(),
            servers: vec![],
        }))
    }

    #[tokio::test]
    async fn unknown_tool_is_method_not_found() {
        let dispatcher = McpDispatcher::new(empty_ctx());
        let err = dispatcher.dispatch("nonexistent", json!({})).await.unwrap_err();
        assert_eq!(err.code, MCP_METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn list_workspaces_is_empty_with_no_config() {
        let dispatcher = McpDispatcher::new(empty_ctx());
        let result = dispatcher.dispatch("list_workspaces", json!({})).await.unwrap();
        assert_eq!(result["workspaces"], json!([]));
    }

    #[tokio::test]
    async fn get_status_missing_workspace_arg_is_invalid_params() {
        let dispatcher = McpDispatcher::new(empty_ctx());
        let err = dispatcher.dispatch("get_status", json!({})).await.unwrap_err();
        assert_eq!(err.code, MCP_INVALID_PARAMS);
    }

    #[tokio::test]
    async fn get_status_unknown_workspace_maps_to_unknown_workspace_code() {
        let dispatcher = McpDispatcher::new(empty_ctx());
        let err = dispatcher
            .dispatch("get_status", json!({"workspace": "nope"}))
            .await
            .unwrap_err();
        assert_eq!(err.code, MCP_UNKNOWN_WORKSPACE);
    }
}
