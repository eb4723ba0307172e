//! MCP `tools/list` — exposes the capability facade (spec.md §6/C8) as MCP
//! tool definitions. Each tool maps 1:1 onto a `CapabilityFacade` operation;
//! `mcp::dispatch::McpDispatcher` routes `tools/call` invocations to them.
//!
//! Tool definitions follow the JSON Schema convention for `inputSchema`, the
//! same shape the teacher's `McpToolDef` catalogue used.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single MCP tool definition, as returned in `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDef {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpToolDef {
    fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Returns every tool this bridge exposes via MCP — the capability facade
/// (spec.md §6) translated into tool schemas.
pub fn lsp_bridge_tools() -> Vec<McpToolDef> {
    vec![
        McpToolDef::new(
            "list_workspaces",
            "List the names of every currently-configured LSP workspace.",
            json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        ),
        McpToolDef::new(
            "get_status",
            "Get the connection state and diagnostic counts for one workspace's language server.",
            json!({
                "type": "object",
                "required": ["workspace"],
                "properties": {
                    "workspace": {
                        "type": "string",
                        "description": "Workspace name as registered with the bridge, e.g. \"metals\" or \"rust\"."
                    }
                },
                "additionalProperties": false
            }),
        ),
        McpToolDef::new(
            "get_diagnostics",
            "Get the latest compiler/linter diagnostics for a workspace, optionally filtered to one file.",
            json!({
                "type": "object",
                "required": ["workspace"],
                "properties": {
                    "workspace": {
                        "type": "string",
                        "description": "Workspace name as registered with the bridge."
                    },
                    "path": {
                        "type": "string",
                        "description": "Absolute path to a single file. Omit to get diagnostics for every file."
                    }
                },
                "additionalProperties": false
            }),
        ),
        McpToolDef::new(
            "trigger_compilation",
            "Force the language server to re-synchronize and recompile every open file, then return \
             whatever diagnostics arrived within the grace period.",
            json!({
                "type": "object",
                "required": ["workspace"],
                "properties": {
                    "workspace": {
                        "type": "string",
                        "description": "Workspace name. If not yet connected and workspace_root is given, a session is started lazily."
                    },
                    "workspace_root": {
                        "type": "string",
                        "description": "Absolute path to the workspace root, used only to lazily connect an unknown workspace."
                    }
                },
                "additionalProperties": false
            }),
        ),
        McpToolDef::new(
            "get_hover",
            "Get hover information (type signature, doc comment) for the symbol at a source position.",
            json!({
                "type": "object",
                "required": ["workspace", "path", "line", "character"],
                "properties": {
                    "workspace": { "type": "string", "description": "Workspace name." },
                    "path": { "type": "string", "description": "Absolute path to the source file." },
                    "line": { "type": "integer", "description": "1-indexed line number." },
                    "character": { "type": "integer", "description": "0-indexed character offset." }
                },
                "additionalProperties": false
            }),
        ),
        McpToolDef::new(
            "get_definition",
            "Get the definition location(s) for the symbol at a source position.",
            json!({
                "type": "object",
                "required": ["workspace", "path", "line", "character"],
                "properties": {
                    "workspace": { "type": "string", "description": "Workspace name." },
                    "path": { "type": "string", "description": "Absolute path to the source file." },
                    "line": { "type": "integer", "description": "1-indexed line number." },
                    "character": { "type": "integer", "description": "0-indexed character offset." }
                },
                "additionalProperties": false
            }),
        ),
    ]
}

/// Handle a MCP `tools/list` request.
pub fn handle_tools_list() -> Value {
    json!({ "tools": lsp_bridge_tools() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_covers_every_facade_operation() {
        let names: Vec<String> = lsp_bridge_tools().into_iter().map(|t| t.name).collect();
        for expected in [
            "list_workspaces",
            "get_status",
            "get_diagnostics",
            "trigger_compilation",
            "get_hover",
            "get_definition",
        ] {
            assert!(names.contains(&expected.to_string()), "missing tool {expected}");
        }
    }

    #[test]
    fn handle_tools_list_wraps_in_tools_key() {
        let v = handle_tools_list();
        assert!(v["tools"].is_array());
    }
}
