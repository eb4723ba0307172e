//! Model Context Protocol (MCP) adapter.
//!
//! This is the "thin adapter" spec.md §1 describes: it speaks MCP JSON-RPC
//! on stdio to an AI client and translates every request into a call on the
//! typed capability facade (`lsp::facade::CapabilityFacade`, C8). Resource
//! naming, tool argument shapes, and prompt text are this module's own
//! design — spec.md explicitly scopes them out of the core.
//!
//! ## Protocol version
//! MCP 2024-11-05.
//!
//! ## Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | `transport` | JSON-RPC wire types + line-delimited stdio framing |
//! | `capabilities` | `initialize` capability negotiation |
//! | `tools` | `tools/list` — the capability facade as MCP tool definitions |
//! | `dispatch` | `tools/call` dispatcher — routes to `lsp::facade::CapabilityFacade` |
//! | `resources` | `resources/list` / `resources/read` — per-workspace diagnostics |
//! | `prompts` | `prompts/list` / `prompts/get` — canned prompt templates |

pub mod capabilities;
pub mod dispatch;
pub mod prompts;
pub mod resources;
pub mod tools;
pub mod transport;

// ─── Flat re-exports ──────────────────────────────────────────────────────────

pub use capabilities::{negotiate, BridgeCapabilities};

pub use dispatch::McpDispatcher;

pub use resources::{list_resources, read_resource, ResourceDescriptor};

pub use tools::{handle_tools_list, lsp_bridge_tools, McpToolDef};

pub use transport::{
    handle_initialize, handle_initialized, handle_ping, read_message, write_response, McpError,
    McpMessage, McpResponse, MCP_INTERNAL_ERROR, MCP_INVALID_PARAMS, MCP_INVALID_REQUEST,
    MCP_METHOD_NOT_FOUND, MCP_PARSE_ERROR,
};
