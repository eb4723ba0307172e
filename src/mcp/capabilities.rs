/// MCP capability negotiation.
///
/// During the `initialize` handshake the client sends its capability set and
/// the server responds with what it supports. `negotiate` intersects the
/// client's request with what the bridge can offer.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The set of MCP capabilities this bridge can advertise as a server: the
/// capability facade (§6) as tools, per-workspace diagnostics snapshots as
/// resources, and canned prompt templates. No sampling — this bridge
/// delegates none of its own reasoning to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeCapabilities {
    pub tools: bool,
    pub resources: bool,
    pub prompts: bool,
}

impl Default for BridgeCapabilities {
    fn default() -> Self {
        Self {
            tools: true,
            resources: true,
            prompts: true,
        }
    }
}

impl BridgeCapabilities {
    /// Convert to the JSON object expected in an MCP `initialize` response.
    pub fn to_mcp_value(&self) -> Value {
        let mut cap = serde_json::Map::new();
        if self.tools {
            cap.insert("tools".into(), serde_json::json!({ "listChanged": false }));
        }
        if self.resources {
            cap.insert(
                "resources".into(),
                serde_json::json!({ "listChanged": false, "subscribe": false }),
            );
        }
        if self.prompts {
            cap.insert("prompts".into(), serde_json::json!({ "listChanged": false }));
        }
        Value::Object(cap)
    }
}

/// Parse the client's `capabilities` object and return the intersection with
/// what this bridge supports. A capability is requested by its mere presence
/// (any value) in the client's object, per the MCP spec.
pub fn negotiate(client_caps: Value) -> BridgeCapabilities {
    let our_defaults = BridgeCapabilities::default();
    let client_wants_tools = client_caps.get("tools").is_some();
    let client_wants_resources = client_caps.get("resources").is_some();
    let client_wants_prompts = client_caps.get("prompts").is_some();

    BridgeCapabilities {
        tools: our_defaults.tools && client_wants_tools,
        resources: our_defaults.resources && client_wants_resources,
        prompts: our_defaults.prompts && client_wants_prompts,
    }
}
