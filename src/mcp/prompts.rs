//! MCP `prompts/list` and `prompts/get` — canned prompt templates that ask
//! the calling AI client to use this bridge's tools a particular way.
//!
//! Kept deliberately small: the prompt surface is explicitly out of scope
//! for the core (spec.md §1, "the MCP layer is a thin adapter"), but the
//! overview's data-flow diagram names resources, tools, *and* prompts as the
//! three things the bridge projects, so an empty `prompts/list` would be an
//! incomplete adapter, not a faithful thin one.

use serde_json::{json, Value};

#[derive(Debug, Clone, serde::Serialize)]
pub struct PromptDescriptor {
    pub name: String,
    pub description: String,
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PromptArgument {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// Response body for `prompts/list`.
pub fn list_prompts() -> Vec<PromptDescriptor> {
    vec![
        PromptDescriptor {
            name: "fix_diagnostics".to_string(),
            description:
                "Summarize current compiler/linter diagnostics for a workspace and suggest fixes."
                    .to_string(),
            arguments: vec![PromptArgument {
                name: "workspace".to_string(),
                description: "Workspace name as registered with the bridge.".to_string(),
                required: true,
            }],
        },
        PromptDescriptor {
            name: "explain_symbol".to_string(),
            description: "Look up hover info and the definition site for a symbol and explain it."
                .to_string(),
            arguments: vec![
                PromptArgument {
                    name: "workspace".to_string(),
                    description: "Workspace name as registered with the bridge.".to_string(),
                    required: true,
                },
                PromptArgument {
                    name: "path".to_string(),
                    description: "Absolute path to the file containing the symbol.".to_string(),
                    required: true,
                },
                PromptArgument {
                    name: "line".to_string(),
                    description: "1-indexed line number of the symbol.".to_string(),
                    required: true,
                },
                PromptArgument {
                    name: "character".to_string(),
                    description: "0-indexed character offset of the symbol.".to_string(),
                    required: true,
                },
            ],
        },
    ]
}

/// Response body for `prompts/get`. Returns `None` for an unknown prompt
/// name.
pub fn get_prompt(name: &str, arguments: &Value) -> Option<Value> {
    let workspace = arguments.get("workspace").and_then(|v| v.as_str()).unwrap_or("default");

    let text = match name {
        "fix_diagnostics" => format!(
            "Call get_diagnostics for workspace \"{workspace}\", then summarize every error and \
             warning it returns, grouped by file, and propose a concrete fix for each."
        ),
        "explain_symbol" => {
            let path = arguments.get("path").and_then(|v| v.as_str()).unwrap_or("");
            let line = arguments.get("line").and_then(|v| v.as_u64()).unwrap_or(1);
            let character = arguments.get("character").and_then(|v| v.as_u64()).unwrap_or(0);
            format!(
                "Call get_hover and get_definition for workspace \"{workspace}\", path \"{path}\", \
                 line {line}, character {character}. Explain what the symbol is and where it is \
                 defined."
            )
        }
        _ => return None,
    };

    Some(json!({
        "description": format!("Prompt template for \"{name}\""),
        "messages": [{
            "role": "user",
            "content": { "type": "text", "text": text },
        }],
    }))
}
