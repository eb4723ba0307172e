//! MCP `resources/list` and `resources/read` — exposes each configured
//! workspace's live diagnostics snapshot as a resource.
//!
//! | URI pattern | Content |
//! |-------------|---------|
//! | `lspbridge://workspace/{name}/diagnostics` | JSON diagnostics summary + by-file listing |
//! | `lspbridge://workspaces` | JSON list of configured workspace names |

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;

use crate::lsp::facade::CapabilityFacade;

#[derive(Debug, Clone, serde::Serialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

/// Response body for `resources/list`.
pub async fn list_resources(facade: &Arc<CapabilityFacade>) -> Vec<ResourceDescriptor> {
    let mut resources = vec![ResourceDescriptor {
        uri: "lspbridge://workspaces".to_string(),
        name: "Workspaces".to_string(),
        description: "All configured LSP workspace names".to_string(),
        mime_type: "application/json".to_string(),
    }];

    for name in facade.list_workspaces().await {
        resources.push(ResourceDescriptor {
            uri: format!("lspbridge://workspace/{name}/diagnostics"),
            name: format!("{name} diagnostics"),
            description: format!("Live diagnostics snapshot for workspace \"{name}\""),
            mime_type: "application/json".to_string(),
        });
    }

    resources
}

/// Response body for `resources/read`.
pub async fn read_resource(facade: &Arc<CapabilityFacade>, uri: &str) -> Option<Value> {
    if uri == "lspbridge://workspaces" {
        let names = facade.list_workspaces().await;
        return Some(make_text_content(uri, "application/json", &json!(names).to_string()));
    }

    if let Some(rest) = uri.strip_prefix("lspbridge://workspace/") {
        let name = rest.strip_suffix("/diagnostics")?;
        return match facade.get_diagnostics(name, None).await {
            Ok(report) => {
                let body = json!({
                    "errors": report.errors,
                    "warnings": report.warnings,
                    "byFile": report.by_file.into_iter().collect::<std::collections::BTreeMap<_, _>>(),
                });
                Some(make_text_content(uri, "application/json", &body.to_string()))
            }
            Err(e) => {
                warn!(uri = %uri, error = %e, "failed to read resource");
                None
            }
        };
    }

    None
}

fn make_text_content(uri: &str, mime_type: &str, text: &str) -> Value {
    json!({
        "contents": [{
            "uri": uri,
            "mimeType": mime_type,
            "text": text,
        }]
    })
}
