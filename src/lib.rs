// SPDX-License-Identifier: MIT
//! `lsp-bridge` — a concurrent MCP⇄LSP bridge library.
//!
//! The crate is organized around the data/control flow in spec.md §2:
//! `mcp` (upstream, stdio JSON-RPC to an AI client) calls into `lsp` (the
//! protocol engine — C1 framed codec, C2 JSON-RPC peer, C3/C4 document and
//! diagnostics stores, C5 session state machine, C6 workspace registry, C7
//! edit watcher, C8 capability facade). `config` resolves the workspace
//! server table and timeouts both halves share.

pub mod config;
pub mod lsp;
pub mod mcp;

use std::sync::Arc;

use config::BridgeConfig;
use lsp::facade::CapabilityFacade;
use lsp::registry::WorkspaceRegistry;

/// Shared state handed to the MCP transport loop and every tool/resource
/// handler — one instance per process (spec.md §9 "there is one process-wide
/// workspace registry").
#[derive(Clone)]
pub struct BridgeContext {
    pub config: Arc<BridgeConfig>,
    pub registry: Arc<WorkspaceRegistry>,
    pub facade: Arc<CapabilityFacade>,
    pub started_at: std::time::Instant,
}

impl BridgeContext {
    pub fn new(config: BridgeConfig) -> Self {
        let config = Arc::new(config);
        let registry = WorkspaceRegistry::new((*config).clone());
        let facade = Arc::new(CapabilityFacade::new(registry.clone()));
        Self {
            config,
            registry,
            facade,
            started_at: std::time::Instant::now(),
        }
    }

    /// Graceful teardown: shut every session down, bounded per-session
    /// (spec.md §4.6 `shutdownAll`). Called once, at process exit.
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Timeouts;
    use std::path::PathBuf;

    #[tokio::test]
    async fn new_context_starts_with_empty_registry() {
        let config = BridgeConfig {
            data_dir: PathBuf::from("/tmp/lsp-bridge-test"),
            log: "info".to_string(),
            notify_file: PathBuf::from("/tmp/lsp-bridge-notify-test.txt"),
            timeouts: Timeouts::default(),
            servers: vec![],
        };
        let ctx = BridgeContext::new(config);
        assert!(ctx.facade.list_workspaces().await.is_empty());
        ctx.shutdown().await;
    }
}
