// SPDX-License-Identifier: MIT
//! C6 — workspace registry.
//!
//! A single mutex protects the name→session map; each session guards its own
//! internals, so the registry never holds its lock while calling into a
//! session (spec.md §5 "the registry has its own lock and never calls into a
//! session while holding it").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::{BridgeConfig, ResolvedServer};
use crate::lsp::error::{LspError, LspResult};
use crate::lsp::session::LspSession;

pub struct WorkspaceRegistry {
    config: BridgeConfig,
    sessions: Mutex<HashMap<String, Arc<LspSession>>>,
}

impl WorkspaceRegistry {
    pub fn new(config: BridgeConfig) -> Arc<WorkspaceRegistry> {
        Arc::new(WorkspaceRegistry {
            config,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// `get(name)` — returns the existing session, starting it on first use.
    pub async fn get(&self, name: &str) -> LspResult<Arc<LspSession>> {
        let existing = {
            let sessions = self.sessions.lock().await;
            sessions.get(name).cloned()
        };
        if let Some(session) = existing {
            return Ok(session);
        }

        let server = self
            .config
            .server(name)
            .cloned()
            .ok_or_else(|| LspError::UnknownWorkspace(name.to_string()))?;

        self.start_and_insert(server).await
    }

    /// `getOrConnect(name, workspaceRoot?)` — if `name` exists, return it;
    /// else, if `workspaceRoot` is supplied, synthesize a default config and
    /// start a new session.
    pub async fn get_or_connect(
        &self,
        name: &str,
        workspace_root: Option<PathBuf>,
    ) -> LspResult<Arc<LspSession>> {
        if let Some(session) = self.sessions.lock().await.get(name).cloned() {
            return Ok(session);
        }

        if let Some(server) = self.config.server(name).cloned() {
            return self.start_and_insert(server).await;
        }

        let workspace_root =
            workspace_root.ok_or_else(|| LspError::UnknownWorkspace(name.to_string()))?;
        let extension = find_primary_extension(&workspace_root);
        let language = extension.map(crate::lsp::uri::language_id_for_extension);
        let builtins = crate::lsp::model::LspConfig::builtin_defaults();
        let command = language
            .and_then(|lang| builtins.iter().find(|c| c.language == lang))
            .map(|c| {
                let mut cmd = c.server_command.clone();
                cmd.extend(c.server_args.clone());
                cmd
            })
            .ok_or_else(|| {
                LspError::ConfigError(format!(
                    "{name}: no language server could be inferred for {}",
                    workspace_root.display()
                ))
            })?;

        let server = ResolvedServer {
            name: name.to_string(),
            workspace_root,
            command,
        };
        self.start_and_insert(server).await
    }

    async fn start_and_insert(&self, server: ResolvedServer) -> LspResult<Arc<LspSession>> {
        let session = LspSession::new(&server, self.config.timeouts);
        session.start().await?;
        self.sessions
            .lock()
            .await
            .insert(server.name.clone(), session.clone());
        Ok(session)
    }

    /// `list()` — sorted workspace names.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Find the session whose `workspaceRoot` is a path prefix of `path`,
    /// for the edit watcher (C7) to deliver a notify-file path to.
    pub async fn find_owning_session(&self, path: &std::path::Path) -> Option<Arc<LspSession>> {
        let sessions = self.sessions.lock().await;
        sessions
            .values()
            .find(|s| path.starts_with(&s.workspace_root))
            .cloned()
    }

    /// `shutdownAll()` — graceful shutdown bounded by a per-session timeout,
    /// forced kill afterwards (the session's own `shutdown()` already does
    /// the forced-kill fallback internally).
    pub async fn shutdown_all(&self) {
        let sessions: Vec<Arc<LspSession>> = self.sessions.lock().await.values().cloned().collect();
        for session in sessions {
            let name = session.name.clone();
            if tokio::time::timeout(Duration::from_secs(10), session.shutdown())
                .await
                .is_err()
            {
                tracing::warn!(session = %name, "shutdown timed out");
            }
        }
        self.sessions.lock().await.clear();
    }
}

fn find_primary_extension(workspace_root: &std::path::Path) -> Option<&'static str> {
    let entries = std::fs::read_dir(workspace_root).ok()?;
    for entry in entries.flatten() {
        if let Some(ext) = entry.path().extension().and_then(|e| e.to_str()) {
            let ext = ext.to_string();
            if crate::lsp::uri::language_id_for_extension(&ext) != "plaintext" {
                return Some(match ext.as_str() {
                    "rs" => "rs",
                    "ts" | "tsx" => "ts",
                    "js" | "jsx" | "mjs" => "js",
                    "py" => "py",
                    "go" => "go",
                    "scala" => "scala",
                    _ => continue,
                });
            }
        }
    }
    None
}
