//! C8 — capability facade.
//!
//! One object per process, exposing the language-neutral operations of
//! spec.md §6 as plain async methods. Every operation acquires the named
//! session via the registry (C6), letting the session enforce its own
//! `ready`-wait and error mapping.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::lsp::diagnostics_store::Diagnostic;
use crate::lsp::error::{LspError, LspResult};
use crate::lsp::registry::WorkspaceRegistry;
use crate::lsp::session::{NormalizedLocation, SessionState, SessionStatus};

#[derive(Debug, Serialize)]
pub struct DiagnosticsReport {
    pub errors: usize,
    pub warnings: usize,
    pub by_file: Vec<(String, Vec<Diagnostic>)>,
}

pub struct CapabilityFacade {
    registry: Arc<WorkspaceRegistry>,
}

impl CapabilityFacade {
    pub fn new(registry: Arc<WorkspaceRegistry>) -> Self {
        Self { registry }
    }

    pub async fn list_workspaces(&self) -> Vec<String> {
        self.registry.list().await
    }

    pub async fn get_status(&self, name: &str) -> LspResult<SessionStatus> {
        let session = self.registry.get(name).await?;
        Ok(session.status().await)
    }

    pub async fn get_diagnostics(&self, name: &str, path: Option<&str>) -> LspResult<DiagnosticsReport> {
        let session = self.registry.get(name).await?;
        // `state()` self-heals ready -> dead on an already-observed transport
        // close, so this also catches an unexpected child death that no
        // capability call has surfaced yet (spec.md §8 scenario 6).
        if session.state().await != SessionState::Ready {
            return Err(LspError::Unavailable(format!(
                "{name}: session is not ready"
            )));
        }
        let store = session.diagnostics_store();

        let by_file = match path {
            Some(path) => {
                let uri = crate::lsp::uri::path_to_uri(&PathBuf::from(path));
                vec![(path.to_string(), store.get_for_file(&uri).await)]
            }
            None => store
                .get_all()
                .await
                .into_iter()
                .map(|(uri, diagnostics)| {
                    let path = crate::lsp::uri::uri_to_path(&uri)
                        .map(|p| p.to_string_lossy().to_string())
                        .unwrap_or(uri);
                    (path, diagnostics)
                })
                .collect(),
        };

        let summary = store.summary().await;
        Ok(DiagnosticsReport {
            errors: summary.errors,
            warnings: summary.warnings,
            by_file,
        })
    }

    pub async fn trigger_compilation(
        &self,
        name: &str,
        workspace_root: Option<PathBuf>,
    ) -> LspResult<DiagnosticsReport> {
        let session = self.registry.get_or_connect(name, workspace_root).await?;
        session.trigger_compilation().await?;
        self.get_diagnostics(name, None).await
    }

    pub async fn get_hover(
        &self,
        name: &str,
        path: &str,
        line1: u32,
        char0: u32,
    ) -> LspResult<String> {
        let session = self.registry.get(name).await?;
        session.hover(&PathBuf::from(path), line1, char0).await
    }

    pub async fn get_definition(
        &self,
        name: &str,
        path: &str,
        line1: u32,
        char0: u32,
    ) -> LspResult<Vec<NormalizedLocation>> {
        let session = self.registry.get(name).await?;
        session.definition(&PathBuf::from(path), line1, char0).await
    }
}
