//! C4 — diagnostics store.
//!
//! Updated exclusively by the `textDocument/publishDiagnostics` notification
//! handler registered in C5; everything else only reads.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::lsp::model::DiagSeverity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub line: u32,
    pub col: u32,
    pub severity: DiagSeverity,
    pub message: String,
    pub source: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticsSummary {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
    pub information: usize,
    pub hints: usize,
}

#[derive(Default)]
pub struct DiagnosticsStore {
    by_uri: RwLock<HashMap<String, Vec<Diagnostic>>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic replace of the diagnostics set for `uri`.
    pub async fn set(&self, uri: &str, diagnostics: Vec<Diagnostic>) {
        self.by_uri.write().await.insert(uri.to_string(), diagnostics);
    }

    /// Snapshot of all (uri, diagnostics) pairs, sorted by uri.
    pub async fn get_all(&self) -> Vec<(String, Vec<Diagnostic>)> {
        let map = self.by_uri.read().await;
        let mut entries: Vec<(String, Vec<Diagnostic>)> =
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub async fn get_for_file(&self, uri: &str) -> Vec<Diagnostic> {
        self.by_uri.read().await.get(uri).cloned().unwrap_or_default()
    }

    pub async fn summary(&self) -> DiagnosticsSummary {
        let map = self.by_uri.read().await;
        let mut summary = DiagnosticsSummary {
            files: map.len(),
            ..Default::default()
        };
        for diagnostics in map.values() {
            for d in diagnostics {
                match d.severity {
                    DiagSeverity::Error => summary.errors += 1,
                    DiagSeverity::Warning => summary.warnings += 1,
                    DiagSeverity::Information => summary.information += 1,
                    DiagSeverity::Hint => summary.hints += 1,
                }
            }
        }
        summary
    }

    /// Drop everything. Called when a session dies unexpectedly.
    pub async fn clear(&self) {
        self.by_uri.write().await.clear();
    }
}
