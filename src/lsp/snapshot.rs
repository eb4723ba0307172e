//! Persisted diagnostics snapshot — `<workspaceRoot>/.lsp-bridge/diagnostics.json`
//! (spec.md §6), rewritten atomically (write to temp, rename) whenever a
//! session's diagnostics store changes.

use crate::lsp::diagnostics_store::DiagnosticsStore;
use crate::lsp::error::{LspError, LspResult};
use crate::lsp::model::DiagSeverity;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct SnapshotSummary {
    total_files: usize,
    total_diagnostics: usize,
    errors: usize,
    warnings: usize,
    info: usize,
}

#[derive(Serialize)]
struct SnapshotDiagnostic {
    severity: &'static str,
    line: u32,
    character: u32,
    message: String,
    source: String,
    code: String,
}

#[derive(Serialize)]
struct Snapshot {
    summary: SnapshotSummary,
    by_file: std::collections::BTreeMap<String, Vec<SnapshotDiagnostic>>,
    error_count: usize,
    warning_count: usize,
    updated_at: String,
}

fn severity_label(severity: DiagSeverity) -> &'static str {
    match severity {
        DiagSeverity::Error => "ERROR",
        DiagSeverity::Warning => "WARNING",
        DiagSeverity::Information => "INFO",
        DiagSeverity::Hint => "HINT",
    }
}

/// Build and atomically write the snapshot file for `workspace_root`.
pub async fn write_snapshot(workspace_root: &Path, store: &DiagnosticsStore) -> LspResult<()> {
    let summary = store.summary().await;
    let all = store.get_all().await;

    let mut by_file = std::collections::BTreeMap::new();
    for (uri, diagnostics) in &all {
        let path = crate::lsp::uri::uri_to_path(uri)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|| uri.clone());
        let entries = diagnostics
            .iter()
            .map(|d| SnapshotDiagnostic {
                severity: severity_label(d.severity),
                line: d.line,
                character: d.col,
                message: d.message.clone(),
                source: d.source.clone().unwrap_or_default(),
                code: d.code.clone().unwrap_or_default(),
            })
            .collect();
        by_file.insert(path, entries);
    }

    let snapshot = Snapshot {
        summary: SnapshotSummary {
            total_files: summary.files,
            total_diagnostics: summary.errors + summary.warnings + summary.information + summary.hints,
            errors: summary.errors,
            warnings: summary.warnings,
            info: summary.information,
        },
        by_file,
        error_count: summary.errors,
        warning_count: summary.warnings,
        updated_at: chrono::Utc::now().to_rfc3339(),
    };

    let dir = workspace_root.join(".lsp-bridge");
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| LspError::IoError(format!("{}: {e}", dir.display())))?;

    let final_path = dir.join("diagnostics.json");
    let tmp_path = dir.join("diagnostics.json.tmp");

    let body = serde_json::to_vec_pretty(&snapshot)
        .map_err(|e| LspError::IoError(format!("serializing snapshot: {e}")))?;

    tokio::fs::write(&tmp_path, body)
        .await
        .map_err(|e| LspError::IoError(format!("{}: {e}", tmp_path.display())))?;
    tokio::fs::rename(&tmp_path, &final_path)
        .await
        .map_err(|e| LspError::IoError(format!("{}: {e}", final_path.display())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::diagnostics_store::Diagnostic;

    #[tokio::test]
    async fn writes_valid_json_with_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticsStore::new();
        store
            .set(
                "file:///w/src/App.scala",
                vec![Diagnostic {
                    line: 10,
                    col: 4,
                    severity: DiagSeverity::Error,
                    message: "type mismatch".to_string(),
                    source: Some("metals".to_string()),
                    code: Some("E0308".to_string()),
                }],
            )
            .await;

        write_snapshot(dir.path(), &store).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join(".lsp-bridge/diagnostics.json"))
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["error_count"], 1);
        assert_eq!(parsed["summary"]["errors"], 1);
        let by_file = parsed["by_file"].as_object().unwrap();
        assert_eq!(by_file.len(), 1);
        let entry = &by_file["/w/src/App.scala"][0];
        assert_eq!(entry["code"], "E0308");
    }

    #[tokio::test]
    async fn empty_store_produces_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiagnosticsStore::new();
        write_snapshot(dir.path(), &store).await.unwrap();

        let content = tokio::fs::read_to_string(dir.path().join(".lsp-bridge/diagnostics.json"))
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["error_count"], 0);
        assert_eq!(parsed["summary"]["total_files"], 0);
    }
}
