// SPDX-License-Identifier: MIT
//! C5 — LSP session, the protocol heart.
//!
//! One session owns one child language-server process: the codec, the
//! JSON-RPC peer, and this workspace's document/diagnostics stores. Process
//! spawn and pipe wiring follow the teacher's `mcp::client::McpClient::spawn`
//! shape (`Stdio::piped()` for stdin/stdout, a dedicated stderr drain task),
//! generalized from line-delimited MCP framing to `Content-Length`-framed
//! LSP framing.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::BufReader;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;

use crate::config::{ResolvedServer, Timeouts};
use crate::lsp::diagnostics_store::{Diagnostic, DiagnosticsStore};
use crate::lsp::document_store::DocumentStore;
use crate::lsp::error::{LspError, LspResult};
use crate::lsp::model::DiagSeverity;
use crate::lsp::rpc::RpcPeer;
use crate::lsp::uri::{language_id_for_path, path_to_uri, uri_to_path};
use crate::lsp::{codec, snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Unstarted,
    Starting,
    Ready,
    ShuttingDown,
    Dead,
}

pub struct LspSession {
    pub name: String,
    pub workspace_root: std::path::PathBuf,
    command: Vec<String>,
    timeouts: Timeouts,
    state: RwLock<SessionState>,
    peer: RwLock<Option<Arc<RpcPeer>>>,
    child: tokio::sync::Mutex<Option<Child>>,
    documents: DocumentStore,
    diagnostics: Arc<DiagnosticsStore>,
    open_on_server: tokio::sync::Mutex<std::collections::HashSet<String>>,
    request_id: AtomicU32,
}

#[derive(Debug, serde::Serialize)]
pub struct SessionStatus {
    pub name: String,
    pub state: SessionState,
    pub error_count: usize,
    pub warning_count: usize,
    pub open_docs: usize,
}

#[derive(Debug, serde::Serialize)]
pub struct NormalizedLocation {
    pub path: String,
    pub line: u32,
    pub character: u32,
}

impl LspSession {
    pub fn new(server: &ResolvedServer, timeouts: Timeouts) -> Arc<LspSession> {
        Arc::new(LspSession {
            name: server.name.clone(),
            workspace_root: server.workspace_root.clone(),
            command: server.command.clone(),
            timeouts,
            state: RwLock::new(SessionState::Unstarted),
            peer: RwLock::new(None),
            child: tokio::sync::Mutex::new(None),
            documents: DocumentStore::new(),
            diagnostics: Arc::new(DiagnosticsStore::new()),
            open_on_server: tokio::sync::Mutex::new(std::collections::HashSet::new()),
            request_id: AtomicU32::new(1),
        })
    }

    /// Reads the state, self-healing `ready -> dead` if the peer's
    /// dispatcher fiber has already observed the transport close (stdout EOF
    /// or a framing error) but nothing has called `peer()` since to notice.
    /// Without this, an unexpected child death sits invisible until the next
    /// hover/definition/apply_edit call — `getStatus`/`getDiagnostics` must
    /// see it immediately (spec.md §4.5, §8 scenario 6).
    pub async fn state(&self) -> SessionState {
        let current = *self.state.read().await;
        if current == SessionState::Ready {
            let dead = self
                .peer
                .read()
                .await
                .as_ref()
                .map(|p| p.is_dead())
                .unwrap_or(false);
            if dead {
                self.mark_dead().await;
                return SessionState::Dead;
            }
        }
        current
    }

    async fn set_state(&self, new_state: SessionState) {
        *self.state.write().await = new_state;
    }

    /// `unstarted -> starting`: spawn the child, wire up the peer, run the
    /// initialize handshake (spec.md §4.5).
    pub async fn start(self: &Arc<Self>) -> LspResult<()> {
        if *self.state.read().await != SessionState::Unstarted {
            return Ok(());
        }
        self.set_state(SessionState::Starting).await;

        let Some((program, args)) = self.command.split_first() else {
            self.set_state(SessionState::Dead).await;
            return Err(LspError::ConfigError(format!(
                "{}: empty server command",
                self.name
            )));
        };

        let mut child = match Command::new(program)
            .args(args)
            .current_dir(&self.workspace_root)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.set_state(SessionState::Dead).await;
                return Err(LspError::SpawnError(format!("{}: {e}", self.name)));
            }
        };

        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");

        tokio::spawn(codec::drain_stderr(stderr, self.name.clone()));

        let peer = RpcPeer::spawn(BufReader::new(stdout), stdin);
        self.register_notification_handlers(&peer).await;
        self.register_request_handlers(&peer).await;
        *self.peer.write().await = Some(peer.clone());
        *self.child.lock().await = Some(child);

        let init_params = json!({
            "processId": std::process::id(),
            "rootUri": path_to_uri(&self.workspace_root),
            "workspaceFolders": [{
                "uri": path_to_uri(&self.workspace_root),
                "name": self.name,
            }],
            "capabilities": {
                "workspace": { "workspaceFolders": true },
                "textDocument": {
                    "synchronization": { "dynamicRegistration": false },
                    "publishDiagnostics": { "relatedInformation": true },
                    "hover": { "dynamicRegistration": false },
                    "definition": { "dynamicRegistration": false },
                }
            }
        });

        match peer.call("initialize", init_params, self.timeouts.initialize).await {
            Ok(_capabilities) => {
                peer.notify("initialized", json!({})).await.ok();
                self.set_state(SessionState::Ready).await;
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Dead).await;
                Err(e)
            }
        }
    }

    async fn register_notification_handlers(&self, peer: &Arc<RpcPeer>) {
        let diagnostics = self.diagnostics.clone();
        let workspace_root = self.workspace_root.clone();
        peer.on_notification(
            "textDocument/publishDiagnostics",
            Arc::new(move |params: Value| {
                let diagnostics = diagnostics.clone();
                let workspace_root = workspace_root.clone();
                let Some(uri) = params.get("uri").and_then(|u| u.as_str()).map(str::to_string)
                else {
                    return;
                };
                let items = params
                    .get("diagnostics")
                    .and_then(|d| d.as_array())
                    .cloned()
                    .unwrap_or_default();
                let parsed: Vec<Diagnostic> = items
                    .iter()
                    .map(|d| Diagnostic {
                        // LSP lines are 0-indexed; normalize to 1-indexed here
                        // so every capability-facade result agrees (hover and
                        // definition already do the same conversion).
                        line: d
                            .pointer("/range/start/line")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0) as u32
                            + 1,
                        col: d
                            .pointer("/range/start/character")
                            .and_then(|v| v.as_u64())
                            .unwrap_or(0) as u32,
                        severity: d
                            .get("severity")
                            .and_then(|v| v.as_u64())
                            .map(DiagSeverity::from_lsp_int)
                            .unwrap_or(DiagSeverity::Information),
                        message: d
                            .get("message")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        source: d.get("source").and_then(|v| v.as_str()).map(str::to_string),
                        code: d.get("code").and_then(diagnostic_code_as_string),
                    })
                    .collect();
                tokio::spawn(async move {
                    diagnostics.set(&uri, parsed).await;
                    if let Err(e) = snapshot::write_snapshot(&workspace_root, &diagnostics).await {
                        tracing::warn!(error = %e, "failed to write diagnostics snapshot");
                    }
                });
            }),
        )
        .await;

        peer.on_notification(
            "window/logMessage",
            Arc::new(|params: Value| log_window_message(params, "logMessage")),
        )
        .await;
        peer.on_notification(
            "window/showMessage",
            Arc::new(|params: Value| log_window_message(params, "showMessage")),
        )
        .await;
    }

    async fn register_request_handlers(&self, peer: &Arc<RpcPeer>) {
        // window/workDoneProgress/create, workspace/configuration,
        // client/registerCapability all get the generic null response
        // (RpcPeer's default for unregistered methods already does this) —
        // registering explicit no-op handlers here just documents intent and
        // lets workspace/configuration answer with an empty-array shape some
        // servers expect instead of a bare null.
        peer.on_request(
            "workspace/configuration",
            Arc::new(|params: Value| {
                Box::pin(async move {
                    let len = params
                        .get("items")
                        .and_then(|i| i.as_array())
                        .map(|a| a.len())
                        .unwrap_or(0);
                    Value::Array(vec![Value::Null; len])
                })
            }),
        )
        .await;
    }

    /// `ready -> shuttingDown -> dead` (spec.md §4.5).
    pub async fn shutdown(self: &Arc<Self>) -> LspResult<()> {
        let state = self.state().await;
        if state != SessionState::Ready {
            return Ok(());
        }
        self.set_state(SessionState::ShuttingDown).await;

        if let Some(peer) = self.peer.read().await.as_ref() {
            let _ = peer.call("shutdown", Value::Null, Duration::from_secs(5)).await;
            let _ = peer.notify("exit", Value::Null).await;
        }

        if let Some(mut child) = self.child.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
            let _ = child.kill().await;
        }

        self.set_state(SessionState::Dead).await;
        self.documents.clear().await;
        Ok(())
    }

    async fn peer(&self) -> LspResult<Arc<RpcPeer>> {
        let state = self.state().await;
        if state != SessionState::Ready {
            return Err(LspError::Unavailable(format!(
                "{}: session is {:?}",
                self.name, state
            )));
        }
        let guard = self.peer.read().await;
        let peer = guard.as_ref().cloned().ok_or_else(|| {
            LspError::Unavailable(format!("{}: no active peer", self.name))
        })?;
        if peer.is_dead() {
            drop(guard);
            self.mark_dead().await;
            return Err(LspError::Unavailable(format!("{}: transport closed", self.name)));
        }
        Ok(peer)
    }

    async fn mark_dead(&self) {
        self.set_state(SessionState::Dead).await;
        self.documents.clear().await;
        self.diagnostics.clear().await;
    }

    /// Ensure-open: spec.md §4.5.
    pub async fn ensure_open(&self, path: &Path) -> LspResult<()> {
        let uri = path_to_uri(path);
        if self.documents.is_open(&uri).await {
            return Ok(());
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LspError::IoError(format!("{}: {e}", path.display())))?;

        let language_id = language_id_for_path(path);
        let entry = self.documents.open(&uri, language_id, text.clone()).await;

        let peer = self.peer().await?;
        peer.notify(
            "textDocument/didOpen",
            json!({"textDocument": {
                "uri": uri,
                "languageId": language_id,
                "version": entry.version,
                "text": text,
            }}),
        )
        .await?;

        self.open_on_server.lock().await.insert(uri);
        Ok(())
    }

    /// Apply-edit: spec.md §4.5.
    pub async fn apply_edit(&self, path: &Path) -> LspResult<()> {
        self.ensure_open(path).await?;
        let uri = path_to_uri(path);

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LspError::IoError(format!("{}: {e}", path.display())))?;

        let current = self.documents.get(&uri).await?;
        if current.text == text {
            return Ok(());
        }

        let version = self.documents.update(&uri, text.clone()).await?;
        let peer = self.peer().await?;

        peer.notify(
            "textDocument/didChange",
            json!({
                "textDocument": {"uri": uri, "version": version},
                "contentChanges": [{"text": text}],
            }),
        )
        .await?;
        peer.notify(
            "textDocument/didSave",
            json!({"textDocument": {"uri": uri}, "text": text}),
        )
        .await?;
        Ok(())
    }

    /// Trigger compilation: spec.md §4.5.
    pub async fn trigger_compilation(&self) -> LspResult<()> {
        let open_uris: Vec<String> = self.open_on_server.lock().await.iter().cloned().collect();
        let peer = self.peer().await?;

        for uri in open_uris {
            let Some(path) = uri_to_path(&uri) else { continue };
            if let Ok(text) = tokio::fs::read_to_string(&path).await {
                if let Ok(version) = self.documents.update(&uri, text.clone()).await {
                    peer.notify(
                        "textDocument/didChange",
                        json!({
                            "textDocument": {"uri": uri, "version": version},
                            "contentChanges": [{"text": text}],
                        }),
                    )
                    .await?;
                    peer.notify(
                        "textDocument/didSave",
                        json!({"textDocument": {"uri": uri}, "text": text}),
                    )
                    .await?;
                }
            }
        }

        tokio::time::sleep(self.timeouts.compile_wait).await;
        Ok(())
    }

    /// Hover: spec.md §4.5. `line1` is 1-indexed, `char0` is 0-indexed.
    pub async fn hover(&self, path: &Path, line1: u32, char0: u32) -> LspResult<String> {
        self.ensure_open(path).await?;
        let uri = path_to_uri(path);
        let peer = self.peer().await?;

        let result = peer
            .call(
                "textDocument/hover",
                json!({
                    "textDocument": {"uri": uri},
                    "position": {"line": line1.saturating_sub(1), "character": char0},
                }),
                self.timeouts.hover,
            )
            .await?;

        if result.is_null() {
            return Err(LspError::NotFound);
        }

        let contents = result.get("contents").cloned().unwrap_or(Value::Null);
        let text = flatten_hover_contents(&contents);
        if text.is_empty() {
            Err(LspError::NotFound)
        } else {
            Ok(text)
        }
    }

    /// Definition: spec.md §4.5. `line1` is 1-indexed, `char0` is 0-indexed.
    pub async fn definition(
        &self,
        path: &Path,
        line1: u32,
        char0: u32,
    ) -> LspResult<Vec<NormalizedLocation>> {
        self.ensure_open(path).await?;
        let uri = path_to_uri(path);
        let peer = self.peer().await?;

        let result = peer
            .call(
                "textDocument/definition",
                json!({
                    "textDocument": {"uri": uri},
                    "position": {"line": line1.saturating_sub(1), "character": char0},
                }),
                self.timeouts.definition,
            )
            .await?;

        let locations = normalize_definition_result(&result);
        if locations.is_empty() {
            Err(LspError::NotFound)
        } else {
            Ok(locations)
        }
    }

    pub async fn status(&self) -> SessionStatus {
        let summary = self.diagnostics.summary().await;
        SessionStatus {
            name: self.name.clone(),
            state: self.state().await,
            error_count: summary.errors,
            warning_count: summary.warnings,
            open_docs: self.open_on_server.lock().await.len(),
        }
    }

    pub fn diagnostics_store(&self) -> Arc<DiagnosticsStore> {
        self.diagnostics.clone()
    }

    /// Forcibly kill the child process, simulating an unexpected crash
    /// rather than a graceful `shutdown()`. Exercises the self-healing path
    /// in `state()`/`status()` the way a real crash would, instead of the
    /// direct `set_state(Dead)` that `shutdown()` performs. Used by the
    /// end-to-end tests; not called from production code paths.
    pub async fn kill_child_for_test(&self) {
        if let Some(child) = self.child.lock().await.as_mut() {
            let _ = child.kill().await;
        }
    }

    /// Write this session's diagnostics snapshot to
    /// `<workspaceRoot>/.lsp-bridge/diagnostics.json` (spec.md §6).
    pub async fn write_diagnostics_snapshot(&self) -> LspResult<()> {
        snapshot::write_snapshot(&self.workspace_root, &self.diagnostics).await
    }
}

/// LSP's `Diagnostic.code` is `string | integer`; normalize either to a
/// string for the diagnostics store (spec.md §3's `code?` field).
fn diagnostic_code_as_string(code: &Value) -> Option<String> {
    match code {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn log_window_message(params: Value, kind: &'static str) {
    let message = params.get("message").and_then(|m| m.as_str()).unwrap_or_default();
    match params.get("type").and_then(|t| t.as_u64()).unwrap_or(3) {
        1 => tracing::error!(kind, "{}", message),
        2 => tracing::warn!(kind, "{}", message),
        _ => tracing::info!(kind, "{}", message),
    }
}

fn flatten_hover_contents(contents: &Value) -> String {
    match contents {
        Value::String(s) => s.clone(),
        Value::Object(_) => contents
            .get("value")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten_hover_contents)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n"),
        _ => String::new(),
    }
}

fn normalize_definition_result(result: &Value) -> Vec<NormalizedLocation> {
    let items: Vec<&Value> = match result {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![result],
        _ => vec![],
    };

    items
        .into_iter()
        .filter_map(|item| {
            let uri = item
                .get("uri")
                .or_else(|| item.get("targetUri"))
                .and_then(|u| u.as_str())?;
            let range = item.get("range").or_else(|| item.get("targetRange"))?;
            let line = range.pointer("/start/line").and_then(|v| v.as_u64())? as u32;
            let character = range.pointer("/start/character").and_then(|v| v.as_u64())? as u32;
            let path = uri_to_path(uri)?;
            Some(NormalizedLocation {
                path: path.to_string_lossy().to_string(),
                line: line + 1,
                character,
            })
        })
        .collect()
}
