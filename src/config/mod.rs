//! Bridge configuration — precedence CLI/env over TOML file over built-in
//! default, the same layering `clawd`'s daemon config used, adapted from a
//! single-process daemon's port/session knobs to this bridge's workspace
//! server table and protocol timeouts.

use crate::lsp::model::LspConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

const DEFAULT_LOG: &str = "info";
const DEFAULT_NOTIFY_FILE: &str = "/tmp/lsp-bridge-notify.txt";
const DEFAULT_INITIALIZE_SECS: u64 = 30;
const DEFAULT_HOVER_SECS: u64 = 10;
const DEFAULT_DEFINITION_SECS: u64 = 10;
const DEFAULT_COMPILE_WAIT_SECS: u64 = 60;

// ─── TOML config file ─────────────────────────────────────────────────────────

/// One entry in `servers.toml`'s `[[server]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerEntry {
    /// Workspace name this session is registered under (spec.md §4.6).
    pub name: String,
    /// Absolute path to the workspace root.
    pub workspace_root: PathBuf,
    /// Language name, used to look up a built-in command if `command` is
    /// omitted (e.g. `"rust"`, `"scala"`).
    pub language: Option<String>,
    /// Explicit command override; takes precedence over the built-in table.
    pub command: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct TomlConfig {
    log: Option<String>,
    notify_file: Option<PathBuf>,
    initialize_timeout_secs: Option<u64>,
    hover_timeout_secs: Option<u64>,
    definition_timeout_secs: Option<u64>,
    compile_wait_secs: Option<u64>,
    #[serde(rename = "server", default)]
    servers: Vec<ServerEntry>,
}

fn load_toml(data_dir: &Path) -> Option<TomlConfig> {
    let path = data_dir.join("servers.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse servers.toml — using defaults");
            None
        }
    }
}

// ─── Resolved config ──────────────────────────────────────────────────────────

/// A fully-resolved per-workspace server configuration, command resolved
/// against the built-in per-language table when not given explicitly.
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub name: String,
    pub workspace_root: PathBuf,
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub initialize: Duration,
    pub hover: Duration,
    pub definition: Duration,
    pub compile_wait: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            initialize: Duration::from_secs(DEFAULT_INITIALIZE_SECS),
            hover: Duration::from_secs(DEFAULT_HOVER_SECS),
            definition: Duration::from_secs(DEFAULT_DEFINITION_SECS),
            compile_wait: Duration::from_secs(DEFAULT_COMPILE_WAIT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub data_dir: PathBuf,
    pub log: String,
    pub notify_file: PathBuf,
    pub timeouts: Timeouts,
    pub servers: Vec<ResolvedServer>,
}

impl BridgeConfig {
    /// Build config from CLI/env args + optional `{data_dir}/servers.toml`.
    ///
    /// Priority (highest to lowest): CLI/env, TOML file, built-in default.
    pub fn new(data_dir: Option<PathBuf>, log: Option<String>, notify_file: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let toml = load_toml(&data_dir).unwrap_or_default();

        let log = log.or(toml.log).unwrap_or_else(|| DEFAULT_LOG.to_string());

        let notify_file = notify_file
            .or(toml.notify_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_NOTIFY_FILE));

        let timeouts = Timeouts {
            initialize: Duration::from_secs(
                toml.initialize_timeout_secs.unwrap_or(DEFAULT_INITIALIZE_SECS),
            ),
            hover: Duration::from_secs(toml.hover_timeout_secs.unwrap_or(DEFAULT_HOVER_SECS)),
            definition: Duration::from_secs(
                toml.definition_timeout_secs.unwrap_or(DEFAULT_DEFINITION_SECS),
            ),
            compile_wait: Duration::from_secs(
                toml.compile_wait_secs.unwrap_or(DEFAULT_COMPILE_WAIT_SECS),
            ),
        };

        let builtins = LspConfig::builtin_defaults();
        let servers = toml
            .servers
            .into_iter()
            .filter_map(|entry| resolve_server(entry, &builtins))
            .collect();

        Self {
            data_dir,
            log,
            notify_file,
            timeouts,
            servers,
        }
    }

    pub fn server(&self, name: &str) -> Option<&ResolvedServer> {
        self.servers.iter().find(|s| s.name == name)
    }
}

fn resolve_server(entry: ServerEntry, builtins: &[LspConfig]) -> Option<ResolvedServer> {
    let command = match entry.command {
        Some(cmd) if !cmd.is_empty() => cmd,
        _ => {
            let language = entry.language.as_deref()?;
            let builtin = builtins.iter().find(|c| c.language == language)?;
            let mut cmd = builtin.server_command.clone();
            cmd.extend(builtin.server_args.clone());
            cmd
        }
    };
    if command.is_empty() {
        warn!(name = %entry.name, "server entry has no resolvable command, skipping");
        return None;
    }
    Some(ResolvedServer {
        name: entry.name,
        workspace_root: entry.workspace_root,
        command,
    })
}

fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("lsp-bridge");
        }
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
            return PathBuf::from(xdg).join("lsp-bridge");
        }
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join(".local")
                .join("share")
                .join("lsp-bridge");
        }
    }
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata).join("lsp-bridge");
        }
    }
    PathBuf::from(".lsp-bridge")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_server_uses_explicit_command() {
        let entry = ServerEntry {
            name: "metals".into(),
            workspace_root: "/w".into(),
            language: None,
            command: Some(vec!["metals-stub".into()]),
        };
        let resolved = resolve_server(entry, &LspConfig::builtin_defaults()).unwrap();
        assert_eq!(resolved.command, vec!["metals-stub"]);
    }

    #[test]
    fn resolve_server_falls_back_to_builtin_by_language() {
        let entry = ServerEntry {
            name: "main".into(),
            workspace_root: "/w".into(),
            language: Some("rust".into()),
            command: None,
        };
        let resolved = resolve_server(entry, &LspConfig::builtin_defaults()).unwrap();
        assert_eq!(resolved.command, vec!["rust-analyzer"]);
    }

    #[test]
    fn resolve_server_with_no_command_or_language_is_skipped() {
        let entry = ServerEntry {
            name: "broken".into(),
            workspace_root: "/w".into(),
            language: None,
            command: None,
        };
        assert!(resolve_server(entry, &LspConfig::builtin_defaults()).is_none());
    }

    #[test]
    fn default_timeouts_match_spec() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.initialize, Duration::from_secs(30));
        assert_eq!(timeouts.hover, Duration::from_secs(10));
        assert_eq!(timeouts.definition, Duration::from_secs(10));
        assert_eq!(timeouts.compile_wait, Duration::from_secs(60));
    }
}
