// SPDX-License-Identifier: MIT
/// LSP server configuration model.
///
/// Kept from the original daemon's LSP data model: per-language command
/// tables and severity mapping are exactly the shape this bridge's own
/// config needs (spec.md §3), independent of what else changed around them.
use serde::{Deserialize, Serialize};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Per-language LSP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspConfig {
    /// Human-readable language name (e.g. `"rust"`, `"typescript"`, `"dart"`).
    pub language: String,
    /// The executable to launch (e.g. `"rust-analyzer"`, `"typescript-language-server"`).
    pub server_command: Vec<String>,
    /// Extra command-line arguments passed after the executable name.
    pub server_args: Vec<String>,
    /// File extensions this server handles (e.g. `[".rs"]`, `[".ts", ".tsx"]`).
    pub file_extensions: Vec<String>,
}

impl LspConfig {
    /// Built-in configs for common language servers, overridable via
    /// `servers.toml`.
    pub fn builtin_defaults() -> Vec<LspConfig> {
        vec![
            LspConfig {
                language: "rust".into(),
                server_command: vec!["rust-analyzer".into()],
                server_args: vec![],
                file_extensions: vec![".rs".into()],
            },
            LspConfig {
                language: "typescript".into(),
                server_command: vec!["typescript-language-server".into()],
                server_args: vec!["--stdio".into()],
                file_extensions: vec![".ts".into(), ".tsx".into()],
            },
            LspConfig {
                language: "javascript".into(),
                server_command: vec!["typescript-language-server".into()],
                server_args: vec!["--stdio".into()],
                file_extensions: vec![".js".into(), ".jsx".into(), ".mjs".into()],
            },
            LspConfig {
                language: "go".into(),
                server_command: vec!["gopls".into()],
                server_args: vec![],
                file_extensions: vec![".go".into()],
            },
            LspConfig {
                language: "python".into(),
                server_command: vec!["pylsp".into()],
                server_args: vec![],
                file_extensions: vec![".py".into()],
            },
            LspConfig {
                language: "scala".into(),
                server_command: vec!["metals".into()],
                server_args: vec![],
                file_extensions: vec![".scala".into()],
            },
        ]
    }

    /// Detect which language server config applies to a file by its extension.
    pub fn for_extension<'a>(configs: &'a [LspConfig], ext: &str) -> Option<&'a LspConfig> {
        configs
            .iter()
            .find(|c| c.file_extensions.iter().any(|e| e.as_str() == ext))
    }
}

// ─── Diagnostics ─────────────────────────────────────────────────────────────

/// Severity levels matching LSP `DiagnosticSeverity` (1-based in LSP spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagSeverity {
    Error,
    Warning,
    Information,
    Hint,
}

impl DiagSeverity {
    /// Parse from an LSP integer value (1 = error, 2 = warning, 3 = info, 4 = hint).
    pub fn from_lsp_int(n: u64) -> Self {
        match n {
            1 => DiagSeverity::Error,
            2 => DiagSeverity::Warning,
            3 => DiagSeverity::Information,
            4 => DiagSeverity::Hint,
            _ => DiagSeverity::Information,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults_covers_common_languages() {
        let defaults = LspConfig::builtin_defaults();
        let languages: Vec<&str> = defaults.iter().map(|c| c.language.as_str()).collect();
        assert!(languages.contains(&"rust"));
        assert!(languages.contains(&"typescript"));
        assert!(languages.contains(&"python"));
    }

    #[test]
    fn for_extension_finds_rust() {
        let configs = LspConfig::builtin_defaults();
        let cfg = LspConfig::for_extension(&configs, ".rs").expect("should find .rs config");
        assert_eq!(cfg.language, "rust");
        assert_eq!(cfg.server_command, vec!["rust-analyzer"]);
    }

    #[test]
    fn for_extension_finds_typescript_tsx() {
        let configs = LspConfig::builtin_defaults();
        let cfg = LspConfig::for_extension(&configs, ".tsx").expect("should find .tsx config");
        assert_eq!(cfg.language, "typescript");
    }

    #[test]
    fn for_extension_returns_none_for_unknown() {
        let configs = LspConfig::builtin_defaults();
        assert!(LspConfig::for_extension(&configs, ".java").is_none());
    }

    #[test]
    fn diag_severity_from_lsp_int_maps_correctly() {
        assert_eq!(DiagSeverity::from_lsp_int(1), DiagSeverity::Error);
        assert_eq!(DiagSeverity::from_lsp_int(2), DiagSeverity::Warning);
        assert_eq!(DiagSeverity::from_lsp_int(3), DiagSeverity::Information);
        assert_eq!(DiagSeverity::from_lsp_int(4), DiagSeverity::Hint);
    }

    #[test]
    fn diag_severity_unknown_int_falls_back_to_info() {
        assert_eq!(DiagSeverity::from_lsp_int(99), DiagSeverity::Information);
        assert_eq!(DiagSeverity::from_lsp_int(0), DiagSeverity::Information);
    }
}
