//! C3 — document store.
//!
//! A pure in-memory map from `file://` URI to the last-known text and LSP
//! version the bridge told the server about. No filesystem access happens
//! here — the session (C5) reads file contents when opening a document on
//! demand and feeds the result in.

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::lsp::error::{LspError, LspResult};

#[derive(Debug, Clone)]
pub struct DocumentEntry {
    pub uri: String,
    pub language_id: String,
    pub version: i64,
    pub text: String,
}

#[derive(Default)]
pub struct DocumentStore {
    documents: RwLock<HashMap<String, DocumentEntry>>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry with version 1 if absent. Idempotent if already
    /// open — returns the existing entry unchanged.
    pub async fn open(&self, uri: &str, language_id: &str, text: String) -> DocumentEntry {
        let mut documents = self.documents.write().await;
        if let Some(existing) = documents.get(uri) {
            return existing.clone();
        }
        let entry = DocumentEntry {
            uri: uri.to_string(),
            language_id: language_id.to_string(),
            version: 1,
            text,
        };
        documents.insert(uri.to_string(), entry.clone());
        entry
    }

    /// Increment the version and replace the text. Errors with *unknown* if
    /// the document was never opened.
    pub async fn update(&self, uri: &str, new_text: String) -> LspResult<i64> {
        let mut documents = self.documents.write().await;
        let entry = documents
            .get_mut(uri)
            .ok_or_else(|| LspError::UnknownWorkspace(uri.to_string()))?;
        entry.version += 1;
        entry.text = new_text;
        Ok(entry.version)
    }

    pub async fn get(&self, uri: &str) -> LspResult<DocumentEntry> {
        self.documents
            .read()
            .await
            .get(uri)
            .cloned()
            .ok_or_else(|| LspError::UnknownWorkspace(uri.to_string()))
    }

    pub async fn is_open(&self, uri: &str) -> bool {
        self.documents.read().await.contains_key(uri)
    }

    /// Drop every entry. Called when a session dies unexpectedly (spec.md
    /// §4.5: "mark all docs unopened").
    pub async fn clear(&self) {
        self.documents.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_version_one() {
        let store = DocumentStore::new();
        let entry = store.open("file:///a.rs", "rust", "fn main() {}".into()).await;
        assert_eq!(entry.version, 1);
        assert_eq!(entry.text, "fn main() {}");
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let store = DocumentStore::new();
        store.open("file:///a.rs", "rust", "one".into()).await;
        let second = store.open("file:///a.rs", "rust", "two".into()).await;
        assert_eq!(second.version, 1);
        assert_eq!(second.text, "one");
    }

    #[tokio::test]
    async fn update_increments_version_and_replaces_text() {
        let store = DocumentStore::new();
        store.open("file:///a.rs", "rust", "one".into()).await;
        let version = store.update("file:///a.rs", "two".into()).await.unwrap();
        assert_eq!(version, 2);
        let entry = store.get("file:///a.rs").await.unwrap();
        assert_eq!(entry.text, "two");
    }

    #[tokio::test]
    async fn update_unknown_document_errors() {
        let store = DocumentStore::new();
        let err = store.update("file:///missing.rs", "x".into()).await.unwrap_err();
        assert!(matches!(err, LspError::UnknownWorkspace(_)));
    }

    #[tokio::test]
    async fn clear_marks_everything_unopened() {
        let store = DocumentStore::new();
        store.open("file:///a.rs", "rust", "one".into()).await;
        store.clear().await;
        assert!(!store.is_open("file:///a.rs").await);
    }
}
