//! C7 — edit watcher.
//!
//! Watches the well-known notify file for changes, using `notify` +
//! `notify-debouncer-full` the way the teacher's `config::ConfigWatcher`
//! watches `config.toml` — same debounce-over-a-parent-directory technique,
//! repurposed from config hot-reload onto this bridge's edit-signal file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_full::notify::{EventKind, RecursiveMode, Watcher as _};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::lsp::registry::WorkspaceRegistry;

const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

pub struct EditWatcher {
    _debouncer: notify_debouncer_full::Debouncer<
        notify_debouncer_full::notify::RecommendedWatcher,
        notify_debouncer_full::FileIdMap,
    >,
    cancel: Arc<tokio_util_cancel::CancelFlag>,
}

impl EditWatcher {
    /// Start watching `notify_file` for changes. Returns `None` if the
    /// watcher could not be created — the bridge still runs, just without
    /// out-of-band edit delivery.
    pub fn start(notify_file: PathBuf, registry: Arc<WorkspaceRegistry>) -> Option<Self> {
        let last_delivered = Arc::new(Mutex::new(String::new()));
        let cancel = Arc::new(tokio_util_cancel::CancelFlag::new());
        let cancel_clone = cancel.clone();
        let rt_handle = tokio::runtime::Handle::current();
        let watch_file = notify_file.clone();

        let debouncer = notify_debouncer_full::new_debouncer(
            DEBOUNCE_WINDOW,
            None,
            move |result: notify_debouncer_full::DebounceEventResult| {
                if cancel_clone.is_cancelled() {
                    return;
                }
                let Ok(events) = result else { return };
                let relevant = events
                    .iter()
                    .any(|e| matches!(e.event.kind, EventKind::Modify(_) | EventKind::Create(_)));
                if !relevant {
                    return;
                }

                let registry = registry.clone();
                let last_delivered = last_delivered.clone();
                let watch_file = watch_file.clone();
                rt_handle.spawn(async move {
                    deliver_latest_path(&watch_file, &registry, &last_delivered).await;
                });
            },
        );

        let mut debouncer = match debouncer {
            Ok(d) => d,
            Err(e) => {
                warn!("edit watcher creation failed: {e} — out-of-band edit signals disabled");
                return None;
            }
        };

        let watch_dir = notify_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if let Err(e) = debouncer.watcher().watch(&watch_dir, RecursiveMode::NonRecursive) {
            warn!("edit watcher failed to start: {e} — out-of-band edit signals disabled");
            return None;
        }

        info!(path = %notify_file.display(), "edit watcher started");
        Some(EditWatcher {
            _debouncer: debouncer,
            cancel,
        })
    }

    /// Cooperative cancellation: stop delivering edits promptly.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

async fn deliver_latest_path(
    notify_file: &Path,
    registry: &Arc<WorkspaceRegistry>,
    last_delivered: &Arc<Mutex<String>>,
) {
    let contents = match tokio::fs::read_to_string(notify_file).await {
        Ok(c) => c,
        Err(_) => return,
    };

    // Last non-empty line only — a batch editor save that rewrites the
    // notify file with several paths in one event is treated as "tell me
    // what's current", not a backlog to drain.
    let Some(path_line) = contents.lines().rev().find(|l| !l.trim().is_empty()) else {
        return;
    };
    let path_line = path_line.trim().to_string();

    {
        let mut last = last_delivered.lock().await;
        if *last == path_line {
            return;
        }
        *last = path_line.clone();
    }

    let path = PathBuf::from(&path_line);
    match registry.find_owning_session(&path).await {
        Some(session) => {
            if let Err(e) = session.apply_edit(&path).await {
                warn!(path = %path_line, error = %e, "applyEdit failed");
            } else {
                debug!(path = %path_line, session = %session.name, "delivered edit");
            }
        }
        None => {
            debug!(path = %path_line, "no workspace owns this path, ignoring");
        }
    }
}

/// A tiny cooperative-cancellation flag — avoids pulling in a dedicated
/// cancellation-token crate for a single boolean.
mod tokio_util_cancel {
    use std::sync::atomic::{AtomicBool, Ordering};

    pub struct CancelFlag(AtomicBool);

    impl CancelFlag {
        pub fn new() -> Self {
            Self(AtomicBool::new(false))
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }
}
