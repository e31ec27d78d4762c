// SPDX-License-Identifier: MIT OR Apache-2.0
//! Debounced watching of a single graph document.
//!
//! The parent directory is watched so that editors which replace the file
//! on save are still picked up.

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, EventKind, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Watches one document and reports when it changes on disk
pub struct GraphWatcher {
    _watcher: Debouncer<RecommendedWatcher, RecommendedCache>,
    event_rx: Receiver<Result<(), String>>,
    path: PathBuf,
}

impl GraphWatcher {
    /// Start watching `path`
    pub fn new(path: &Path, debounce: Duration) -> Result<Self, notify::Error> {
        let path = std::path::absolute(path)?;
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let target = path.clone();
        let (event_tx, event_rx) = mpsc::channel();

        let mut watcher = new_debouncer(debounce, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let touched = events.iter().any(|event| {
                        matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_)
                        ) && event.paths.iter().any(|p| p == &target)
                    });
                    if touched {
                        let _ = event_tx.send(Ok(()));
                    }
                }
                Err(errors) => {
                    for error in errors {
                        let _ = event_tx.send(Err(error.to_string()));
                    }
                }
            }
        })?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "watching graph document");

        Ok(Self {
            _watcher: watcher,
            event_rx,
            path,
        })
    }

    /// Watched document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the document changes
    ///
    /// Returns `false` once the watcher has shut down.
    pub fn wait_for_change(&self) -> bool {
        loop {
            match self.event_rx.recv() {
                Ok(Ok(())) => return true,
                Ok(Err(err)) => tracing::warn!(%err, "file watch error"),
                Err(_) => return false,
            }
        }
    }

    /// Wait up to `timeout` for a change
    pub fn poll_change(&self, timeout: Duration) -> bool {
        match self.event_rx.recv_timeout(timeout) {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                tracing::warn!(%err, "file watch error");
                false
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_creation() {
        let dir = std::env::temp_dir().join(format!("procgraph-watch-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("graph.json");
        std::fs::write(&file, "{}").unwrap();

        let watcher = GraphWatcher::new(&file, Duration::from_millis(50)).unwrap();
        assert!(watcher.path().ends_with("graph.json"));
        assert!(!watcher.poll_change(Duration::from_millis(10)));

        drop(watcher);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
