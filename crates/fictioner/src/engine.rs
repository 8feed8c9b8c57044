//! Scan scheduling and snapshot handoff
//!
//! The engine owns the published [`Snapshot`]. Every scan builds a fresh
//! snapshot off the async runtime and swaps it in whole, so readers never see
//! a half-built model. When scans overlap, only the most recently requested
//! one is published.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use fictioner_core::{Cursor, RelatedRecord, Snapshot, resolve_related, resolve_related_in};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What became of one scan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan finished and is now the current snapshot
    Published {
        generation: u64,
        elapsed: Duration,
        files: usize,
        tags: usize,
    },
    /// A newer scan was requested while this one ran; its result was dropped
    Superseded { generation: u64 },
    /// The scan failed; the previous snapshot stays current
    Failed { generation: u64, message: String },
}

impl ScanOutcome {
    pub fn generation(&self) -> u64 {
        match self {
            ScanOutcome::Published { generation, .. }
            | ScanOutcome::Superseded { generation }
            | ScanOutcome::Failed { generation, .. } => *generation,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, ScanOutcome::Published { .. })
    }
}

/// Owner of the current snapshot.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct Engine {
    root: PathBuf,
    config_path: PathBuf,
    /// Current snapshot, broadcast to subscribers on every publish
    published: watch::Sender<Arc<Snapshot>>,
    /// Generation of the most recently requested scan
    requested: AtomicU64,
    /// Message of the last failed scan, cleared by the next publish
    error: Mutex<Option<String>>,
}

impl Engine {
    /// Create an engine holding an empty snapshot; call [`Engine::scan`] to
    /// load the corpus.
    pub fn new(root: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let (published, _) = watch::channel(Arc::new(Snapshot::empty(&root)));
        Self {
            root,
            config_path: config_path.into(),
            published,
            requested: AtomicU64::new(0),
            error: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The snapshot readers should use right now.
    pub fn current(&self) -> Arc<Snapshot> {
        self.published.borrow().clone()
    }

    /// Receiver notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.published.subscribe()
    }

    /// Message of the last failed scan, if the latest scan failed.
    pub fn error(&self) -> Option<String> {
        self.error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rescan the corpus and publish the result if it is still the latest.
    ///
    /// Never fails: errors are reported through the outcome and
    /// [`Engine::error`], and the previous snapshot is kept.
    pub async fn scan(&self) -> ScanOutcome {
        let generation = self.requested.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();
        debug!("Starting scan (generation {})", generation);

        let root = self.root.clone();
        let config_path = self.config_path.clone();
        let result = tokio::task::spawn_blocking(move || {
            Snapshot::load(&root, &config_path, generation).map_err(|e| e.to_string())
        })
        .await
        .unwrap_or_else(|e| Err(format!("scan task failed: {e}")));

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let message = format!("Error scanning document: {e}");
                warn!("{} (generation {})", message, generation);
                if self.is_latest(generation) {
                    *self.error.lock().unwrap_or_else(PoisonError::into_inner) =
                        Some(message.clone());
                }
                return ScanOutcome::Failed {
                    generation,
                    message,
                };
            }
        };

        let files = snapshot.files().len();
        let tags = snapshot.tags().len();
        let snapshot = Arc::new(snapshot);
        let published = self.published.send_if_modified(|current| {
            if self.is_latest(generation) && current.generation() < generation {
                *current = snapshot;
                true
            } else {
                false
            }
        });

        if !published {
            debug!("Dropping superseded scan (generation {})", generation);
            return ScanOutcome::Superseded { generation };
        }

        *self.error.lock().unwrap_or_else(PoisonError::into_inner) = None;
        let elapsed = start.elapsed();
        info!(
            "Published snapshot in {:?} (generation {}, {} files, {} tags)",
            elapsed, generation, files, tags
        );
        ScanOutcome::Published {
            generation,
            elapsed,
            files,
            tags,
        }
    }

    /// Related tags for a cursor, resolved against the current snapshot.
    pub fn related(&self, cursor: &Cursor) -> Vec<RelatedRecord> {
        let snapshot = self.current();
        resolve_related(&snapshot, cursor)
    }

    /// Like [`Engine::related`], but reading lines from an unsaved buffer.
    pub fn related_in<S: AsRef<str>>(&self, cursor: &Cursor, lines: &[S]) -> Vec<RelatedRecord> {
        let snapshot = self.current();
        resolve_related_in(&snapshot, cursor, lines)
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.requested.load(Ordering::SeqCst) == generation
    }
}
