//! File watching for watch mode
//!
//! Only the directories named by each pattern's literal prefix are watched,
//! not the whole workspace. The configuration file's directory is always
//! watched; a change to the configuration asks the caller to re-derive the
//! watched set with [`CorpusWatcher::reconfigure`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, WrapErr};
use fictioner_core::FictionConfig;
use fictioner_core::tree::literal_prefix;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Default quiet period before a burst of events triggers a rescan.
pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Events sent from the watcher to the rescan loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Files under a watched directory changed
    CorpusChanged(Vec<PathBuf>),
    /// The configuration file changed
    ConfigChanged,
}

/// Events merged over one debounce window
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchBatch {
    pub paths: BTreeSet<PathBuf>,
    pub config_changed: bool,
}

impl WatchBatch {
    fn push(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::CorpusChanged(paths) => self.paths.extend(paths),
            WatchEvent::ConfigChanged => self.config_changed = true,
        }
    }
}

/// Wait for an event, then keep collecting until `debounce` passes quietly.
///
/// Returns `None` once the sending side is gone.
pub async fn next_batch(
    rx: &mut mpsc::UnboundedReceiver<WatchEvent>,
    debounce: Duration,
) -> Option<WatchBatch> {
    let mut batch = WatchBatch::default();
    batch.push(rx.recv().await?);
    loop {
        match tokio::time::timeout(debounce, rx.recv()).await {
            Ok(Some(event)) => batch.push(event),
            Ok(None) | Err(_) => return Some(batch),
        }
    }
}

/// Directory to watch for a wildcard pattern.
///
/// ```ignore
/// glob_to_watch_dir("part1/**/*.md") => "part1"
/// glob_to_watch_dir("*.md") => "."
/// glob_to_watch_dir("chapters/ch1.md") => "chapters/ch1.md"
/// ```
pub fn glob_to_watch_dir(pattern: &str) -> PathBuf {
    let prefix = literal_prefix(&pattern.replace('\\', "/"));
    if prefix.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        prefix
    }
}

/// Existing directories to watch for every pattern in the configuration.
///
/// A literal file pattern watches the file's parent so that editors which
/// replace files on save are still seen.
pub fn watch_dirs(root: &Path, config: &FictionConfig) -> BTreeSet<PathBuf> {
    let mut dirs = BTreeSet::new();
    for pattern in config.contents.patterns() {
        let full_path = root.join(glob_to_watch_dir(pattern));
        let dir = if full_path.is_file() {
            full_path.parent().map(Path::to_path_buf).unwrap_or(full_path)
        } else {
            full_path
        };
        match dir.canonicalize() {
            Ok(canonical) => {
                dirs.insert(canonical);
            }
            Err(_) => debug!("Watch directory does not exist (yet): {}", dir.display()),
        }
    }

    // drop directories already covered by a recursive watch on an ancestor
    let all: Vec<_> = dirs.iter().cloned().collect();
    dirs.retain(|dir| !all.iter().any(|other| other != dir && dir.starts_with(other)));
    dirs
}

/// Watches the corpus directories and the configuration file.
pub struct CorpusWatcher {
    watcher: RecommendedWatcher,
    root: PathBuf,
    config_dir: PathBuf,
    watched: BTreeMap<PathBuf, RecursiveMode>,
}

impl CorpusWatcher {
    /// Start watching the configuration file; call
    /// [`CorpusWatcher::reconfigure`] to add the corpus directories.
    pub fn new(
        root: &Path,
        config_path: &Path,
        tx: mpsc::UnboundedSender<WatchEvent>,
    ) -> Result<Self> {
        let config_dir = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let config_dir = config_dir.canonicalize().wrap_err_with(|| {
            format!("Failed to resolve config directory {}", config_dir.display())
        })?;
        let config_name = config_path
            .file_name()
            .ok_or_else(|| eyre::eyre!("Config path {} has no file name", config_path.display()))?
            .to_owned();

        let config_file = config_dir.join(&config_name);
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("File watcher error: {}", e);
                    return;
                }
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            let (config, corpus): (Vec<_>, Vec<_>) =
                event.paths.into_iter().partition(|p| *p == config_file);
            if !config.is_empty() {
                let _ = tx.send(WatchEvent::ConfigChanged);
            }
            if !corpus.is_empty() {
                let _ = tx.send(WatchEvent::CorpusChanged(corpus));
            }
        })
        .wrap_err("Failed to create file watcher")?;

        let mut manager = Self {
            watcher,
            root: root.to_path_buf(),
            config_dir,
            watched: BTreeMap::new(),
        };
        manager.apply(BTreeMap::from([(
            manager.config_dir.clone(),
            RecursiveMode::NonRecursive,
        )]));
        info!("Watching config file: {}", config_path.display());
        Ok(manager)
    }

    /// Re-derive the watched directories from a (new) configuration.
    pub fn reconfigure(&mut self, config: &FictionConfig) {
        let mut wanted: BTreeMap<_, _> = watch_dirs(&self.root, config)
            .into_iter()
            .map(|dir| (dir, RecursiveMode::Recursive))
            .collect();
        if !wanted.keys().any(|dir| self.config_dir.starts_with(dir)) {
            wanted.insert(self.config_dir.clone(), RecursiveMode::NonRecursive);
        }
        self.apply(wanted);
    }

    /// Currently watched directories, sorted.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        self.watched.keys().cloned().collect()
    }

    fn apply(&mut self, wanted: BTreeMap<PathBuf, RecursiveMode>) {
        let stale: Vec<_> = self
            .watched
            .iter()
            .filter(|(dir, mode)| wanted.get(*dir) != Some(*mode))
            .map(|(dir, _)| dir.clone())
            .collect();
        for dir in &stale {
            if let Err(e) = self.watcher.unwatch(dir) {
                // not fatal, the directory may be gone
                debug!("Failed to unwatch {}: {}", dir.display(), e);
            }
            self.watched.remove(dir);
        }

        for (dir, mode) in wanted {
            if self.watched.contains_key(&dir) {
                continue;
            }
            match self.watcher.watch(&dir, mode) {
                Ok(()) => {
                    debug!("Watching directory: {} ({:?})", dir.display(), mode);
                    self.watched.insert(dir, mode);
                }
                Err(e) => warn!("Failed to watch {}: {}", dir.display(), e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_to_watch_dir_stops_at_wildcards() {
        assert_eq!(glob_to_watch_dir("part1/**/*.md"), PathBuf::from("part1"));
        assert_eq!(glob_to_watch_dir("a/b/ch?.md"), PathBuf::from("a/b"));
        assert_eq!(glob_to_watch_dir("notes/[ab].md"), PathBuf::from("notes"));
    }

    #[test]
    fn glob_to_watch_dir_root_pattern() {
        assert_eq!(glob_to_watch_dir("*.md"), PathBuf::from("."));
    }

    #[test]
    fn glob_to_watch_dir_literal_path() {
        assert_eq!(glob_to_watch_dir("ch/one.md"), PathBuf::from("ch/one.md"));
    }

    #[tokio::test]
    async fn batches_merge_until_quiet() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(WatchEvent::CorpusChanged(vec!["a.md".into()])).unwrap();
        tx.send(WatchEvent::ConfigChanged).unwrap();
        tx.send(WatchEvent::CorpusChanged(vec!["b.md".into(), "a.md".into()]))
            .unwrap();

        let batch = next_batch(&mut rx, Duration::from_millis(20)).await.unwrap();
        assert!(batch.config_changed);
        assert_eq!(batch.paths.len(), 2);

        drop(tx);
        assert!(next_batch(&mut rx, Duration::from_millis(20)).await.is_none());
    }
}
