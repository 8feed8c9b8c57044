//! fictioner library - Cross-reference checking for manuscripts
//!
//! This library exposes the pieces behind the `fictioner` binary for testing
//! and embedding: the [`engine::Engine`] that owns the current snapshot, the
//! file watcher and the output renderers.

pub mod engine;
pub mod output;
pub mod watcher;

use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use fictioner_core::CONFIG_FILE_NAME;

/// Config path for a workspace: the explicit one if given, else
/// `fiction.json` at the root.
pub fn config_path(root: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| root.join(CONFIG_FILE_NAME))
}

/// Write a starter config titled after the root directory, with empty
/// contents. Returns `false` and leaves the file alone if it already exists.
pub fn init_config(root: &Path, config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        return Ok(false);
    }
    let title = root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());
    let config = serde_json::json!({ "title": title, "contents": [] });
    let text = serde_json::to_string_pretty(&config)?;
    std::fs::write(config_path, text + "\n")
        .wrap_err_with(|| format!("Failed to write {}", config_path.display()))?;
    Ok(true)
}
