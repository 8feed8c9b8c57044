//! Scan-level failures

use std::path::PathBuf;

use crate::config::ConfigError;

/// Why a scan produced no snapshot
///
/// Either kind of failure leaves the previous snapshot authoritative.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Offsets chain through every file, so one unreadable file fails the scan
    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
