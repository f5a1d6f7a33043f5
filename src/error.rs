//! Errors that abort a synchronisation cycle.
//!
//! Almost everything the pipeline encounters is recovered locally (failed
//! listings, failed fetches, unparseable XML). What remains are filesystem
//! faults: a directory that cannot be created or a file that cannot be moved.
//! Those end the cycle and are surfaced to `main`.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Builds a `map_err` adapter tagging an io error with what was attempted and where.
    pub fn io(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> SyncError {
        let path = path.to_path_buf();
        move |source| SyncError::Io {
            action,
            path,
            source,
        }
    }
}
