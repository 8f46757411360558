//! Artifact deletion
//!
//! Teardown never fails: a missing file counts as already reclaimed, and any
//! other error is logged and swallowed so it cannot replace the error that
//! triggered the teardown.
//!
//! [`remove_artifact_blocking`] runs inside `Drop` on a runtime worker
//! thread. It must stay a single unlink; anything heavier belongs in the
//! async path.

use crate::stats::SessionStats;
use std::io::ErrorKind;
use std::path::Path;

/// Delete `path` if present. Returns `true` if this call removed it.
pub(crate) async fn remove_artifact(path: &Path, stats: &SessionStats) -> bool {
    outcome(path, tokio::fs::remove_file(path).await, stats)
}

/// Blocking variant for drop guards, which cannot await.
pub(crate) fn remove_artifact_blocking(path: &Path, stats: &SessionStats) -> bool {
    outcome(path, std::fs::remove_file(path), stats)
}

fn outcome(path: &Path, result: std::io::Result<()>, stats: &SessionStats) -> bool {
    match result {
        Ok(()) => {
            stats.artifact_released();
            tracing::debug!(path = %path.display(), "artifact removed");
            true
        }
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
            false
        }
    }
}
