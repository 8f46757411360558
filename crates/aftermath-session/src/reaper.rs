//! Retention of unfetched results
//!
//! A result that nobody fetches would otherwise stay on disk forever. The
//! reaper deletes `result` artifacts older than the retention window. It only
//! ever touches committed results: inputs belong to in-flight sessions and
//! serving files to in-flight fetches, and both are reclaimed by their owners.

use crate::error::{SessionError, SessionResult};
use crate::layout::{ArtifactRole, StorageLayout};
use crate::manager::SessionManager;
use crate::reclaim::remove_artifact;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;

/// Sweeps expired results out of the storage root
#[derive(Debug, Clone)]
pub struct Reaper {
    manager: SessionManager,
    ttl: Duration,
    interval: Duration,
}

impl Reaper {
    /// Create reaper for `manager` with retention `ttl`, sweeping every `interval`
    #[inline]
    #[must_use]
    pub fn new(manager: SessionManager, ttl: Duration, interval: Duration) -> Self {
        Self {
            manager,
            ttl,
            interval,
        }
    }

    /// Retention window
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Delete results whose modification time is older than the window
    ///
    /// Returns the number of results this sweep removed. A result claimed by
    /// a fetch between listing and deletion is simply skipped.
    ///
    /// # Errors
    /// - `SessionError::Storage` if the root cannot be listed
    pub async fn sweep(&self) -> SessionResult<usize> {
        let root = self.manager.root();
        let mut entries = tokio::fs::read_dir(root)
            .await
            .map_err(|e| SessionError::storage(root, e))?;
        let now = SystemTime::now();
        let stats = self.manager.stats_handle();

        let mut reaped = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::storage(root, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some((token, ArtifactRole::Result)) = StorageLayout::parse_file_name(name) else {
                continue;
            };

            let Ok(modified) = entry.metadata().await.and_then(|m| m.modified()) else {
                continue;
            };
            // Clock steps backwards make the age zero, never negative.
            let age = now.duration_since(modified).unwrap_or_default();
            if age < self.ttl {
                continue;
            }

            if remove_artifact(&entry.path(), stats).await {
                stats.result_reaped();
                reaped += 1;
                tracing::info!(token = %token, age_secs = age.as_secs(), "expired result reaped");
            }
        }
        Ok(reaped)
    }

    /// Run [`Reaper::sweep`] on a fixed interval until the task is aborted
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::warn!(error = %e, "result sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::SessionToken;

    #[tokio::test]
    async fn zero_ttl_reaps_every_result() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let token = SessionToken::mint().unwrap();
        tokio::fs::write(manager.result_path(&token), b"jpeg").await.unwrap();

        let reaper = Reaper::new(manager.clone(), Duration::ZERO, Duration::from_secs(60));
        assert_eq!(reaper.sweep().await.unwrap(), 1);

        assert!(!manager.result_path(&token).exists());
        assert_eq!(manager.stats().results_reaped, 1);
    }

    #[tokio::test]
    async fn fresh_results_and_other_roles_survive() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let fresh = SessionToken::mint().unwrap();
        tokio::fs::write(manager.result_path(&fresh), b"jpeg").await.unwrap();

        let old = SessionToken::mint().unwrap();
        for role in [ArtifactRole::Before, ArtifactRole::After, ArtifactRole::Serving] {
            tokio::fs::write(manager.layout().path(&old, role), b"x").await.unwrap();
        }

        let reaper = Reaper::new(manager.clone(), Duration::from_secs(3600), Duration::from_secs(60));
        assert_eq!(reaper.sweep().await.unwrap(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 4);

        let eager = Reaper::new(manager, Duration::ZERO, Duration::from_secs(60));
        assert_eq!(eager.sweep().await.unwrap(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 3);
    }
}
