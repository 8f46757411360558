//! Session manager
//!
//! Mints sessions under an injected storage root and resolves retrieval
//! tokens back to result artifacts. Holds no per-session state: isolation
//! between concurrent requests comes entirely from token-derived paths.

use crate::error::{SessionError, SessionResult};
use crate::layout::{ArtifactRole, StorageLayout};
use crate::reclaim::remove_artifact;
use crate::result::ResultArtifact;
use crate::session::Session;
use crate::stats::{SessionStats, StatsSnapshot};
use crate::token::SessionToken;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Owner of the storage root
#[derive(Debug, Clone)]
pub struct SessionManager {
    layout: StorageLayout,
    stats: Arc<SessionStats>,
}

impl SessionManager {
    /// Create manager for `root` without touching the filesystem
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            layout: StorageLayout::new(root),
            stats: Arc::new(SessionStats::default()),
        }
    }

    /// Create manager and make sure the storage root exists
    ///
    /// # Errors
    /// - `SessionError::Storage` if the directory cannot be created
    pub async fn open(root: impl Into<PathBuf>) -> SessionResult<Self> {
        let manager = Self::new(root);
        tokio::fs::create_dir_all(manager.root())
            .await
            .map_err(|e| SessionError::storage(manager.root(), e))?;
        Ok(manager)
    }

    /// Storage root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Path derivation in use
    #[inline]
    #[must_use]
    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Counter snapshot
    #[inline]
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn stats_handle(&self) -> &Arc<SessionStats> {
        &self.stats
    }

    /// Mint a session with a fresh token
    ///
    /// Paths are derived but nothing is created on disk.
    ///
    /// # Errors
    /// - `SessionError::Entropy` if no token can be minted
    pub fn new_session(&self) -> SessionResult<Session> {
        let token = SessionToken::mint()?;
        tracing::debug!(token = %token, "session opened");
        Ok(Session::new(token, &self.layout, Arc::clone(&self.stats)))
    }

    /// Where the result for `token` lives until it is fetched
    #[inline]
    #[must_use]
    pub fn result_path(&self, token: &SessionToken) -> PathBuf {
        self.layout.path(token, ArtifactRole::Result)
    }

    /// Take exclusive ownership of the result for a token string
    ///
    /// Malformed tokens are rejected as `NotFound` before any filesystem
    /// access.
    ///
    /// # Errors
    /// - `SessionError::NotFound` if the token is malformed, unknown,
    ///   already fetched or reaped
    /// - `SessionError::Storage` if the claimed file cannot be opened
    pub async fn claim_result(&self, token: &str) -> SessionResult<ResultArtifact> {
        let token: SessionToken = token
            .parse()
            .map_err(|_| SessionError::NotFound(token.to_string()))?;

        let result = self.result_path(&token);
        let serving = self.layout.path(&token, ArtifactRole::Serving);
        match tokio::fs::rename(&result, &serving).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SessionError::NotFound(token.to_string()));
            }
            Err(e) => return Err(SessionError::storage(&result, e)),
        }

        // From here the serving file is ours and must be reclaimed on failure.
        let opened = async {
            let file = tokio::fs::File::open(&serving).await?;
            let len = file.metadata().await?.len();
            Ok::<_, std::io::Error>((file, len))
        }
        .await;
        match opened {
            Ok((file, len)) => {
                tracing::debug!(token = %token, bytes = len, "result claimed");
                Ok(ResultArtifact::new(
                    token,
                    serving,
                    file,
                    len,
                    Arc::clone(&self.stats),
                ))
            }
            Err(e) => {
                remove_artifact(&serving, &self.stats).await;
                Err(SessionError::storage(&serving, e))
            }
        }
    }

    /// Delete the unfetched result for `token`
    ///
    /// Idempotent. Returns `true` if this call removed the artifact.
    pub async fn release_output(&self, token: &SessionToken) -> bool {
        remove_artifact(&self.result_path(token), &self.stats).await
    }

    /// Remove every session artifact in the storage root
    ///
    /// Meant for startup, before any request is accepted: anything present
    /// then was left behind by a previous process. Files the layout did not
    /// name are left alone.
    ///
    /// # Errors
    /// - `SessionError::Storage` if the root cannot be listed
    pub async fn purge(&self) -> SessionResult<usize> {
        let mut entries = tokio::fs::read_dir(self.root())
            .await
            .map_err(|e| SessionError::storage(self.root(), e))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::storage(self.root(), e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if StorageLayout::parse_file_name(name).is_some()
                && remove_artifact(&entry.path(), &self.stats).await
            {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!(removed, root = %self.root().display(), "purged leftover artifacts");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(dir.path());

        let session = manager.new_session().unwrap();

        assert!(session.output_path().starts_with(dir.path()));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(manager.stats().sessions_opened, 1);
    }

    #[test]
    fn result_path_is_deterministic() {
        let manager = SessionManager::new("/data");
        let session = manager.new_session().unwrap();
        let token = session.token();

        assert_eq!(manager.result_path(&token), session.output_path());
        assert_eq!(manager.result_path(&token), manager.result_path(&token));
    }

    #[tokio::test]
    async fn open_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("uploads");

        let manager = SessionManager::open(&root).await.unwrap();

        assert!(root.is_dir());
        assert_eq!(manager.root(), root);
    }

    #[tokio::test]
    async fn malformed_token_is_not_found() {
        let manager = SessionManager::new("/definitely/not/a/real/root");
        let err = manager.claim_result("nonexistent-token").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn release_output_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let token = SessionToken::mint().unwrap();
        tokio::fs::write(manager.result_path(&token), b"jpeg").await.unwrap();

        assert!(manager.release_output(&token).await);
        assert!(!manager.release_output(&token).await);
        assert_eq!(manager.stats().artifacts_released, 1);
    }

    #[tokio::test]
    async fn purge_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let token = SessionToken::mint().unwrap();
        for role in ArtifactRole::ALL {
            tokio::fs::write(manager.layout().path(&token, role), b"x").await.unwrap();
        }
        tokio::fs::write(dir.path().join("README"), b"keep").await.unwrap();

        let removed = manager.purge().await.unwrap();

        assert_eq!(removed, ArtifactRole::ALL.len());
        let left: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("README")]);
    }
}
