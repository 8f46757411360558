//! Per-request session
//!
//! A [`Session`] owns every artifact path derived from its token. Ownership
//! ends in exactly one of three ways:
//!
//! - [`Session::commit_output`]: inputs are deleted and the result artifact is
//!   handed over to the storage root, where one fetch (or the reaper) will
//!   reclaim it.
//! - [`Session::teardown`]: everything still owned is deleted.
//! - Drop: the same as teardown, for early returns, panics and cancelled
//!   request futures.

use crate::error::{SessionError, SessionResult};
use crate::layout::{ArtifactRole, InputRole, StorageLayout};
use crate::reclaim::{remove_artifact, remove_artifact_blocking};
use crate::stats::SessionStats;
use crate::token::SessionToken;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting inputs; owns inputs and output
    Open,
    /// Inputs deleted; still owns the output
    InputsReleased,
    /// Output handed over for one fetch; owns nothing
    Committed,
    /// Everything deleted; owns nothing
    TornDown,
}

impl SessionState {
    fn owns_inputs(self) -> bool {
        matches!(self, Self::Open)
    }

    fn owns_output(self) -> bool {
        matches!(self, Self::Open | Self::InputsReleased)
    }
}

/// Artifacts of one analysis request
#[derive(Debug)]
pub struct Session {
    token: SessionToken,
    before: PathBuf,
    after: PathBuf,
    output: PathBuf,
    state: SessionState,
    stats: Arc<SessionStats>,
}

impl Session {
    pub(crate) fn new(token: SessionToken, layout: &StorageLayout, stats: Arc<SessionStats>) -> Self {
        stats.session_opened();
        Self {
            token,
            before: layout.path(&token, ArtifactRole::Before),
            after: layout.path(&token, ArtifactRole::After),
            output: layout.path(&token, ArtifactRole::Result),
            state: SessionState::Open,
            stats,
        }
    }

    /// Session token
    #[inline]
    #[must_use]
    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Current lifecycle state
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Path of an uploaded input
    #[inline]
    #[must_use]
    pub fn input_path(&self, role: InputRole) -> &Path {
        match role {
            InputRole::Before => &self.before,
            InputRole::After => &self.after,
        }
    }

    /// Path the collaborator must write the visualization to
    #[inline]
    #[must_use]
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Write an uploaded input to its session path
    ///
    /// The file is created with create-new semantics; it never replaces an
    /// existing file. Once created it belongs to the session, so a write that
    /// fails halfway is still removed by teardown.
    ///
    /// # Errors
    /// - `SessionError::Closed` if inputs were already released
    /// - `SessionError::Storage` on any I/O failure, including a failing
    ///   source stream
    pub async fn store_input<S>(&mut self, role: InputRole, mut stream: S) -> SessionResult<PathBuf>
    where
        S: Stream<Item = io::Result<Bytes>> + Unpin,
    {
        if !self.state.owns_inputs() {
            return Err(SessionError::Closed(self.token.to_string()));
        }

        let path = self.input_path(role).to_path_buf();
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| SessionError::storage(&path, e))?;

        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SessionError::storage(&path, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SessionError::storage(&path, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| SessionError::storage(&path, e))?;

        self.stats.input_stored();
        tracing::debug!(
            token = %self.token,
            role = role.field_name(),
            bytes = written,
            "input stored"
        );
        Ok(path)
    }

    /// Delete both inputs
    ///
    /// Idempotent: inputs that were never written are skipped, and a second
    /// call does nothing.
    pub async fn release_inputs(&mut self) {
        if !self.state.owns_inputs() {
            return;
        }
        remove_artifact(&self.before, &self.stats).await;
        remove_artifact(&self.after, &self.stats).await;
        self.state = SessionState::InputsReleased;
    }

    /// Hand the output artifact over for exactly one fetch
    ///
    /// Releases the inputs if still held and returns the retrieval token.
    ///
    /// # Errors
    /// - `SessionError::MissingOutput` if nothing was written to
    ///   [`Session::output_path`]; the session is torn down first
    /// - `SessionError::Storage` if the output cannot be inspected
    pub async fn commit_output(mut self) -> SessionResult<SessionToken> {
        match tokio::fs::metadata(&self.output).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                self.teardown_in_place().await;
                return Err(SessionError::MissingOutput(self.output.clone()));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.teardown_in_place().await;
                return Err(SessionError::MissingOutput(self.output.clone()));
            }
            Err(e) => {
                let err = SessionError::storage(&self.output, e);
                self.teardown_in_place().await;
                return Err(err);
            }
        }

        self.release_inputs().await;
        self.state = SessionState::Committed;
        tracing::debug!(token = %self.token, "output committed");
        Ok(self.token)
    }

    /// Delete everything the session still owns
    pub async fn teardown(mut self) {
        self.teardown_in_place().await;
    }

    async fn teardown_in_place(&mut self) {
        self.release_inputs().await;
        if self.state.owns_output() {
            remove_artifact(&self.output, &self.stats).await;
        }
        self.state = SessionState::TornDown;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.state.owns_inputs() {
            remove_artifact_blocking(&self.before, &self.stats);
            remove_artifact_blocking(&self.after, &self.stats);
        }
        if self.state.owns_output() {
            remove_artifact_blocking(&self.output, &self.stats);
            tracing::debug!(token = %self.token, "session dropped before commit");
        }
    }
}
