//! Claimed result artifacts
//!
//! A fetch claims a result by renaming `<token>.result.jpg` to
//! `<token>.serving.jpg`. The rename is atomic, so of any number of
//! concurrent fetches (or a fetch racing the reaper) exactly one obtains the
//! file; the others see it missing. The winner holds a [`ResultArtifact`],
//! which deletes the serving file once its byte stream ends, fails, or is
//! dropped because the client went away.

use crate::reclaim::{remove_artifact, remove_artifact_blocking};
use crate::stats::SessionStats;
use crate::token::SessionToken;
use bytes::{Bytes, BytesMut};
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Read size for streaming a result to the client
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Result artifact owned by exactly one fetch
#[derive(Debug)]
pub struct ResultArtifact {
    token: SessionToken,
    path: PathBuf,
    file: Option<File>,
    len: u64,
    sent: u64,
    released: bool,
    stats: Arc<SessionStats>,
}

impl ResultArtifact {
    pub(crate) fn new(
        token: SessionToken,
        path: PathBuf,
        file: File,
        len: u64,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            token,
            path,
            file: Some(file),
            len,
            sent: 0,
            released: false,
            stats,
        }
    }

    /// Token the artifact was claimed with
    #[inline]
    #[must_use]
    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Size in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the artifact is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Path the artifact is held under while being served
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole artifact and release it
    ///
    /// # Errors
    /// Returns the read error; the artifact is released either way.
    pub async fn into_bytes(mut self) -> io::Result<Bytes> {
        let mut buf = Vec::with_capacity(usize::try_from(self.len).unwrap_or(0));
        let read = match self.file.as_mut() {
            Some(file) => file.read_to_end(&mut buf).await.map(|_| ()),
            None => Ok(()),
        };
        self.finish(read.is_ok()).await;
        read.map(|()| Bytes::from(buf))
    }

    /// Stream the artifact in [`CHUNK_SIZE`] pieces
    ///
    /// The stream owns the artifact. It counts as served as soon as the
    /// last of its [`len`](Self::len) bytes has been read, before that chunk
    /// is yielded: a consumer that knows the length (an HTTP body with
    /// `content-length`) stops polling there and never asks for end-of-file.
    /// A read error or an early drop releases it unserved.
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        futures::stream::try_unfold(self, |mut artifact| async move {
            let Some(file) = artifact.file.as_mut() else {
                return Ok::<_, io::Error>(None);
            };
            let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
            let n = file.read_buf(&mut buf).await?;
            if n == 0 {
                artifact.finish(true).await;
                return Ok(None);
            }
            artifact.sent += n as u64;
            if artifact.sent >= artifact.len {
                artifact.finish(true).await;
            }
            Ok(Some((buf.freeze(), artifact)))
        })
    }

    /// Release without reading
    pub async fn discard(mut self) {
        self.finish(false).await;
    }

    async fn finish(&mut self, served: bool) {
        self.file = None;
        if self.released {
            return;
        }
        self.released = true;
        remove_artifact(&self.path, &self.stats).await;
        if served {
            self.stats.result_served();
            tracing::info!(token = %self.token, bytes = self.len, "result served");
        } else {
            tracing::info!(token = %self.token, "result released unserved");
        }
    }
}

impl Drop for ResultArtifact {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.file = None;
        remove_artifact_blocking(&self.path, &self.stats);
        tracing::info!(token = %self.token, "result stream aborted, artifact released");
    }
}
