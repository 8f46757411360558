//! Error types for the session manager
//!
//! Covers:
//! - Token minting and parsing
//! - Artifact storage I/O
//! - Result lookup for unknown or consumed tokens

use std::path::PathBuf;

/// Session lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The operating system entropy source failed while minting a token
    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Token string is not a well-formed session token
    #[error("malformed session token")]
    InvalidToken,

    /// No artifact exists for the token (never created, consumed or reaped)
    #[error("no result artifact for token {0}")]
    NotFound(String),

    /// Filesystem failure while writing or reading an artifact
    #[error("storage error at {}: {source}", .path.display())]
    Storage {
        /// Artifact path involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Input storage attempted after the session released its inputs
    #[error("session {0} no longer accepts inputs")]
    Closed(String),

    /// The collaborator returned without writing the output artifact
    #[error("output artifact missing at {}", .0.display())]
    MissingOutput(PathBuf),
}

impl SessionError {
    /// Create storage error for path
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Check if this error means the process cannot mint sessions at all
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Entropy(_))
    }
}

/// Result alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
