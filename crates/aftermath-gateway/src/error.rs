//! Error types for the gateway
//!
//! One tagged kind per client-visible outcome:
//! - Validation: the client sent something unusable, do not retry as-is
//! - Storage: temporary artifacts could not be written or read, retryable
//! - Analysis: the collaborator failed, retry with different input
//! - NotFound: unknown, consumed or expired retrieval token
//! - Internal: the process cannot mint sessions (entropy failure)

use aftermath_analysis::AnalysisError;
use aftermath_session::SessionError;
use warp::http::StatusCode;

/// Main gateway error type
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or malformed request input
    #[error("{0}")]
    Validation(String),

    /// Temporary artifact I/O failed
    #[error("storage failure: {0}")]
    Storage(#[source] SessionError),

    /// Collaborator failed
    #[error("analysis failed: {0}")]
    Analysis(#[source] AnalysisError),

    /// No result for the token
    #[error("result image not found")]
    NotFound,

    /// Process-level fault
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Create validation error
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status for this error
    #[inline]
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Storage(_) | Self::Analysis(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show a client
    ///
    /// Storage, analysis and internal failures are logged in full but
    /// reported without server paths or collaborator output.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Storage(_) => "failed to store temporary image data".to_string(),
            Self::Analysis(err) => format!("analysis failed: {}", err.summary()),
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }

    /// Check if the client may retry the identical request
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Entropy(msg) => Self::Internal(format!("cannot mint session token: {msg}")),
            SessionError::InvalidToken | SessionError::NotFound(_) => Self::NotFound,
            SessionError::MissingOutput(_) => Self::Analysis(AnalysisError::MissingOutput {
                operation: "render_visualization",
            }),
            err @ (SessionError::Storage { .. } | SessionError::Closed(_)) => Self::Storage(err),
        }
    }
}

impl From<AnalysisError> for GatewayError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

/// Result alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
