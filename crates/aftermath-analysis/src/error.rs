//! Error types for the analysis collaborator

use std::time::Duration;

/// Collaborator failures
///
/// `Display` is the full detail for logs. Clients only ever see
/// [`AnalysisError::summary`], which carries no collaborator output.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The collaborator rejected the input or failed while processing it
    #[error("{operation} failed: {reason}")]
    Failed {
        /// Collaborator operation
        operation: &'static str,
        /// Human-readable cause
        reason: String,
    },

    /// The analyzer program exited unsuccessfully; its stderr goes to the log only
    #[error("{operation} failed ({status})")]
    Exited {
        /// Collaborator operation
        operation: &'static str,
        /// Exit status as reported by the OS
        status: String,
    },

    /// The collaborator reported success without writing its output
    #[error("{operation} produced no output")]
    MissingOutput {
        /// Collaborator operation
        operation: &'static str,
    },

    /// The collaborator produced output that could not be understood
    #[error("{operation} returned invalid output: {reason}")]
    InvalidOutput {
        /// Collaborator operation
        operation: &'static str,
        /// Parse failure
        reason: String,
    },

    /// The collaborator did not finish in time
    #[error("{operation} timed out after {}s", .after.as_secs())]
    Timeout {
        /// Collaborator operation
        operation: &'static str,
        /// Configured limit
        after: Duration,
    },

    /// The analyzer program could not be started
    #[error("failed to launch analyzer {program}: {source}")]
    Spawn {
        /// Program that was launched
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl AnalysisError {
    /// Create failure for `operation`
    pub fn failed(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Failed {
            operation,
            reason: reason.into(),
        }
    }

    /// Fixed, client-safe description of the failure
    ///
    /// Never includes collaborator reasons, stderr or file paths.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Failed { operation, .. } => format!("{operation} failed"),
            Self::InvalidOutput { operation, .. } => format!("{operation} returned invalid output"),
            Self::Spawn { .. } => "analyzer could not be started".to_string(),
            Self::Exited { .. } | Self::MissingOutput { .. } | Self::Timeout { .. } => self.to_string(),
        }
    }

    /// Check if retrying the same input could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Spawn { .. })
    }
}
