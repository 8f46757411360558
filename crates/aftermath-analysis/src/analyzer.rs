//! Collaborator contract
//!
//! The damage comparison and the visualization are not computed here. The
//! gateway only needs two operations over file paths, and treats the
//! assessment as an opaque JSON document.

use crate::error::AnalysisError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

/// Damage assessment as produced by the collaborator
///
/// Passed through to clients verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DamageAssessment(serde_json::Value);

impl DamageAssessment {
    /// Wrap a collaborator result
    #[inline]
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrow the raw document
    #[inline]
    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Unwrap the raw document
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for DamageAssessment {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Image comparison capability consumed by the gateway
#[async_trait]
pub trait DamageAnalyzer: Send + Sync + Debug {
    /// Compare the two images and score the damage
    ///
    /// Must be deterministic for identical file contents.
    async fn compute_damage_intensity(
        &self,
        before: &Path,
        after: &Path,
    ) -> Result<DamageAssessment, AnalysisError>;

    /// Write an annotated visualization of the damage to `output`
    async fn render_visualization(
        &self,
        before: &Path,
        after: &Path,
        output: &Path,
    ) -> Result<(), AnalysisError>;
}
