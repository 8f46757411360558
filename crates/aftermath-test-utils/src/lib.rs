//! Testing utilities for Aftermath workspace
//!
//! Shared test helpers, fixtures, and stub collaborators.

#![allow(missing_docs)]

use aftermath_analysis::{AnalysisError, DamageAnalyzer, DamageAssessment};
use async_trait::async_trait;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

/// JPEG start-of-image marker, so stub outputs look like images
pub const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

pub fn sample_image(tag: &str) -> Vec<u8> {
    let mut bytes = JPEG_MAGIC.to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

pub fn storage_root() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temporary storage root")
}

/// Names of everything currently in `root`, sorted
pub fn artifact_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(root)
        .expect("list storage root")
        .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Deterministic collaborator
///
/// The assessment depends only on the input sizes; the visualization is the
/// JPEG marker followed by both inputs.
#[derive(Debug, Clone, Default)]
pub struct StubAnalyzer {
    delay: Option<Duration>,
}

impl StubAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep before each operation to widen concurrency windows
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay: Some(delay) }
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl DamageAnalyzer for StubAnalyzer {
    async fn compute_damage_intensity(
        &self,
        before: &Path,
        after: &Path,
    ) -> Result<DamageAssessment, AnalysisError> {
        self.pause().await;
        let read = |e: std::io::Error| AnalysisError::failed("compute_damage_intensity", e.to_string());
        let before_len = tokio::fs::metadata(before).await.map_err(read)?.len();
        let after_len = tokio::fs::metadata(after).await.map_err(read)?.len();
        let larger = before_len.max(after_len).max(1);
        #[allow(clippy::cast_precision_loss)]
        let intensity = before_len.abs_diff(after_len) as f64 / larger as f64;
        Ok(DamageAssessment::new(json!({
            "damage_intensity": intensity,
            "before_bytes": before_len,
            "after_bytes": after_len,
        })))
    }

    async fn render_visualization(
        &self,
        before: &Path,
        after: &Path,
        output: &Path,
    ) -> Result<(), AnalysisError> {
        self.pause().await;
        let fail = |e: std::io::Error| AnalysisError::failed("render_visualization", e.to_string());
        let mut image = JPEG_MAGIC.to_vec();
        image.extend(tokio::fs::read(before).await.map_err(fail)?);
        image.extend(tokio::fs::read(after).await.map_err(fail)?);
        tokio::fs::write(output, image).await.map_err(fail)
    }
}

/// Where a [`FailingAnalyzer`] breaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Scoring fails
    Compute,
    /// Rendering fails before writing anything
    Render,
    /// Rendering writes part of the output, then fails
    RenderAfterPartialWrite,
    /// Rendering reports success without writing the output
    RenderWithoutOutput,
}

/// Collaborator that fails in a chosen way
#[derive(Debug, Clone)]
pub struct FailingAnalyzer {
    mode: FailureMode,
}

impl FailingAnalyzer {
    pub fn new(mode: FailureMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl DamageAnalyzer for FailingAnalyzer {
    async fn compute_damage_intensity(
        &self,
        before: &Path,
        after: &Path,
    ) -> Result<DamageAssessment, AnalysisError> {
        if self.mode == FailureMode::Compute {
            return Err(AnalysisError::failed(
                "compute_damage_intensity",
                "corrupt image",
            ));
        }
        StubAnalyzer::new().compute_damage_intensity(before, after).await
    }

    async fn render_visualization(
        &self,
        _before: &Path,
        _after: &Path,
        output: &Path,
    ) -> Result<(), AnalysisError> {
        match self.mode {
            FailureMode::Compute | FailureMode::RenderWithoutOutput => Ok(()),
            FailureMode::Render => Err(AnalysisError::failed(
                "render_visualization",
                "unsupported image format",
            )),
            FailureMode::RenderAfterPartialWrite => {
                tokio::fs::write(output, JPEG_MAGIC)
                    .await
                    .map_err(|e| AnalysisError::failed("render_visualization", e.to_string()))?;
                Err(AnalysisError::failed("render_visualization", "encoder crashed"))
            }
        }
    }
}

/// Multipart form body
///
/// Returns the `content-type` header value and the encoded body.
pub fn multipart(fields: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    const BOUNDARY: &str = "aftermath-test-boundary";
    let mut body = Vec::new();
    for (name, data) in fields {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}.jpg\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/jpeg\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}
