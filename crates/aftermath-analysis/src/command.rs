//! External analyzer program
//!
//! Drives the collaborator as a child process:
//!
//! ```text
//! <program> <args..> intensity <before> <after>            # JSON on stdout
//! <program> <args..> visualize <before> <after> <output>   # writes <output>
//! ```
//!
//! A zero exit status is success. Children are killed when the calling
//! future is dropped, so a cancelled request does not leave work running
//! against files that are about to be deleted.

use crate::analyzer::{DamageAnalyzer, DamageAssessment};
use crate::error::AnalysisError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const INTENSITY: &str = "compute_damage_intensity";
const VISUALIZE: &str = "render_visualization";

/// Longest stderr tail written to the log
const STDERR_TAIL: usize = 2048;

/// Collaborator backed by an external program
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAnalyzer {
    /// Create analyzer running `program` with the default timeout
    #[inline]
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Arguments placed before the operation name
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Limit for each invocation
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program being run
    #[inline]
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(
        &self,
        operation: &'static str,
        verb: &str,
        paths: &[&Path],
    ) -> Result<Vec<u8>, AnalysisError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(verb)
            .args(paths.iter().map(|p| p.as_os_str()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|source| AnalysisError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AnalysisError::Timeout {
                operation,
                after: self.timeout,
            })?
            .map_err(|e| AnalysisError::failed(operation, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let tail = &stderr[floor_char_boundary(stderr, stderr.len().saturating_sub(STDERR_TAIL))..];
            tracing::warn!(
                program = %self.program.display(),
                operation,
                status = %output.status,
                stderr = tail,
                "analyzer exited unsuccessfully"
            );
            return Err(AnalysisError::Exited {
                operation,
                status: output.status.to_string(),
            });
        }
        Ok(output.stdout)
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[async_trait]
impl DamageAnalyzer for CommandAnalyzer {
    async fn compute_damage_intensity(
        &self,
        before: &Path,
        after: &Path,
    ) -> Result<DamageAssessment, AnalysisError> {
        let stdout = self.run(INTENSITY, "intensity", &[before, after]).await?;
        serde_json::from_slice(&stdout)
            .map(DamageAssessment::new)
            .map_err(|e| AnalysisError::InvalidOutput {
                operation: INTENSITY,
                reason: e.to_string(),
            })
    }

    async fn render_visualization(
        &self,
        before: &Path,
        after: &Path,
        output: &Path,
    ) -> Result<(), AnalysisError> {
        self.run(VISUALIZE, "visualize", &[before, after, output])
            .await
            .map(|_| ())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
case "$1" in
  intensity) printf '{"damage_intensity": 0.25, "before": "%s"}' "$(basename "$2")" ;;
  visualize) cat "$2" "$3" > "$4" ;;
  *) echo "unknown verb $1" >&2; exit 2 ;;
esac
"#;

    fn shell(script: &str) -> CommandAnalyzer {
        CommandAnalyzer::new("sh").with_args(["-c", script, "analyzer"])
    }

    #[tokio::test]
    async fn intensity_parses_stdout_json() {
        let dir = tempfile::tempdir().unwrap();
        let before = dir.path().join("b.before");
        let after = dir.path().join("b.after");

        let assessment = shell(SCRIPT)
            .compute_damage_intensity(&before, &after)
            .await
            .unwrap();

        assert_eq!(assessment.as_value()["damage_intensity"], 0.25);
        assert_eq!(assessment.as_value()["before"], "b.before");
    }

    #[tokio::test]
    async fn visualize_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let before = dir.path().join("x.before");
        let after = dir.path().join("x.after");
        let output = dir.path().join("x.result.jpg");
        tokio::fs::write(&before, b"B").await.unwrap();
        tokio::fs::write(&after, b"A").await.unwrap();

        shell(SCRIPT)
            .render_visualization(&before, &after, &output)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&output).await.unwrap(), b"BA");
    }

    #[tokio::test]
    async fn non_zero_exit_keeps_stderr_out_of_the_error() {
        let err = shell("echo 'Traceback (most recent call last):' >&2; exit 3")
            .compute_damage_intensity(Path::new("a"), Path::new("b"))
            .await
            .unwrap_err();

        match &err {
            AnalysisError::Exited { operation, status } => {
                assert_eq!(*operation, INTENSITY);
                assert!(status.contains('3'), "{status}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!err.to_string().contains("Traceback"), "{err}");
    }

    #[tokio::test]
    async fn garbage_stdout_is_invalid_output() {
        let err = shell("echo not-json")
            .compute_damage_intensity(Path::new("a"), Path::new("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidOutput { .. }));
    }

    #[tokio::test]
    async fn slow_analyzer_times_out() {
        let err = shell("sleep 5")
            .with_timeout(Duration::from_millis(100))
            .render_visualization(Path::new("a"), Path::new("b"), Path::new("c"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Timeout { operation: VISUALIZE, .. }));
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let err = CommandAnalyzer::new("/nonexistent/aftermath-analyzer")
            .compute_damage_intensity(Path::new("a"), Path::new("b"))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Spawn { .. }));
    }
}
