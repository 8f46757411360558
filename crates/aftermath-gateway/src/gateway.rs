//! Analysis Gateway
//!
//! Orchestrates one request end to end:
//! 1. Validate that both inputs are present
//! 2. Open a session and store the inputs
//! 3. Run the collaborator (score, then render)
//! 4. Release the inputs on every outcome
//! 5. Commit the visualization for exactly one fetch
//!
//! and serves that visualization back by token.

use crate::error::{GatewayError, GatewayResult};
use aftermath_analysis::{DamageAnalyzer, DamageAssessment};
use aftermath_session::{InputRole, ResultArtifact, Session, SessionManager, SessionToken};
use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use std::io;
use std::sync::Arc;
use tracing::Instrument;

/// Route prefix of the result endpoint
pub const RESULT_ROUTE: &str = "/api/result-image";

/// Successful analysis
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Collaborator assessment, passed through verbatim
    pub analysis: DamageAssessment,
    /// Retrieval token for the visualization
    pub token: SessionToken,
}

impl AnalysisOutcome {
    /// Path a client fetches the visualization from
    #[must_use]
    pub fn visualization_path(&self) -> String {
        format!("{RESULT_ROUTE}/{}", self.token)
    }

    /// JSON body returned to the client
    #[must_use]
    pub fn to_response(&self) -> AnalyzeResponse {
        AnalyzeResponse {
            analysis: self.analysis.clone(),
            visualization: self.visualization_path(),
        }
    }
}

/// Body of a successful `POST /api/analyze`
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    /// Opaque assessment
    pub analysis: DamageAssessment,
    /// Retrieval path of the visualization
    pub visualization: String,
}

/// Request orchestrator
#[derive(Debug, Clone)]
pub struct AnalysisGateway {
    sessions: SessionManager,
    analyzer: Arc<dyn DamageAnalyzer>,
}

impl AnalysisGateway {
    /// Create gateway over a session manager and a collaborator
    #[inline]
    #[must_use]
    pub fn new(sessions: SessionManager, analyzer: Arc<dyn DamageAnalyzer>) -> Self {
        Self { sessions, analyzer }
    }

    /// Session manager in use
    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Analyze a before/after pair
    ///
    /// On success only the visualization remains on disk, owned by the
    /// returned token. On any failure nothing of the session remains.
    ///
    /// # Errors
    /// - `GatewayError::Validation` if either input is absent
    /// - `GatewayError::Storage` if an input cannot be stored
    /// - `GatewayError::Analysis` if the collaborator fails or writes no output
    /// - `GatewayError::Internal` if no session token can be minted
    pub async fn analyze<S>(&self, before: Option<S>, after: Option<S>) -> GatewayResult<AnalysisOutcome>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
    {
        let (Some(before), Some(after)) = (before, after) else {
            return Err(GatewayError::validation(
                "Both before and after images are required",
            ));
        };

        let mut session = self.sessions.new_session().map_err(|e| {
            tracing::error!(error = %e, "cannot open session");
            GatewayError::from(e)
        })?;
        let span = tracing::info_span!("analyze", token = %session.token());

        async move {
            let analysis = match self.run(&mut session, before, after).await {
                Ok(analysis) => analysis,
                Err(e) => {
                    session.teardown().await;
                    tracing::warn!(error = %e, "analysis request failed");
                    return Err(e);
                }
            };
            let token = session.commit_output().await?;
            tracing::info!("analysis complete");
            Ok(AnalysisOutcome { analysis, token })
        }
        .instrument(span)
        .await
    }

    async fn run<S>(&self, session: &mut Session, before: S, after: S) -> GatewayResult<DamageAssessment>
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Unpin,
    {
        session.store_input(InputRole::Before, before).await?;
        session.store_input(InputRole::After, after).await?;

        let result = self.collaborate(session).await;
        // Inputs are done with as soon as the collaborator returns, whatever it returned.
        session.release_inputs().await;
        result
    }

    async fn collaborate(&self, session: &Session) -> GatewayResult<DamageAssessment> {
        let before = session.input_path(InputRole::Before);
        let after = session.input_path(InputRole::After);

        let analysis = self.analyzer.compute_damage_intensity(before, after).await?;
        self.analyzer
            .render_visualization(before, after, session.output_path())
            .await?;
        Ok(analysis)
    }

    /// Claim the visualization for `token`
    ///
    /// The returned artifact is released exactly once: when its stream is
    /// fully read, fails, or is dropped.
    ///
    /// # Errors
    /// - `GatewayError::NotFound` for malformed, unknown, consumed or expired tokens
    /// - `GatewayError::Storage` if the claimed artifact cannot be opened
    pub async fn fetch_result(&self, token: &str) -> GatewayResult<ResultArtifact> {
        self.sessions.claim_result(token).await.map_err(GatewayError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visualization_path_uses_result_route() {
        let token: SessionToken = "00112233445566778899aabbccddeeff".parse().unwrap();
        let outcome = AnalysisOutcome {
            analysis: DamageAssessment::new(serde_json::json!({"damage_intensity": 0.1})),
            token,
        };
        assert_eq!(
            outcome.visualization_path(),
            "/api/result-image/00112233445566778899aabbccddeeff"
        );

        let body = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(body["analysis"]["damage_intensity"], 0.1);
        assert_eq!(body["visualization"], outcome.visualization_path());
    }
}
