//! Aftermath Gateway
//!
//! HTTP front of the damage analysis service. Accepts a before/after image
//! pair, hands both to a [`DamageAnalyzer`](aftermath_analysis::DamageAnalyzer)
//! through a request-scoped session, and serves the rendered visualization
//! back exactly once.
//!
//! - [`AnalysisGateway`]: request orchestration, independent of HTTP
//! - [`http::routes`]: the warp filter tree
//! - [`GatewayConfig`]: TOML configuration with CLI overrides
//! - [`GatewayError`]: client-visible error taxonomy

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;

pub use config::{AnalyzerConfig, ConfigError, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use gateway::{AnalysisGateway, AnalysisOutcome, AnalyzeResponse, RESULT_ROUTE};
