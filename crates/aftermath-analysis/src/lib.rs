//! Aftermath Analysis
//!
//! The contract between the gateway and the image comparison capability it
//! depends on but does not implement:
//! - [`DamageAnalyzer`]: score damage between two images, render a visualization
//! - [`DamageAssessment`]: the opaque result, passed through to clients
//! - [`CommandAnalyzer`]: runs an external analyzer program

#![warn(unreachable_pub)]

pub mod analyzer;
pub mod command;
pub mod error;

pub use analyzer::{DamageAnalyzer, DamageAssessment};
pub use command::CommandAnalyzer;
pub use error::AnalysisError;
