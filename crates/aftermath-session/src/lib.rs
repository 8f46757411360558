//! Aftermath Session Manager
//!
//! Owns the lifetime of every temporary file an analysis request creates:
//! - Mints unguessable 128-bit session tokens
//! - Derives input/output paths from the token under an injected storage root
//! - Guarantees each artifact is deleted exactly once on every exit path
//! - Hands a result artifact to exactly one fetch, then reclaims it
//!
//! # Example
//!
//! ```rust,ignore
//! use aftermath_session::{InputRole, SessionManager};
//!
//! # async fn example(before: S, after: S) -> Result<(), Box<dyn std::error::Error>> {
//! let manager = SessionManager::open("temp_uploads").await?;
//!
//! let mut session = manager.new_session()?;
//! session.store_input(InputRole::Before, before).await?;
//! session.store_input(InputRole::After, after).await?;
//! // ... collaborator writes session.output_path() ...
//! session.release_inputs().await;
//! let token = session.commit_output().await?;
//!
//! // later, on another connection
//! let artifact = manager.claim_result(&token.to_string()).await?;
//! let bytes = artifact.into_bytes().await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod layout;
pub mod manager;
pub mod reaper;
pub mod result;
pub mod session;
pub mod stats;
pub mod token;

mod reclaim;

pub use error::{SessionError, SessionResult};
pub use layout::{ArtifactRole, InputRole, StorageLayout};
pub use manager::SessionManager;
pub use reaper::Reaper;
pub use result::ResultArtifact;
pub use session::{Session, SessionState};
pub use stats::{SessionStats, StatsSnapshot};
pub use token::SessionToken;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
