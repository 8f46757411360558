//! Lifecycle counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide session counters
///
/// Shared by the manager, every session it mints and every claimed result.
#[derive(Debug, Default)]
pub struct SessionStats {
    sessions_opened: AtomicU64,
    inputs_stored: AtomicU64,
    artifacts_released: AtomicU64,
    results_served: AtomicU64,
    results_reaped: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Sessions minted
    pub sessions_opened: u64,
    /// Input files written
    pub inputs_stored: u64,
    /// Artifacts deleted by teardown, fetch completion or the reaper
    pub artifacts_released: u64,
    /// Results fully streamed to a client
    pub results_served: u64,
    /// Results deleted after the retention window
    pub results_reaped: u64,
}

impl SessionStats {
    pub(crate) fn session_opened(&self) {
        self.sessions_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn input_stored(&self) {
        self.inputs_stored.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn artifact_released(&self) {
        self.artifacts_released.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn result_served(&self) {
        self.results_served.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn result_reaped(&self) {
        self.results_reaped.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            inputs_stored: self.inputs_stored.load(Ordering::Relaxed),
            artifacts_released: self.artifacts_released.load(Ordering::Relaxed),
            results_served: self.results_served.load(Ordering::Relaxed),
            results_reaped: self.results_reaped.load(Ordering::Relaxed),
        }
    }
}
