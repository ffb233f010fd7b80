//! Error taxonomy for contest lifecycle and settlement.
//!
//! Per-contest errors are classified so the scheduler can decide whether a
//! unit of work is retried on the next tick or skipped for good.

use crate::contest::ContestStatus;
use thiserror::Error;

/// Illegal operations on a contest's lifecycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContestError {
    #[error("illegal transition for contest {contest_id}: {from} -> {to}")]
    IllegalTransition {
        contest_id: i64,
        from: ContestStatus,
        to: ContestStatus,
    },

    #[error("contest {contest_id} cannot be claimed by its creator")]
    SelfClaim { contest_id: i64 },

    #[error("contest {contest_id} has already ended")]
    AlreadyEnded { contest_id: i64 },

    /// A player's result is already official, so the outcome is no longer uncertain.
    #[error("contest {contest_id} can no longer be claimed: player {player_id} is final")]
    ClaimWindowClosed { contest_id: i64, player_id: String },

    #[error("invalid contest request: {0}")]
    InvalidRequest(String),
}

/// Errors surfaced while settling or creating a contest.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Feed timeout or outage. Nothing was written; retry next tick.
    #[error("transient feed error: {0}")]
    TransientFeed(String),

    /// Contest references a player or game the feed data cannot resolve.
    #[error("contest {contest_id} cannot be mapped to feed data: {reason}")]
    DataIntegrity { contest_id: i64, reason: String },

    #[error(transparent)]
    Contest(#[from] ContestError),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SettlementError {
    /// Returns true if the same unit of work should be attempted again on a later tick.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientFeed(_) | Self::DataIntegrity { .. } | Self::Storage(_)
        )
    }
}
