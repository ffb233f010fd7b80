use crate::calculator::PayoutCalculator;
use crate::contest::{Bet, Contest};
use crate::events::SettlementEvent;
use crate::resolver::Settlement;
use crate::stats::{GameSchedule, PlayerProjection, PlayerResult};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// External sports-statistics feed.
#[async_trait]
pub trait StatsFeed: Send + Sync {
    async fn schedule_for_current_week(&self) -> Result<Vec<GameSchedule>>;
    async fn final_fantasy_points(&self, date: NaiveDate) -> Result<Vec<PlayerResult>>;
    async fn projected_fantasy_points(&self, date: NaiveDate) -> Result<Vec<PlayerProjection>>;
}

/// Result of a guarded settlement write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another writer ended the contest first; nothing was written.
    AlreadySettled,
}

/// Transactional persistence for contests and their ledger entries.
#[async_trait]
pub trait ContestStore: Send + Sync {
    /// Inserts an `open` contest and the creator's bet together, returning the new id.
    async fn create_contest(&self, contest: &Contest, bet: &Bet) -> Result<i64>;

    /// Matches an `open` contest and inserts the claimer's bet together.
    ///
    /// Returns `false` if the contest was no longer open or either player's
    /// result for the game date is already final.
    async fn claim_contest(&self, contest_id: i64, claimer_id: &str, bet: &Bet) -> Result<bool>;

    async fn find_contest(&self, contest_id: i64) -> Result<Option<Contest>>;

    /// Matched contests that have not ended.
    async fn matched_unresolved(&self) -> Result<Vec<Contest>>;

    /// Open contests that have not ended.
    async fn open_unresolved(&self) -> Result<Vec<Contest>>;

    /// Writes the contest outcome and every gain in one transaction, guarded by `ended = 0`.
    async fn commit_settlement(&self, settlement: &Settlement) -> Result<CommitOutcome>;

    async fn projected_points(&self, player_id: &str, date: NaiveDate) -> Result<Option<Decimal>>;

    /// True once the player's result for `date` has been ingested as final.
    async fn player_is_final(&self, player_id: &str, date: NaiveDate) -> Result<bool>;

    /// Snapshot of the current payout tables.
    async fn payout_calculator(&self) -> Result<PayoutCalculator>;
}

/// Outbound notification collaborator. Fire-and-forget from the caller's view.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &SettlementEvent) -> Result<()>;
}
