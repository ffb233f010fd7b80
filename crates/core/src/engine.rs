//! Settlement engine.
//!
//! Orchestrates one unit of work at a time: precondition checks against feed
//! results, resolution, the guarded transactional commit, and notification
//! after commit. Notifications run on their own task and never hold up the
//! caller. Callers (the scheduler, the CLI) own batching and isolation.

use crate::contest::{Contest, ContestRequest, ContestSide, ContestStatus, WinnerLabel};
use crate::error::{ContestError, SettlementError};
use crate::events::{settlement_events, SettlementEvent};
use crate::resolver::{resolve, resolve_unmatched, Outcome, Settlement};
use crate::stats::FinalResults;
use crate::traits::{CommitOutcome, ContestStore, Notifier};
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// What happened to one contest on one settlement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Settled {
        outcome: Outcome,
        winner: WinnerLabel,
    },
    /// Another writer got there first. No-op.
    AlreadySettled,
    /// Results are not official yet; try again next tick.
    NotReady,
}

/// Notifier that only logs. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: &SettlementEvent) -> Result<()> {
        info!(
            user_id = %event.user_id,
            contest_id = event.contest_id,
            template = event.template.as_str(),
            net_amount = %event.net_amount,
            "Contest notification"
        );
        Ok(())
    }
}

pub struct SettlementEngine<S>
where
    S: ContestStore,
{
    store: Arc<S>,
    notifier: Arc<dyn Notifier>,
    deliveries: Arc<Mutex<JoinSet<()>>>,
}

impl<S> Clone for SettlementEngine<S>
where
    S: ContestStore,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            notifier: Arc::clone(&self.notifier),
            deliveries: Arc::clone(&self.deliveries),
        }
    }
}

impl<S> SettlementEngine<S>
where
    S: ContestStore,
{
    pub fn new(store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            deliveries: Arc::default(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Waits for notification deliveries still in flight.
    pub async fn flush_notifications(&self) {
        let mut pending = std::mem::take(&mut *self.lock_deliveries());
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Notification task failed");
            }
        }
    }

    fn lock_deliveries(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.deliveries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prices and persists a new `open` contest with the creator's bet.
    ///
    /// # Errors
    /// Returns an error if the request is invalid, a projection is missing, or the write fails.
    pub async fn open_contest(&self, request: ContestRequest) -> Result<Contest, SettlementError> {
        request.validate()?;

        let creator_projected = self
            .projection(&request.creator_player_id, request.game_date)
            .await?;
        let claimer_projected = self
            .projection(&request.claimer_player_id, request.game_date)
            .await?;
        let calculator = self.store.payout_calculator().await?;

        let terms = |side| {
            calculator.side_terms(
                creator_projected,
                claimer_projected,
                side,
                request.entry_amount,
                request.win_bonus_enabled,
            )
        };
        let creator_terms = terms(ContestSide::Creator);
        let claimer_terms = terms(ContestSide::Claimer);

        let (mut contest, bet) = Contest::open(request, creator_terms, claimer_terms, Utc::now());
        contest.id = self.store.create_contest(&contest, &bet).await?;

        info!(
            contest_id = contest.id,
            creator_id = %contest.creator_id,
            entry_amount = %contest.entry_amount,
            creator_spread = %contest.creator_terms.spread,
            claimer_spread = %contest.claimer_terms.spread,
            "Contest opened"
        );
        Ok(contest)
    }

    /// Matches an open contest with a second participant.
    ///
    /// Claims close as soon as either player's result is final.
    ///
    /// # Errors
    /// Returns an error if the contest is missing, not open, claimed by its
    /// creator, or a player's result is already official.
    pub async fn claim_contest(
        &self,
        contest_id: i64,
        claimer_id: &str,
    ) -> Result<Contest, SettlementError> {
        let mut contest = self.store.find_contest(contest_id).await?.ok_or_else(|| {
            ContestError::InvalidRequest(format!("contest {contest_id} not found"))
        })?;

        let bet = contest.claim(claimer_id, Utc::now())?;
        self.ensure_claim_window(&contest).await?;

        if !self.store.claim_contest(contest_id, claimer_id, &bet).await? {
            let current = self.store.find_contest(contest_id).await?;
            if let Some(open) = current.as_ref().filter(|c| c.is_open()) {
                // Still open, so the store's finality guard rejected it.
                self.ensure_claim_window(open).await?;
            }
            let from = current.map_or(ContestStatus::Open, |c| c.status);
            return Err(ContestError::IllegalTransition {
                contest_id,
                from,
                to: ContestStatus::Matched,
            }
            .into());
        }

        info!(contest_id, claimer_id, "Contest matched");
        Ok(contest)
    }

    async fn ensure_claim_window(&self, contest: &Contest) -> Result<(), SettlementError> {
        for side in [ContestSide::Creator, ContestSide::Claimer] {
            let player_id = contest.player_id(side);
            if self.store.player_is_final(player_id, contest.game_date).await? {
                return Err(ContestError::ClaimWindowClosed {
                    contest_id: contest.id,
                    player_id: player_id.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Settles a matched contest once both players' results are final.
    ///
    /// # Errors
    /// Returns an error if a player is absent from the feed data, the contest
    /// is in an illegal state, or the commit fails.
    pub async fn settle_matched(
        &self,
        contest: &Contest,
        results: &FinalResults,
    ) -> Result<SettleOutcome, SettlementError> {
        if contest.ended {
            debug!(contest_id = contest.id, "Contest already ended, skipping");
            return Ok(SettleOutcome::AlreadySettled);
        }

        let Some(creator_points) = final_points(contest, ContestSide::Creator, results)? else {
            return Ok(SettleOutcome::NotReady);
        };
        let Some(claimer_points) = final_points(contest, ContestSide::Claimer, results)? else {
            return Ok(SettleOutcome::NotReady);
        };

        let settlement = resolve(contest, creator_points, claimer_points, Utc::now())?;
        self.commit(contest, settlement).await
    }

    /// Closes an open contest nobody claimed once the creator's result is final.
    ///
    /// # Errors
    /// Returns an error if the creator's player is absent from the feed data,
    /// the contest is not open, or the commit fails.
    pub async fn close_unmatched(
        &self,
        contest: &Contest,
        results: &FinalResults,
    ) -> Result<SettleOutcome, SettlementError> {
        if contest.ended {
            debug!(contest_id = contest.id, "Contest already ended, skipping");
            return Ok(SettleOutcome::AlreadySettled);
        }
        if final_points(contest, ContestSide::Creator, results)?.is_none() {
            return Ok(SettleOutcome::NotReady);
        }

        let settlement = resolve_unmatched(contest, Utc::now())?;
        self.commit(contest, settlement).await
    }

    async fn commit(
        &self,
        contest: &Contest,
        settlement: Settlement,
    ) -> Result<SettleOutcome, SettlementError> {
        match self.store.commit_settlement(&settlement).await? {
            CommitOutcome::AlreadySettled => {
                debug!(
                    contest_id = contest.id,
                    "Contest settled by a concurrent writer, skipping"
                );
                Ok(SettleOutcome::AlreadySettled)
            }
            CommitOutcome::Committed => {
                info!(
                    contest_id = contest.id,
                    outcome = settlement.outcome.as_str(),
                    winner = settlement.winner_label.as_str(),
                    creator_net = %settlement.creator_net,
                    claimer_net = %settlement.claimer_net,
                    house_profit = %settlement.house_profit,
                    "Contest settled"
                );

                let mut settled = contest.clone();
                settlement.apply_to(&mut settled);
                let mut deliveries = self.lock_deliveries();
                while deliveries.try_join_next().is_some() {}
                deliveries.spawn(notify_all(
                    Arc::clone(&self.notifier),
                    settlement_events(&settled, &settlement),
                ));
                drop(deliveries);

                Ok(SettleOutcome::Settled {
                    outcome: settlement.outcome,
                    winner: settlement.winner_label,
                })
            }
        }
    }

    async fn projection(
        &self,
        player_id: &str,
        date: chrono::NaiveDate,
    ) -> Result<Decimal, SettlementError> {
        self.store
            .projected_points(player_id, date)
            .await?
            .ok_or_else(|| {
                ContestError::InvalidRequest(format!(
                    "no projection for player {player_id} on {date}"
                ))
                .into()
            })
    }
}

/// Delivers events off the settlement path. Failures are logged and dropped.
async fn notify_all(notifier: Arc<dyn Notifier>, events: Vec<SettlementEvent>) {
    for event in events {
        if let Err(e) = notifier.notify(&event).await {
            warn!(
                user_id = %event.user_id,
                contest_id = event.contest_id,
                error = %e,
                "Notification failed"
            );
        }
    }
}

/// Final points for one side, `None` while unofficial.
fn final_points(
    contest: &Contest,
    side: ContestSide,
    results: &FinalResults,
) -> Result<Option<Decimal>, SettlementError> {
    let player_id = contest.player_id(side);
    match results.get(player_id) {
        None => Err(SettlementError::DataIntegrity {
            contest_id: contest.id,
            reason: format!("player {player_id} missing from feed results"),
        }),
        Some(_) => Ok(results.final_points(player_id)),
    }
}
