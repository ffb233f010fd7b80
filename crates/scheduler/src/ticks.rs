//! One tick of each scheduled job.
//!
//! Every unit of work is isolated: a failing date or contest is logged and
//! counted, and the rest of the tick carries on.

use crate::jobs::TickReport;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use duel_core::{
    Contest, ContestStore, FinalResults, GameSchedule, GameStatus, SettleOutcome, SettlementEngine,
    SettlementError, StatsFeed,
};
use duel_data::{Repositories, SqliteContestStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Collaborators shared by every tick.
#[derive(Clone)]
pub struct TickContext {
    pub engine: SettlementEngine<SqliteContestStore>,
    pub feed: Arc<dyn StatsFeed>,
}

impl TickContext {
    #[must_use]
    pub fn new(engine: SettlementEngine<SqliteContestStore>, feed: Arc<dyn StatsFeed>) -> Self {
        Self { engine, feed }
    }

    fn repos(&self) -> &Repositories {
        self.engine.store().repositories()
    }
}

/// Ingests projected and final fantasy points around `today`.
///
/// The week's schedule decides the dates: projections for today and every
/// later game date that has not concluded, results for today and any date
/// with a game still in progress. The schedule lookup and each date's
/// projections and results are independent units.
///
/// # Errors
/// Never fails as a whole; per-unit failures are counted in the report.
pub async fn player_results(ctx: &TickContext, today: NaiveDate) -> Result<TickReport> {
    let mut report = TickReport::default();
    let stats = &ctx.repos().player_stats;

    report.processed += 1;
    let games = match ctx.feed.schedule_for_current_week().await {
        Ok(games) => games,
        Err(e) => {
            warn!(%today, error = %e, "Schedule lookup failed, ingesting today only");
            report.failed += 1;
            Vec::new()
        }
    };
    let (projection_dates, result_dates) = ingest_dates(&games, today);

    for date in projection_dates {
        report.processed += 1;
        let projections = async {
            let projections = ctx.feed.projected_fantasy_points(date).await?;
            stats.upsert_projections(date, &projections, Utc::now()).await
        };
        match projections.await {
            Ok(count) => info!(%date, count, "Ingested projections"),
            Err(e) => {
                warn!(%date, error = %e, "Projection ingest failed");
                report.failed += 1;
            }
        }
    }

    for date in result_dates {
        report.processed += 1;
        let results = async {
            let results = ctx.feed.final_fantasy_points(date).await?;
            stats.upsert_results(date, &results, Utc::now()).await
        };
        match results.await {
            Ok(count) => info!(%date, count, "Ingested player results"),
            Err(e) => {
                warn!(%date, error = %e, "Result ingest failed");
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Dates to ingest projections and results for, each sorted and deduplicated.
fn ingest_dates(
    games: &[GameSchedule],
    today: NaiveDate,
) -> (BTreeSet<NaiveDate>, BTreeSet<NaiveDate>) {
    let mut projections = BTreeSet::from([today]);
    let mut results = BTreeSet::from([today]);

    for game in games {
        let Some(date) = game.starts_at.map(|at| at.date_naive()) else {
            debug!(game_id = %game.game_id, "Game has no start time");
            continue;
        };
        if date > today && !game.status.is_concluded() {
            projections.insert(date);
        }
        if date < today && game.status == GameStatus::InProgress {
            results.insert(date);
        }
    }

    (projections, results)
}

/// Settles matched contests whose players are both final.
///
/// # Errors
/// Returns an error only if the unresolved contests cannot be loaded.
pub async fn win_criteria(ctx: &TickContext, today: NaiveDate) -> Result<TickReport> {
    let contests = ctx
        .engine
        .store()
        .matched_unresolved()
        .await
        .context("Failed to load matched contests")?;

    let report = settle_by_date(ctx, contests, today, |contest, results| {
        let engine = ctx.engine.clone();
        async move { engine.settle_matched(&contest, &results).await }
    })
    .await;

    info!(
        processed = report.processed,
        settled = report.settled,
        skipped = report.skipped,
        failed = report.failed,
        "Win criteria tick complete"
    );
    Ok(report)
}

/// Closes open contests whose creator's player is final.
///
/// # Errors
/// Returns an error only if the unresolved contests cannot be loaded.
pub async fn contest_close(ctx: &TickContext, today: NaiveDate) -> Result<TickReport> {
    let contests = ctx
        .engine
        .store()
        .open_unresolved()
        .await
        .context("Failed to load open contests")?;

    let report = settle_by_date(ctx, contests, today, |contest, results| {
        let engine = ctx.engine.clone();
        async move { engine.close_unmatched(&contest, &results).await }
    })
    .await;

    info!(
        processed = report.processed,
        settled = report.settled,
        skipped = report.skipped,
        failed = report.failed,
        "Contest close tick complete"
    );
    Ok(report)
}

/// Groups contests by game date, fetches each date's results once and
/// applies `settle` to every contest of that date.
async fn settle_by_date<F, Fut>(
    ctx: &TickContext,
    contests: Vec<Contest>,
    today: NaiveDate,
    settle: F,
) -> TickReport
where
    F: Fn(Contest, Arc<FinalResults>) -> Fut,
    Fut: std::future::Future<Output = Result<SettleOutcome, SettlementError>>,
{
    let mut report = TickReport::default();
    let mut by_date: BTreeMap<NaiveDate, Vec<Contest>> = BTreeMap::new();
    for contest in contests {
        by_date.entry(contest.game_date).or_default().push(contest);
    }

    for (date, contests) in by_date {
        report.processed += contests.len();

        if date > today {
            debug!(%date, count = contests.len(), "Games not played yet");
            report.skipped += contests.len();
            continue;
        }

        let results = match ctx.feed.final_fantasy_points(date).await {
            Ok(results) => results,
            Err(e) => {
                warn!(%date, count = contests.len(), error = %e, "Feed lookup failed, skipping date");
                report.skipped += contests.len();
                continue;
            }
        };

        if let Err(e) = ctx
            .repos()
            .player_stats
            .upsert_results(date, &results, Utc::now())
            .await
        {
            warn!(%date, error = %e, "Failed to persist player results");
        }

        let results = Arc::new(FinalResults::new(results));
        for contest in contests {
            let contest_id = contest.id;
            match settle(contest, Arc::clone(&results)).await {
                Ok(SettleOutcome::Settled { outcome, winner }) => {
                    debug!(contest_id, outcome = outcome.as_str(), winner = winner.as_str(), "Settled");
                    report.settled += 1;
                }
                Ok(SettleOutcome::AlreadySettled | SettleOutcome::NotReady) => report.skipped += 1,
                Err(e) if e.is_retryable() => {
                    warn!(contest_id, error = %e, "Settlement deferred");
                    report.failed += 1;
                }
                Err(e) => {
                    error!(contest_id, error = %e, "Settlement failed");
                    report.failed += 1;
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, d).unwrap()
    }

    fn game(id: &str, status: GameStatus, d: u32, hour: u32) -> GameSchedule {
        GameSchedule {
            game_id: id.to_string(),
            status,
            home_team: "KC".to_string(),
            away_team: "BUF".to_string(),
            starts_at: Some(Utc.with_ymd_and_hms(2025, 9, d, hour, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_ingest_dates_cover_the_rest_of_the_week() {
        let games = vec![
            game("thu", GameStatus::Final, 4, 0),
            game("sun-early", GameStatus::InProgress, 7, 17),
            game("sun-late", GameStatus::Scheduled, 7, 20),
            game("mon", GameStatus::Scheduled, 8, 0),
            game("mon-late", GameStatus::Scheduled, 8, 23),
            game("tue", GameStatus::Postponed, 9, 0),
            game("wed", GameStatus::Canceled, 10, 0),
        ];

        let (projections, results) = ingest_dates(&games, day(7));

        assert_eq!(projections.into_iter().collect::<Vec<_>>(), vec![day(7), day(8), day(9)]);
        assert_eq!(results.into_iter().collect::<Vec<_>>(), vec![day(7)]);
    }

    #[test]
    fn test_ingest_dates_follow_games_running_past_midnight() {
        let mut no_start = game("tbd", GameStatus::Scheduled, 9, 0);
        no_start.starts_at = None;
        let games = vec![game("mnf", GameStatus::InProgress, 8, 0), no_start];

        let (projections, results) = ingest_dates(&games, day(9));

        assert_eq!(projections.into_iter().collect::<Vec<_>>(), vec![day(9)]);
        assert_eq!(results.into_iter().collect::<Vec<_>>(), vec![day(8), day(9)]);
    }

    #[test]
    fn test_ingest_dates_without_schedule_is_today_only() {
        let (projections, results) = ingest_dates(&[], day(7));
        assert_eq!(projections.len(), 1);
        assert!(results.contains(&day(7)));
    }
}
