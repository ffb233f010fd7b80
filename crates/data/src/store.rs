//! `ContestStore` backed by the SQLite repositories.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use duel_core::{
    Bet, CommitOutcome, Contest, ContestStatus, ContestStore, PayoutCalculator, Settlement,
};
use rust_decimal::Decimal;

use crate::database::DatabaseClient;
use crate::repositories::Repositories;

#[derive(Debug, Clone)]
pub struct SqliteContestStore {
    repos: Repositories,
}

impl SqliteContestStore {
    #[must_use]
    pub fn new(db: &DatabaseClient) -> Self {
        Self {
            repos: db.repositories(),
        }
    }

    #[must_use]
    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }
}

#[async_trait]
impl ContestStore for SqliteContestStore {
    async fn create_contest(&self, contest: &Contest, bet: &Bet) -> Result<i64> {
        self.repos.contests.create(contest, bet).await
    }

    async fn claim_contest(&self, contest_id: i64, claimer_id: &str, bet: &Bet) -> Result<bool> {
        self.repos.contests.claim(contest_id, claimer_id, bet).await
    }

    async fn find_contest(&self, contest_id: i64) -> Result<Option<Contest>> {
        self.repos.contests.get_by_id(contest_id).await
    }

    async fn matched_unresolved(&self) -> Result<Vec<Contest>> {
        self.repos
            .contests
            .query_unresolved(ContestStatus::Matched)
            .await
    }

    async fn open_unresolved(&self) -> Result<Vec<Contest>> {
        self.repos.contests.query_unresolved(ContestStatus::Open).await
    }

    async fn commit_settlement(&self, settlement: &Settlement) -> Result<CommitOutcome> {
        self.repos.contests.commit_settlement(settlement).await
    }

    async fn projected_points(&self, player_id: &str, date: NaiveDate) -> Result<Option<Decimal>> {
        self.repos
            .player_stats
            .projected_points(player_id, date)
            .await
    }

    async fn player_is_final(&self, player_id: &str, date: NaiveDate) -> Result<bool> {
        self.repos.player_stats.is_final(player_id, date).await
    }

    async fn payout_calculator(&self) -> Result<PayoutCalculator> {
        let spreads = self.repos.payout_tables.load_spread_table().await?;
        let likelihoods = self.repos.payout_tables.load_likelihood_table().await?;
        Ok(PayoutCalculator::new(spreads, likelihoods))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use duel_core::{
        ContestError, ContestRequest, FinalResults, LogNotifier, PlayerProjection, PlayerResult,
        SettleOutcome, SettlementEngine, SettlementError, SpreadRow, SpreadType, WalletBalance,
    };
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 7).unwrap()
    }

    async fn seeded_store() -> Arc<SqliteContestStore> {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        seed(&db).await
    }

    async fn seed(db: &DatabaseClient) -> Arc<SqliteContestStore> {
        let store = SqliteContestStore::new(db);
        let repos = store.repositories();
        let at = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();

        for (spread, cover) in [(dec!(-3.5), dec!(0.90)), (dec!(3.5), dec!(0.95))] {
            repos
                .payout_tables
                .insert_spread_row(&SpreadRow {
                    spread,
                    spread_type: SpreadType::Standard,
                    cover_multiplier: cover,
                    money_line_multiplier: dec!(1),
                    updated_at: at,
                })
                .await
                .unwrap();
        }
        repos
            .player_stats
            .upsert_projections(
                date(),
                &[
                    PlayerProjection {
                        player_id: "p-100".into(),
                        projected_points: dec!(18.4),
                        opponent: None,
                    },
                    PlayerProjection {
                        player_id: "p-200".into(),
                        projected_points: dec!(15.2),
                        opponent: None,
                    },
                ],
                at,
            )
            .await
            .unwrap();
        for user in ["alice", "bob"] {
            repos
                .ledger
                .record_top_up(user, dec!(100), None, at)
                .await
                .unwrap();
        }

        Arc::new(store)
    }

    fn request() -> ContestRequest {
        ContestRequest {
            creator_id: "alice".into(),
            creator_player_id: "p-100".into(),
            claimer_player_id: "p-200".into(),
            game_date: date(),
            entry_amount: dec!(100),
            win_bonus_enabled: false,
            money_line: Decimal::ZERO,
        }
    }

    fn final_results(creator: Decimal, claimer: Decimal) -> Vec<PlayerResult> {
        vec![
            PlayerResult {
                player_id: "p-100".into(),
                is_final: true,
                points: creator,
            },
            PlayerResult {
                player_id: "p-200".into(),
                is_final: true,
                points: claimer,
            },
        ]
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_sqlite() {
        let store = seeded_store().await;
        let engine = SettlementEngine::new(store.clone(), Arc::new(LogNotifier));

        let contest = engine.open_contest(request()).await.unwrap();
        let contest = engine.claim_contest(contest.id, "bob").await.unwrap();

        let ledger = &store.repositories().ledger;
        assert_eq!(ledger.balance("alice").await.unwrap().total(), 0);
        assert_eq!(ledger.balance("bob").await.unwrap().total(), 0);

        let results = FinalResults::new(final_results(dec!(24), dec!(12)));
        let outcome = engine.settle_matched(&contest, &results).await.unwrap();
        assert!(matches!(outcome, SettleOutcome::Settled { .. }));
        assert_eq!(
            engine.settle_matched(&contest, &results).await.unwrap(),
            SettleOutcome::AlreadySettled
        );

        // Creator favorite covers: +90 net; claimer loses the 100 stake.
        let alice = ledger.balance("alice").await.unwrap();
        let bob = ledger.balance("bob").await.unwrap();
        assert_eq!(alice.total(), 19_000);
        assert_eq!(bob.total(), 0);
        assert_eq!(
            alice,
            WalletBalance::from_entries(
                &ledger.top_ups_for_user("alice").await.unwrap(),
                &ledger.gains_for_user("alice").await.unwrap(),
                &ledger.bets_for_user("alice").await.unwrap(),
            )
        );
        assert_eq!(ledger.gains_for_contest(contest.id).await.unwrap().len(), 3);
    }

    // =========================================================================
    // Claim window
    // =========================================================================

    #[tokio::test]
    async fn test_claim_refused_after_results_are_final() {
        let store = seeded_store().await;
        let engine = SettlementEngine::new(store.clone(), Arc::new(LogNotifier));
        let contest = engine.open_contest(request()).await.unwrap();

        store
            .repositories()
            .player_stats
            .upsert_results(date(), &final_results(dec!(5), dec!(30)), Utc::now())
            .await
            .unwrap();

        let err = engine.claim_contest(contest.id, "bob").await.unwrap_err();
        assert!(matches!(
            err,
            SettlementError::Contest(ContestError::ClaimWindowClosed { .. })
        ));

        let stored = store.find_contest(contest.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ContestStatus::Open);
        assert!(stored.claimer_id.is_none());
        assert!(store.repositories().ledger.bets_for_user("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_guard_rejects_write_once_a_player_is_final() {
        let store = seeded_store().await;
        let engine = SettlementEngine::new(store.clone(), Arc::new(LogNotifier));
        let contest = engine.open_contest(request()).await.unwrap();

        // Final result lands between the engine's check and the store write.
        let mut claimed = contest.clone();
        let bet = claimed.claim("bob", Utc::now()).unwrap();
        store
            .repositories()
            .player_stats
            .upsert_results(
                date(),
                &[PlayerResult {
                    player_id: "p-200".into(),
                    is_final: true,
                    points: dec!(30),
                }],
                Utc::now(),
            )
            .await
            .unwrap();

        assert!(!store.claim_contest(contest.id, "bob", &bet).await.unwrap());
        assert!(store.find_contest(contest.id).await.unwrap().unwrap().is_open());
    }

    #[tokio::test]
    async fn test_unofficial_results_keep_claim_window_open() {
        let store = seeded_store().await;
        let engine = SettlementEngine::new(store.clone(), Arc::new(LogNotifier));
        let contest = engine.open_contest(request()).await.unwrap();

        let mut live = final_results(dec!(5), dec!(30));
        for result in &mut live {
            result.is_final = false;
        }
        store
            .repositories()
            .player_stats
            .upsert_results(date(), &live, Utc::now())
            .await
            .unwrap();

        let matched = engine.claim_contest(contest.id, "bob").await.unwrap();
        assert_eq!(matched.status, ContestStatus::Matched);
    }

    // =========================================================================
    // Concurrent settlement
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_settlement_commits_once_on_file_database() {
        let path = std::env::temp_dir().join(format!(
            "duel-concurrent-settle-{}-{}.db",
            std::process::id(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let db = DatabaseClient::new(&format!("sqlite://{}", path.display()), 8)
            .await
            .unwrap();
        let store = seed(&db).await;
        let engine = SettlementEngine::new(store.clone(), Arc::new(LogNotifier));

        let contest = engine.open_contest(request()).await.unwrap();
        let contest = engine.claim_contest(contest.id, "bob").await.unwrap();
        let results = Arc::new(FinalResults::new(final_results(dec!(24), dec!(12))));

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let contest = contest.clone();
                let results = Arc::clone(&results);
                tokio::spawn(async move { engine.settle_matched(&contest, &results).await })
            })
            .collect();

        let mut settled = 0;
        let mut already = 0;
        for attempt in attempts {
            match attempt.await.unwrap().unwrap() {
                SettleOutcome::Settled { .. } => settled += 1,
                SettleOutcome::AlreadySettled => already += 1,
                SettleOutcome::NotReady => panic!("results were final"),
            }
        }

        assert_eq!(settled, 1);
        assert_eq!(already, 7);
        let ledger = &store.repositories().ledger;
        assert_eq!(ledger.gains_for_contest(contest.id).await.unwrap().len(), 3);
        assert_eq!(ledger.balance("alice").await.unwrap().total(), 19_000);

        db.pool().close().await;
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }
}
