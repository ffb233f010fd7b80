//! Contest repository.
//!
//! Every multi-row write (open + creator bet, claim + claimer bet, settlement
//! + gains) runs in one transaction. Lifecycle guards are re-checked in the
//! `WHERE` clause so concurrent writers resolve as first-committer-wins.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use duel_core::ledger::to_minor_units;
use duel_core::{Bet, CommitOutcome, Contest, ContestStatus, Settlement};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::models::contest::CONTEST_COLUMNS;
use crate::models::ContestRecord;
use crate::repositories::ledger_repo::insert_gain;

/// Repository for contest lifecycle writes and queries.
#[derive(Debug, Clone)]
pub struct ContestRepository {
    pool: SqlitePool,
}

impl ContestRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts an `open` contest and the creator's bet, returning the contest id.
    ///
    /// # Errors
    /// Returns an error if either insert fails; nothing is written in that case.
    pub async fn create(&self, contest: &Contest, bet: &Bet) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO contests
                (creator_id, claimer_id, creator_player_id, claimer_player_id, game_date,
                 entry_amount, win_bonus_enabled,
                 creator_spread, creator_cover, creator_win_bonus, creator_max_win,
                 claimer_spread, claimer_cover, claimer_win_bonus, claimer_max_win,
                 money_line, status, ended, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, 0, ?18)
            RETURNING id
            "#,
        )
        .bind(&contest.creator_id)
        .bind(&contest.claimer_id)
        .bind(&contest.creator_player_id)
        .bind(&contest.claimer_player_id)
        .bind(contest.game_date.to_string())
        .bind(contest.entry_amount.to_string())
        .bind(contest.win_bonus_enabled)
        .bind(contest.creator_terms.spread.to_string())
        .bind(contest.creator_terms.cover.to_string())
        .bind(contest.creator_terms.win_bonus.to_string())
        .bind(contest.creator_terms.max_win.to_string())
        .bind(contest.claimer_terms.spread.to_string())
        .bind(contest.claimer_terms.cover.to_string())
        .bind(contest.claimer_terms.win_bonus.to_string())
        .bind(contest.claimer_terms.max_win.to_string())
        .bind(contest.money_line.to_string())
        .bind(contest.status.as_str())
        .bind(contest.created_at.timestamp())
        .fetch_one(&mut *tx)
        .await
        .context("failed to insert contest")?;

        insert_bet(&mut tx, row.0, bet).await?;
        tx.commit().await?;

        Ok(row.0)
    }

    /// Matches an `open` contest and inserts the claimer's bet.
    ///
    /// Returns `false` without writing if the contest is no longer open, the
    /// claimer is its creator, or either player's result for the game date is
    /// already final.
    ///
    /// # Errors
    /// Returns an error if the database operation fails.
    pub async fn claim(&self, contest_id: i64, claimer_id: &str, bet: &Bet) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE contests
            SET status = 'matched', claimer_id = ?1
            WHERE id = ?2 AND status = 'open' AND ended = 0 AND creator_id <> ?1
              AND NOT EXISTS (
                  SELECT 1 FROM player_stats
                  WHERE player_stats.game_date = contests.game_date
                    AND player_stats.player_id IN (contests.creator_player_id, contests.claimer_player_id)
                    AND player_stats.is_final = 1
              )
            "#,
        )
        .bind(claimer_id)
        .bind(contest_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(contest_id, claimer_id, "Claim guard rejected write");
            return Ok(false);
        }

        insert_bet(&mut tx, contest_id, bet).await?;
        tx.commit().await?;

        Ok(true)
    }

    /// Gets a contest by id.
    ///
    /// # Errors
    /// Returns an error if the query fails or the row cannot be decoded.
    pub async fn get_by_id(&self, contest_id: i64) -> Result<Option<Contest>> {
        let record = sqlx::query_as::<_, ContestRecord>(&format!(
            "SELECT {CONTEST_COLUMNS} FROM contests WHERE id = ?1"
        ))
        .bind(contest_id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Contest::try_from).transpose()
    }

    /// Contests in `status` that have not ended, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_unresolved(&self, status: ContestStatus) -> Result<Vec<Contest>> {
        let records = sqlx::query_as::<_, ContestRecord>(&format!(
            "SELECT {CONTEST_COLUMNS} FROM contests WHERE status = ?1 AND ended = 0 ORDER BY id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Contest::try_from).collect()
    }

    /// Contests for one game date, any status.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn query_by_game_date(&self, game_date: NaiveDate) -> Result<Vec<Contest>> {
        let records = sqlx::query_as::<_, ContestRecord>(&format!(
            "SELECT {CONTEST_COLUMNS} FROM contests WHERE game_date = ?1 ORDER BY id ASC"
        ))
        .bind(game_date.to_string())
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Contest::try_from).collect()
    }

    /// Writes a settlement's contest outcome and gains as one unit.
    ///
    /// The update only applies while `ended = 0` and the contest is still in
    /// the status the settlement transitions from. A losing writer gets
    /// [`CommitOutcome::AlreadySettled`] and nothing is written.
    ///
    /// # Errors
    /// Returns an error if the database operation fails or a gain amount
    /// does not fit in minor units; the transaction is rolled back.
    pub async fn commit_settlement(&self, settlement: &Settlement) -> Result<CommitOutcome> {
        let from_status = match settlement.status {
            ContestStatus::Unmatched => ContestStatus::Open,
            ContestStatus::Closed => ContestStatus::Matched,
            other => return Err(anyhow!("settlement cannot move a contest to {other}")),
        };

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE contests
            SET status = ?1, ended = 1, ended_at = ?2, winner_id = ?3, winner_label = ?4,
                creator_win_amount = ?5, claimer_win_amount = ?6, house_profit = ?7
            WHERE id = ?8 AND ended = 0 AND status = ?9
            "#,
        )
        .bind(settlement.status.as_str())
        .bind(settlement.ended_at.timestamp())
        .bind(&settlement.winner_id)
        .bind(settlement.winner_label.as_str())
        .bind(settlement.creator_net.to_string())
        .bind(settlement.claimer_net.to_string())
        .bind(settlement.house_profit.to_string())
        .bind(settlement.contest_id)
        .bind(from_status.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::AlreadySettled);
        }

        let created_at = settlement.ended_at.timestamp();
        for gain in &settlement.gains {
            insert_gain(&mut tx, gain, created_at)
                .await
                .with_context(|| format!("contest {}: failed to write gains", settlement.contest_id))?;
        }

        tx.commit().await?;
        Ok(CommitOutcome::Committed)
    }
}

async fn insert_bet(tx: &mut Transaction<'_, Sqlite>, contest_id: i64, bet: &Bet) -> Result<()> {
    let amount_minor = to_minor_units(bet.amount)
        .ok_or_else(|| anyhow!("bet amount {} out of range", bet.amount))?;

    sqlx::query(
        r#"
        INSERT INTO bets (user_id, contest_id, side, amount_minor, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&bet.user_id)
    .bind(contest_id)
    .bind(bet.side.as_str())
    .bind(amount_minor)
    .bind(bet.placed_at.timestamp())
    .execute(&mut **tx)
    .await
    .context("failed to insert bet")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseClient;
    use chrono::{TimeZone, Utc};
    use duel_core::resolver::{resolve, resolve_unmatched};
    use duel_core::{ContestRequest, ContestSide, SideTerms, WinnerLabel};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn terms(spread: Decimal, cover: Decimal) -> SideTerms {
        SideTerms {
            spread,
            cover,
            win_bonus: Decimal::ZERO,
            max_win: cover,
        }
    }

    fn new_contest() -> (Contest, Bet) {
        let now = Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap();
        Contest::open(
            ContestRequest {
                creator_id: "alice".into(),
                creator_player_id: "p-100".into(),
                claimer_player_id: "p-200".into(),
                game_date: NaiveDate::from_ymd_opt(2025, 9, 7).unwrap(),
                entry_amount: dec!(100),
                win_bonus_enabled: false,
                money_line: dec!(2.5),
            },
            terms(dec!(-3.5), dec!(90)),
            terms(dec!(3.5), dec!(95)),
            now,
        )
    }

    async fn setup() -> (DatabaseClient, ContestRepository) {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repo = ContestRepository::new(db.pool().clone());
        (db, repo)
    }

    async fn count(db: &DatabaseClient, table: &str) -> i64 {
        let row: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap();
        row.0
    }

    // =========================================================================
    // Create / claim
    // =========================================================================

    #[tokio::test]
    async fn test_create_round_trips_contest() {
        let (db, repo) = setup().await;
        let (contest, bet) = new_contest();

        let id = repo.create(&contest, &bet).await.unwrap();
        let stored = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.status, ContestStatus::Open);
        assert_eq!(stored.creator_terms, contest.creator_terms);
        assert_eq!(stored.claimer_terms, contest.claimer_terms);
        assert_eq!(stored.money_line, dec!(2.5));
        assert_eq!(stored.created_at, contest.created_at);
        assert_eq!(count(&db, "bets").await, 1);
    }

    #[tokio::test]
    async fn test_claim_is_guarded() {
        let (db, repo) = setup().await;
        let (mut contest, bet) = new_contest();
        let id = repo.create(&contest, &bet).await.unwrap();
        contest.id = id;

        let mut self_bet = bet.clone();
        self_bet.side = ContestSide::Claimer;
        assert!(!repo.claim(id, "alice", &self_bet).await.unwrap());

        let claim_bet = contest.clone().claim("bob", contest.created_at).unwrap();
        assert!(repo.claim(id, "bob", &claim_bet).await.unwrap());
        assert!(!repo.claim(id, "carol", &claim_bet).await.unwrap());

        let stored = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.status, ContestStatus::Matched);
        assert_eq!(stored.claimer_id.as_deref(), Some("bob"));
        assert_eq!(count(&db, "bets").await, 2);
    }

    // =========================================================================
    // Settlement
    // =========================================================================

    #[tokio::test]
    async fn test_commit_settlement_once() {
        let (db, repo) = setup().await;
        let (mut contest, bet) = new_contest();
        let id = repo.create(&contest, &bet).await.unwrap();
        contest.id = id;
        let claim_bet = contest.claim("bob", contest.created_at).unwrap();
        repo.claim(id, "bob", &claim_bet).await.unwrap();

        let matched = repo.get_by_id(id).await.unwrap().unwrap();
        let settlement = resolve(&matched, dec!(25), dec!(20), contest.created_at).unwrap();

        assert_eq!(
            repo.commit_settlement(&settlement).await.unwrap(),
            CommitOutcome::Committed
        );
        assert_eq!(
            repo.commit_settlement(&settlement).await.unwrap(),
            CommitOutcome::AlreadySettled
        );

        let stored = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(stored.ended);
        assert_eq!(stored.status, ContestStatus::Closed);
        assert_eq!(stored.winner_label, Some(WinnerLabel::Creator));
        assert_eq!(stored.winner_id.as_deref(), Some("alice"));
        assert_eq!(stored.house_profit, Some(dec!(10)));
        assert_eq!(count(&db, "gains").await, 3);

        let winnings: (i64,) = sqlx::query_as(
            "SELECT amount_minor FROM gains WHERE user_id = 'alice' AND kind = 'winnings'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(winnings.0, 9_000);

        let gains = crate::LedgerRepository::new(db.pool().clone())
            .gains_for_contest(id)
            .await
            .unwrap();
        assert_eq!(gains.len(), 3);
        assert!(gains
            .iter()
            .all(|g| g.contest_id == Some(id) && g.side.is_some() && g.created_at == contest.created_at));
    }

    #[tokio::test]
    async fn test_unmatched_commit_loses_to_claim() {
        let (db, repo) = setup().await;
        let (mut contest, bet) = new_contest();
        let id = repo.create(&contest, &bet).await.unwrap();
        contest.id = id;

        // Settlement computed from the open snapshot, then a claim lands first.
        let settlement = resolve_unmatched(&contest, contest.created_at).unwrap();
        let claim_bet = contest.clone().claim("bob", contest.created_at).unwrap();
        repo.claim(id, "bob", &claim_bet).await.unwrap();

        assert_eq!(
            repo.commit_settlement(&settlement).await.unwrap(),
            CommitOutcome::AlreadySettled
        );
        assert_eq!(count(&db, "gains").await, 0);
        assert!(!repo.get_by_id(id).await.unwrap().unwrap().ended);
    }

    #[tokio::test]
    async fn test_query_unresolved_filters() {
        let (_db, repo) = setup().await;
        let (mut contest, bet) = new_contest();
        let open_id = repo.create(&contest, &bet).await.unwrap();
        let matched_id = repo.create(&contest, &bet).await.unwrap();
        contest.id = matched_id;
        let claim_bet = contest.claim("bob", contest.created_at).unwrap();
        repo.claim(matched_id, "bob", &claim_bet).await.unwrap();

        let open = repo.query_unresolved(ContestStatus::Open).await.unwrap();
        let matched = repo.query_unresolved(ContestStatus::Matched).await.unwrap();

        assert_eq!(open.iter().map(|c| c.id).collect::<Vec<_>>(), vec![open_id]);
        assert_eq!(matched.iter().map(|c| c.id).collect::<Vec<_>>(), vec![matched_id]);

        let by_date = repo
            .query_by_game_date(NaiveDate::from_ymd_opt(2025, 9, 7).unwrap())
            .await
            .unwrap();
        assert_eq!(by_date.len(), 2);
    }
}
