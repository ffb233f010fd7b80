//! Ledger repository.
//!
//! Rows are append-only. The only updates stamp external transfer, payout
//! or refund identifiers once money actually moves.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use duel_core::ledger::to_minor_units;
use duel_core::{Gain, LedgerBet, NewGain, TopUp, WalletBalance};
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::models::{BetRecord, GainRecord, TopUpRecord};

/// Repository for gains, bets, top-ups and balance derivation.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Derived balance for a user, computed from eligible rows.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn balance(&self, user_id: &str) -> Result<WalletBalance> {
        let (top_ups, gains, bets): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COALESCE(SUM(amount_minor), 0) FROM top_ups
                  WHERE user_id = ?1 AND transferred = 0 AND refunded = 0),
                (SELECT COALESCE(SUM(amount_minor), 0) FROM gains
                  WHERE user_id = ?1 AND transferred = 0),
                (SELECT COALESCE(SUM(amount_minor), 0) FROM bets
                  WHERE user_id = ?1 AND transferred = 0)
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(WalletBalance {
            top_ups,
            gains,
            bets,
        })
    }

    /// Appends gains outside a settlement (operator adjustments), all or nothing.
    ///
    /// # Errors
    /// Returns an error if an amount is out of range or any insert fails.
    pub async fn append(&self, gains: &[NewGain], created_at: DateTime<Utc>) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;
        let mut ids = Vec::with_capacity(gains.len());

        for gain in gains {
            ids.push(insert_gain(&mut tx, gain, created_at.timestamp()).await?);
        }

        tx.commit().await?;
        Ok(ids)
    }

    /// Records a deposit captured by the payment collaborator.
    ///
    /// # Errors
    /// Returns an error if the amount is not positive or the insert fails.
    pub async fn record_top_up(
        &self,
        user_id: &str,
        amount: Decimal,
        charge_id: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<i64> {
        let amount_minor = to_minor_units(amount)
            .filter(|a| *a > 0)
            .ok_or_else(|| anyhow!("top-up amount must be positive, got {amount}"))?;

        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO top_ups (user_id, amount_minor, charge_id, created_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(amount_minor)
        .bind(charge_id)
        .bind(created_at.timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn gains_for_user(&self, user_id: &str) -> Result<Vec<Gain>> {
        let records = sqlx::query_as::<_, GainRecord>(
            r#"
            SELECT id, user_id, contest_id, side, kind, amount_minor, note,
                   transferred, transfer_id, paid, payout_id, created_at
            FROM gains
            WHERE user_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Gain::try_from).collect()
    }

    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn gains_for_contest(&self, contest_id: i64) -> Result<Vec<Gain>> {
        let records = sqlx::query_as::<_, GainRecord>(
            r#"
            SELECT id, user_id, contest_id, side, kind, amount_minor, note,
                   transferred, transfer_id, paid, payout_id, created_at
            FROM gains
            WHERE contest_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(contest_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Gain::try_from).collect()
    }

    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn bets_for_user(&self, user_id: &str) -> Result<Vec<LedgerBet>> {
        let records = sqlx::query_as::<_, BetRecord>(
            r#"
            SELECT id, user_id, contest_id, side, amount_minor, transferred, transfer_id, created_at
            FROM bets
            WHERE user_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(LedgerBet::try_from).collect()
    }

    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn top_ups_for_user(&self, user_id: &str) -> Result<Vec<TopUp>> {
        let records = sqlx::query_as::<_, TopUpRecord>(
            r#"
            SELECT id, user_id, amount_minor, transferred, refunded, charge_id, created_at
            FROM top_ups
            WHERE user_id = ?1
            ORDER BY id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(TopUp::try_from).collect()
    }

    /// Stamps a gain as moved out of the platform balance.
    ///
    /// # Errors
    /// Returns an error if the gain does not exist or was already transferred.
    pub async fn mark_gain_transferred(&self, gain_id: i64, transfer_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE gains SET transferred = 1, transfer_id = ?1 WHERE id = ?2 AND transferred = 0",
        )
        .bind(transfer_id)
        .bind(gain_id)
        .execute(&self.pool)
        .await?;

        ensure_stamped(result.rows_affected(), "gain", gain_id)
    }

    /// Stamps a gain as paid out by the payment processor.
    ///
    /// # Errors
    /// Returns an error if the gain does not exist or was already paid.
    pub async fn mark_gain_paid(&self, gain_id: i64, payout_id: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE gains SET paid = 1, payout_id = ?1 WHERE id = ?2 AND paid = 0")
                .bind(payout_id)
                .bind(gain_id)
                .execute(&self.pool)
                .await?;

        ensure_stamped(result.rows_affected(), "gain", gain_id)
    }

    /// # Errors
    /// Returns an error if the bet does not exist or was already transferred.
    pub async fn mark_bet_transferred(&self, bet_id: i64, transfer_id: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE bets SET transferred = 1, transfer_id = ?1 WHERE id = ?2 AND transferred = 0",
        )
        .bind(transfer_id)
        .bind(bet_id)
        .execute(&self.pool)
        .await?;

        ensure_stamped(result.rows_affected(), "bet", bet_id)
    }

    /// # Errors
    /// Returns an error if the top-up does not exist or was already transferred.
    pub async fn mark_top_up_transferred(&self, top_up_id: i64) -> Result<()> {
        let result =
            sqlx::query("UPDATE top_ups SET transferred = 1 WHERE id = ?1 AND transferred = 0")
                .bind(top_up_id)
                .execute(&self.pool)
                .await?;

        ensure_stamped(result.rows_affected(), "top-up", top_up_id)
    }

    /// # Errors
    /// Returns an error if the top-up does not exist or was already refunded.
    pub async fn mark_top_up_refunded(&self, top_up_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE top_ups SET refunded = 1 WHERE id = ?1 AND refunded = 0")
            .bind(top_up_id)
            .execute(&self.pool)
            .await?;

        ensure_stamped(result.rows_affected(), "top-up", top_up_id)
    }
}

/// Inserts one gain row inside `tx`. A `contest_id` of zero is stored as `NULL`.
pub(crate) async fn insert_gain(
    tx: &mut Transaction<'_, Sqlite>,
    gain: &NewGain,
    created_at: i64,
) -> Result<i64> {
    let amount_minor = gain
        .amount_minor()
        .ok_or_else(|| anyhow!("gain amount {} for {} out of range", gain.amount, gain.user_id))?;
    let contest_id = (gain.contest_id > 0).then_some(gain.contest_id);
    let side = contest_id.map(|_| gain.side.as_str());

    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO gains (user_id, contest_id, side, kind, amount_minor, note, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        RETURNING id
        "#,
    )
    .bind(&gain.user_id)
    .bind(contest_id)
    .bind(side)
    .bind(gain.kind.as_str())
    .bind(amount_minor)
    .bind(&gain.note)
    .bind(created_at)
    .fetch_one(&mut **tx)
    .await
    .context("failed to insert gain")?;

    Ok(row.0)
}

fn ensure_stamped(rows_affected: u64, entity: &str, id: i64) -> Result<()> {
    if rows_affected == 0 {
        bail!("{entity} {id} not found or already stamped");
    }
    Ok(())
}
