//! Payout reference tables and per-player payout curves.

use anyhow::Result;
use duel_core::{LikelihoodRow, LikelihoodTable, PayoutCurve, SpreadRow, SpreadTable};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::models::{parse_decimal, LikelihoodRecord, SpreadRecord};

#[derive(Debug, Clone)]
pub struct PayoutTableRepository {
    pool: SqlitePool,
}

impl PayoutTableRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a spread row. Older rows for the same spread stay as history;
    /// lookups pick the most recently updated one.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_spread_row(&self, row: &SpreadRow) -> Result<i64> {
        let id: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO spread_table (spread, spread_type, cover_multiplier, money_line_multiplier, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING id
            "#,
        )
        .bind(row.spread.normalize().to_string())
        .bind(row.spread_type.as_str())
        .bind(row.cover_multiplier.to_string())
        .bind(row.money_line_multiplier.to_string())
        .bind(row.updated_at.timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(id.0)
    }

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_likelihood_row(&self, row: &LikelihoodRow) -> Result<i64> {
        let id: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO likelihood_table (probability_pct, payout_multiplier, inverse_payout_multiplier, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            RETURNING id
            "#,
        )
        .bind(i64::from(row.probability_pct))
        .bind(row.payout_multiplier.to_string())
        .bind(row.inverse_payout_multiplier.to_string())
        .bind(row.updated_at.timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(id.0)
    }

    /// Loads the full spread table.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn load_spread_table(&self) -> Result<SpreadTable> {
        let records = sqlx::query_as::<_, SpreadRecord>(
            r#"
            SELECT id, spread, spread_type, cover_multiplier, money_line_multiplier, updated_at
            FROM spread_table
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = records
            .into_iter()
            .map(SpreadRow::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(SpreadTable::new(rows))
    }

    /// Loads the full likelihood table.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn load_likelihood_table(&self) -> Result<LikelihoodTable> {
        let records = sqlx::query_as::<_, LikelihoodRecord>(
            r#"
            SELECT id, probability_pct, payout_multiplier, inverse_payout_multiplier, updated_at
            FROM likelihood_table
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = records
            .into_iter()
            .map(LikelihoodRow::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(LikelihoodTable::new(rows))
    }

    /// Replaces a player's payout curve.
    ///
    /// # Errors
    /// Returns an error if any write fails; the old curve is kept in that case.
    pub async fn replace_curve(&self, player_id: &str, points: &[(u32, Decimal)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM payout_curves WHERE player_id = ?1")
            .bind(player_id)
            .execute(&mut *tx)
            .await?;

        for (total, pct) in points {
            sqlx::query(
                r#"
                INSERT INTO payout_curves (player_id, point_total, probability_pct)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(player_id, point_total) DO UPDATE SET
                    probability_pct = excluded.probability_pct
                "#,
            )
            .bind(player_id)
            .bind(i64::from(*total))
            .bind(pct.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Loads a player's payout curve; empty if none is stored.
    ///
    /// # Errors
    /// Returns an error if the query fails or a row cannot be decoded.
    pub async fn load_curve(&self, player_id: &str) -> Result<PayoutCurve> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT point_total, probability_pct
            FROM payout_curves
            WHERE player_id = ?1
            ORDER BY point_total ASC
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await?;

        let points = rows
            .into_iter()
            .map(|(total, pct)| -> Result<(u32, Decimal)> {
                let total = u32::try_from(total)?;
                Ok((total, parse_decimal("probability_pct", &pct)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PayoutCurve::new(points))
    }
}
