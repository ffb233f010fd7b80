//! Ingested projected and final fantasy points per player and date.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use duel_core::{PlayerProjection, PlayerResult};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::models::{parse_decimal, parse_optional_decimal};

#[derive(Debug, Clone)]
pub struct PlayerStatsRepository {
    pool: SqlitePool,
}

impl PlayerStatsRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upserts projections for one date in a single transaction.
    ///
    /// # Errors
    /// Returns an error if any write fails.
    pub async fn upsert_projections(
        &self,
        date: NaiveDate,
        projections: &[PlayerProjection],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for p in projections {
            sqlx::query(
                r#"
                INSERT INTO player_stats (player_id, game_date, projected_points, opponent, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(player_id, game_date) DO UPDATE SET
                    projected_points = excluded.projected_points,
                    opponent = excluded.opponent,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&p.player_id)
            .bind(date.to_string())
            .bind(p.projected_points.to_string())
            .bind(&p.opponent)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(projections.len())
    }

    /// Upserts results for one date. A result already marked final is never
    /// downgraded by a later non-final report.
    ///
    /// # Errors
    /// Returns an error if any write fails.
    pub async fn upsert_results(
        &self,
        date: NaiveDate,
        results: &[PlayerResult],
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;

        for r in results {
            sqlx::query(
                r#"
                INSERT INTO player_stats (player_id, game_date, final_points, is_final, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(player_id, game_date) DO UPDATE SET
                    final_points = excluded.final_points,
                    is_final = excluded.is_final,
                    updated_at = excluded.updated_at
                WHERE player_stats.is_final = 0
                "#,
            )
            .bind(&r.player_id)
            .bind(date.to_string())
            .bind(r.points.to_string())
            .bind(r.is_final)
            .bind(now.timestamp())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(results.len())
    }

    /// # Errors
    /// Returns an error if the query fails or the stored value is malformed.
    pub async fn projected_points(
        &self,
        player_id: &str,
        date: NaiveDate,
    ) -> Result<Option<Decimal>> {
        let row: Option<(Option<String>,)> = sqlx::query_as(
            "SELECT projected_points FROM player_stats WHERE player_id = ?1 AND game_date = ?2",
        )
        .bind(player_id)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        parse_optional_decimal("projected_points", row.and_then(|(p,)| p).as_deref())
    }

    /// True once the player's result for `date` is stored as final.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn is_final(&self, player_id: &str, date: NaiveDate) -> Result<bool> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT is_final FROM player_stats WHERE player_id = ?1 AND game_date = ?2",
        )
        .bind(player_id)
        .bind(date.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some_and(|(is_final,)| is_final))
    }

    /// Stored results for a date, for players that have reported points.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored value is malformed.
    pub async fn results_for_date(&self, date: NaiveDate) -> Result<Vec<PlayerResult>> {
        let rows: Vec<(String, String, bool)> = sqlx::query_as(
            r#"
            SELECT player_id, final_points, is_final
            FROM player_stats
            WHERE game_date = ?1 AND final_points IS NOT NULL
            ORDER BY player_id ASC
            "#,
        )
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(player_id, points, is_final)| -> Result<PlayerResult> {
                Ok(PlayerResult {
                    player_id,
                    is_final,
                    points: parse_decimal("final_points", &points)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseClient;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 7).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 7, 12, 0, 0).unwrap()
    }

    async fn setup() -> PlayerStatsRepository {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        PlayerStatsRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_projection_upsert() {
        let repo = setup().await;
        let mut projection = PlayerProjection {
            player_id: "p-100".into(),
            projected_points: dec!(17.2),
            opponent: Some("KC".into()),
        };
        repo.upsert_projections(date(), &[projection.clone()], now())
            .await
            .unwrap();
        projection.projected_points = dec!(18.4);
        repo.upsert_projections(date(), &[projection], now())
            .await
            .unwrap();

        assert_eq!(
            repo.projected_points("p-100", date()).await.unwrap(),
            Some(dec!(18.4))
        );
        assert_eq!(repo.projected_points("p-200", date()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_final_result_is_sticky() {
        let repo = setup().await;
        let result = |points, is_final| PlayerResult {
            player_id: "p-100".into(),
            is_final,
            points,
        };

        repo.upsert_results(date(), &[result(dec!(10), false)], now())
            .await
            .unwrap();
        repo.upsert_results(date(), &[result(dec!(21.5), true)], now())
            .await
            .unwrap();
        repo.upsert_results(date(), &[result(dec!(3), false)], now())
            .await
            .unwrap();

        let stored = repo.results_for_date(date()).await.unwrap();
        assert_eq!(stored, vec![result(dec!(21.5), true)]);
        assert!(repo.is_final("p-100", date()).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_final_requires_official_result() {
        let repo = setup().await;
        assert!(!repo.is_final("p-100", date()).await.unwrap());

        repo.upsert_projections(
            date(),
            &[PlayerProjection {
                player_id: "p-100".into(),
                projected_points: dec!(17.2),
                opponent: None,
            }],
            now(),
        )
        .await
        .unwrap();
        assert!(!repo.is_final("p-100", date()).await.unwrap());

        repo.upsert_results(
            date(),
            &[PlayerResult {
                player_id: "p-100".into(),
                is_final: true,
                points: dec!(9),
            }],
            now(),
        )
        .await
        .unwrap();
        assert!(repo.is_final("p-100", date()).await.unwrap());
        assert!(!repo
            .is_final("p-100", date().succ_opt().unwrap())
            .await
            .unwrap());
    }
}
