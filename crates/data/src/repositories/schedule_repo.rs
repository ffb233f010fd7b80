//! Persisted scheduler state: one row per job with its next eligible run.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::from_timestamp;

/// Schedule state for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobScheduleEntry {
    pub job: String,
    pub next_run_at: DateTime<Utc>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
}

type ScheduleRow = (String, i64, Option<i64>, Option<i64>, Option<String>);

fn entry_from_row(row: ScheduleRow) -> Result<JobScheduleEntry> {
    let (job, next_run_at, last_started_at, last_finished_at, last_status) = row;
    Ok(JobScheduleEntry {
        job,
        next_run_at: from_timestamp(next_run_at)?,
        last_started_at: last_started_at.map(from_timestamp).transpose()?,
        last_finished_at: last_finished_at.map(from_timestamp).transpose()?,
        last_status,
    })
}

#[derive(Debug, Clone)]
pub struct ScheduleRepository {
    pool: SqlitePool,
}

impl ScheduleRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a job if unknown. An existing schedule survives restarts untouched.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn ensure_job(&self, job: &str, first_run_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_schedule (job, next_run_at) VALUES (?1, ?2) ON CONFLICT(job) DO NOTHING",
        )
        .bind(job)
        .bind(first_run_at.timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get(&self, job: &str) -> Result<Option<JobScheduleEntry>> {
        let row: Option<ScheduleRow> = sqlx::query_as(
            r#"
            SELECT job, next_run_at, last_started_at, last_finished_at, last_status
            FROM job_schedule
            WHERE job = ?1
            "#,
        )
        .bind(job)
        .fetch_optional(&self.pool)
        .await?;

        row.map(entry_from_row).transpose()
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list(&self) -> Result<Vec<JobScheduleEntry>> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(
            r#"
            SELECT job, next_run_at, last_started_at, last_finished_at, last_status
            FROM job_schedule
            ORDER BY job ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(entry_from_row).collect()
    }

    /// Jobs whose next run is at or before `now`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT job FROM job_schedule WHERE next_run_at <= ?1 ORDER BY next_run_at ASC, job ASC",
        )
        .bind(now.timestamp())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(job,)| job).collect())
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn record_start(&self, job: &str, started_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE job_schedule SET last_started_at = ?1 WHERE job = ?2")
            .bind(started_at.timestamp())
            .bind(job)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stores the tick result and the job's next eligible run.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn record_finish(
        &self,
        job: &str,
        finished_at: DateTime<Utc>,
        status: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job_schedule (job, next_run_at, last_finished_at, last_status)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(job) DO UPDATE SET
                next_run_at = excluded.next_run_at,
                last_finished_at = excluded.last_finished_at,
                last_status = excluded.last_status
            "#,
        )
        .bind(job)
        .bind(next_run_at.timestamp())
        .bind(finished_at.timestamp())
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseClient;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 7, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_ensure_job_keeps_existing_schedule() {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repo = ScheduleRepository::new(db.pool().clone());

        repo.ensure_job("win_criteria", t0()).await.unwrap();
        repo.record_finish("win_criteria", t0(), "ok", t0() + Duration::minutes(10))
            .await
            .unwrap();
        repo.ensure_job("win_criteria", t0()).await.unwrap();

        let entry = repo.get("win_criteria").await.unwrap().unwrap();
        assert_eq!(entry.next_run_at, t0() + Duration::minutes(10));
        assert_eq!(entry.last_status.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_due_jobs() {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let repo = ScheduleRepository::new(db.pool().clone());

        repo.ensure_job("player_results", t0()).await.unwrap();
        repo.ensure_job("contest_close", t0() + Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(repo.due_jobs(t0()).await.unwrap(), vec!["player_results"]);
        assert_eq!(
            repo.due_jobs(t0() + Duration::minutes(5)).await.unwrap(),
            vec!["player_results", "contest_close"]
        );

        repo.record_start("player_results", t0()).await.unwrap();
        let entry = repo.get("player_results").await.unwrap().unwrap();
        assert_eq!(entry.last_started_at, Some(t0()));
        assert_eq!(repo.list().await.unwrap().len(), 2);
    }
}
