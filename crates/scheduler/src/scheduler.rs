use crate::jobs::{interval_for, JobKind, TickReport};
use crate::ticks::{self, TickContext};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use duel_core::RunMode;
use duel_data::ScheduleRepository;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};

/// Drives the three settlement jobs from persisted next-run timestamps.
#[derive(Clone)]
pub struct SettlementScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    run_mode: RunMode,
    heartbeat: std::time::Duration,
    ctx: TickContext,
    schedule: ScheduleRepository,
    guards: HashMap<JobKind, Arc<Mutex<()>>>,
    stopping: AtomicBool,
}

/// Handle to a started scheduler.
pub struct RunningScheduler {
    cron: JobScheduler,
    scheduler: SettlementScheduler,
}

impl SettlementScheduler {
    #[must_use]
    pub fn new(run_mode: RunMode, heartbeat: std::time::Duration, ctx: TickContext) -> Self {
        let schedule = ctx.engine.store().repositories().schedule.clone();
        let guards = JobKind::ALL
            .into_iter()
            .map(|job| (job, Arc::new(Mutex::new(()))))
            .collect();

        Self {
            inner: Arc::new(Inner {
                run_mode,
                heartbeat,
                ctx,
                schedule,
                guards,
                stopping: AtomicBool::new(false),
            }),
        }
    }

    /// Registers every job and starts the heartbeat.
    ///
    /// Jobs already present in `job_schedule` keep their persisted next-run time.
    ///
    /// # Errors
    /// Returns an error if the job table cannot be seeded or the heartbeat fails to start.
    pub async fn start(&self) -> Result<RunningScheduler> {
        let now = Utc::now();
        for job in JobKind::ALL {
            self.inner
                .schedule
                .ensure_job(job.as_str(), now)
                .await
                .with_context(|| format!("Failed to register job {job}"))?;
        }

        info!(
            run_mode = self.inner.run_mode.as_str(),
            heartbeat_secs = self.inner.heartbeat.as_secs(),
            "Starting settlement scheduler"
        );

        let cron = JobScheduler::new().await?;
        let scheduler = self.clone();
        let heartbeat = Job::new_repeated_async(self.inner.heartbeat, move |_uuid, _lock| {
            let scheduler = scheduler.clone();
            Box::pin(async move {
                if let Err(e) = scheduler.run_due().await {
                    error!("Heartbeat failed: {:#}", e);
                }
            })
        })?;

        cron.add(heartbeat).await?;
        cron.start().await?;

        info!("Settlement scheduler started");
        Ok(RunningScheduler {
            cron,
            scheduler: self.clone(),
        })
    }

    /// Starts every due job that is not already running. Returns the jobs started.
    ///
    /// # Errors
    /// Returns an error if the due jobs cannot be read.
    pub async fn run_due(&self) -> Result<Vec<JobKind>> {
        if self.inner.stopping.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }

        let due = self.inner.schedule.due_jobs(Utc::now()).await?;
        let mut started = Vec::new();

        for name in due {
            let Some(job) = JobKind::parse(&name) else {
                warn!(job = %name, "Unknown job in schedule table");
                continue;
            };

            let Some(guard) = self.inner.try_claim(job) else {
                if self.inner.stopping.load(Ordering::SeqCst) {
                    break;
                }
                continue;
            };

            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if let Err(e) = inner.execute(job, guard).await {
                    error!(%job, "Tick failed: {:#}", e);
                }
            });
            started.push(job);
        }

        Ok(started)
    }

    /// Stops `run_due` from starting new ticks. In-flight ticks run to completion.
    pub fn stop_accepting(&self) {
        self.inner.stopping.store(true, Ordering::SeqCst);
    }

    /// Waits for settlement notifications still being delivered.
    pub async fn flush_notifications(&self) {
        self.inner.ctx.engine.flush_notifications().await;
    }

    /// Runs one tick of `job` now, waiting for any in-flight tick of the same job first.
    ///
    /// # Errors
    /// Returns an error if the tick fails or panics.
    pub async fn run_job(&self, job: JobKind) -> Result<TickReport> {
        let guard = Arc::clone(&self.inner.guards[&job]).lock_owned().await;
        self.inner.execute(job, guard).await
    }
}

impl Inner {
    /// Takes the job's guard unless a tick is in flight or shutdown has begun.
    ///
    /// `stopping` is read again under the guard: shutdown sets it before
    /// draining the guards, so a heartbeat that lost that race sees it here.
    fn try_claim(&self, job: JobKind) -> Option<OwnedMutexGuard<()>> {
        let Ok(guard) = Arc::clone(&self.guards[&job]).try_lock_owned() else {
            debug!(%job, "Previous tick still running");
            return None;
        };
        if self.stopping.load(Ordering::SeqCst) {
            debug!(%job, "Scheduler stopping, tick not started");
            return None;
        }
        Some(guard)
    }

    async fn execute(&self, job: JobKind, _guard: OwnedMutexGuard<()>) -> Result<TickReport> {
        let started_at = Utc::now();
        if let Err(e) = self.schedule.record_start(job.as_str(), started_at).await {
            warn!(%job, error = %e, "Failed to record tick start");
        }
        info!(%job, "Tick started");

        let ctx = self.ctx.clone();
        let today = started_at.date_naive();
        let handle = tokio::spawn(async move {
            match job {
                JobKind::PlayerResults => ticks::player_results(&ctx, today).await,
                JobKind::WinCriteria => ticks::win_criteria(&ctx, today).await,
                JobKind::ContestClose => ticks::contest_close(&ctx, today).await,
            }
        });

        let (status, result) = match handle.await {
            Ok(Ok(report)) => (report.status(), Ok(report)),
            Ok(Err(e)) => ("failed", Err(e)),
            Err(join_err) => ("panicked", Err(anyhow!("tick for {job} panicked: {join_err}"))),
        };

        let finished_at = Utc::now();
        let next_run_at = finished_at + interval_for(job, self.run_mode);
        if let Err(e) = self
            .schedule
            .record_finish(job.as_str(), finished_at, status, next_run_at)
            .await
        {
            error!(%job, error = %e, "Failed to persist next run time");
        }

        info!(%job, status, next_run_at = %next_run_at, "Tick finished");
        result
    }
}

impl RunningScheduler {
    #[must_use]
    pub fn scheduler(&self) -> &SettlementScheduler {
        &self.scheduler
    }

    /// Stops the heartbeat, waits for in-flight ticks, then for their notifications.
    ///
    /// # Errors
    /// Returns an error if the heartbeat cannot be stopped.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Stopping settlement scheduler");
        self.scheduler.stop_accepting();
        self.cron.shutdown().await?;

        for job in JobKind::ALL {
            let _idle = self.scheduler.inner.guards[&job].lock().await;
        }
        self.scheduler.flush_notifications().await;

        info!("Settlement scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use duel_core::{
        GameSchedule, LogNotifier, PlayerProjection, PlayerResult, SettlementEngine, StatsFeed,
    };
    use duel_data::{DatabaseClient, SqliteContestStore};

    struct QuietFeed;

    #[async_trait]
    impl StatsFeed for QuietFeed {
        async fn schedule_for_current_week(&self) -> Result<Vec<GameSchedule>> {
            Ok(Vec::new())
        }

        async fn final_fantasy_points(&self, _date: NaiveDate) -> Result<Vec<PlayerResult>> {
            Ok(Vec::new())
        }

        async fn projected_fantasy_points(&self, _date: NaiveDate) -> Result<Vec<PlayerProjection>> {
            Ok(Vec::new())
        }
    }

    async fn scheduler_with_due_jobs() -> SettlementScheduler {
        let db = DatabaseClient::new_in_memory().await.unwrap();
        let store = Arc::new(SqliteContestStore::new(&db));
        let past = Utc::now() - chrono::Duration::minutes(5);
        for job in JobKind::ALL {
            store
                .repositories()
                .schedule
                .ensure_job(job.as_str(), past)
                .await
                .unwrap();
        }
        let engine = SettlementEngine::new(store, Arc::new(LogNotifier));
        let ctx = TickContext::new(engine, Arc::new(QuietFeed));
        SettlementScheduler::new(RunMode::Proxy, std::time::Duration::from_secs(1), ctx)
    }

    #[tokio::test]
    async fn test_run_due_starts_nothing_once_stopping() {
        let scheduler = scheduler_with_due_jobs().await;
        scheduler.stop_accepting();

        assert!(scheduler.run_due().await.unwrap().is_empty());

        let entries = scheduler.inner.schedule.list().await.unwrap();
        assert!(entries.iter().all(|e| e.last_started_at.is_none()));
    }

    #[tokio::test]
    async fn test_guard_taken_after_shutdown_began_is_released() {
        let scheduler = scheduler_with_due_jobs().await;
        let inner = &scheduler.inner;

        assert!(inner.try_claim(JobKind::WinCriteria).is_some());

        // Shutdown flips the flag after this heartbeat passed its first check.
        scheduler.stop_accepting();
        assert!(inner.try_claim(JobKind::WinCriteria).is_none());
        assert!(inner.guards[&JobKind::WinCriteria].try_lock().is_ok());
    }

    #[tokio::test]
    async fn test_busy_job_is_skipped() {
        let scheduler = scheduler_with_due_jobs().await;
        let _in_flight = Arc::clone(&scheduler.inner.guards[&JobKind::ContestClose])
            .try_lock_owned()
            .unwrap();

        let started = scheduler.run_due().await.unwrap();
        assert_eq!(started.len(), 2);
        assert!(!started.contains(&JobKind::ContestClose));
    }
}
