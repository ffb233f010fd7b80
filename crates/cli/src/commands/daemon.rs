//! Scheduler commands: the long-running daemon and one-shot job ticks.

use super::{build_engine, connect_database, ConfigArgs};
use anyhow::{anyhow, Context, Result};
use clap::Args;
use duel_core::AppConfig;
use duel_data::DatabaseClient;
use duel_feed::{FeedClient, FeedClientConfig};
use duel_scheduler::{JobKind, SettlementScheduler, TickContext};
use std::sync::Arc;
use std::time::Duration;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RunJobArgs {
    /// Job to run: player-results, win-criteria or contest-close
    #[arg(value_parser = parse_job)]
    pub job: JobKind,

    #[command(flatten)]
    pub config: ConfigArgs,
}

fn parse_job(s: &str) -> Result<JobKind, String> {
    JobKind::parse(s).ok_or_else(|| {
        format!("unknown job '{s}', expected player-results, win-criteria or contest-close")
    })
}

async fn build_scheduler(config: &AppConfig) -> Result<(DatabaseClient, SettlementScheduler)> {
    config
        .validate()
        .context("Refusing to start the scheduler with invalid configuration")?;

    let db = connect_database(config).await?;
    let engine = build_engine(config, &db)?;
    let feed = FeedClient::new(FeedClientConfig::from_settings(&config.feed)?)?;
    tracing::info!("Stats feed: {}", feed.base_url());

    let ctx = TickContext::new(engine, Arc::new(feed));
    let scheduler = SettlementScheduler::new(
        config.run_mode,
        Duration::from_secs(config.scheduler.heartbeat_secs),
        ctx,
    );
    Ok((db, scheduler))
}

/// Runs the scheduler until Ctrl+C, then waits for in-flight ticks.
///
/// # Errors
/// Returns an error if configuration is invalid or the scheduler fails to start.
pub async fn run_scheduler(args: RunArgs) -> Result<()> {
    let config = args.config.load()?;
    if !config.scheduler.enabled {
        tracing::info!("Settlement scheduler is disabled");
        return Ok(());
    }

    tracing::info!(
        run_mode = config.run_mode.as_str(),
        "Starting settlement daemon with config: {}",
        args.config.config
    );

    let (_db, scheduler) = build_scheduler(&config).await?;
    let running = scheduler.start().await?;

    tracing::info!("Press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow!("Failed to listen for shutdown signal: {e}"))?;

    running.shutdown().await
}

/// Runs one tick of a job and prints its report.
///
/// # Errors
/// Returns an error if configuration is invalid or the tick fails.
pub async fn run_job(args: RunJobArgs) -> Result<()> {
    let config = args.config.load()?;
    let (_db, scheduler) = build_scheduler(&config).await?;

    let report = scheduler.run_job(args.job).await;
    scheduler.flush_notifications().await;
    let report = report?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
