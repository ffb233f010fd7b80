//! CLI commands for the contest settlement engine.

pub mod contest;
pub mod daemon;
pub mod migrate;
pub mod quote;
pub mod wallet;

pub use contest::{run_claim_contest, run_open_contest, ClaimContestArgs, OpenContestArgs};
pub use daemon::{run_job, run_scheduler, RunArgs, RunJobArgs};
pub use migrate::{run_migrate, MigrateArgs};
pub use quote::{run_quote, QuoteArgs};
pub use wallet::{run_balance, BalanceArgs};

use anyhow::{Context, Result};
use clap::Args;
use duel_core::{AppConfig, ConfigLoader, LogNotifier, Notifier, SettlementEngine};
use duel_data::{DatabaseClient, SqliteContestStore};
use duel_feed::WebhookNotifier;
use std::sync::Arc;

/// Configuration source shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Profile overlay, e.g. `principal` loads `config/Config.principal.toml`
    #[arg(long, env = "DUEL_PROFILE")]
    pub profile: Option<String>,
}

impl ConfigArgs {
    /// # Errors
    /// Returns an error if a config file cannot be parsed.
    pub fn load(&self) -> Result<AppConfig> {
        let config = match &self.profile {
            Some(profile) => ConfigLoader::load_with_profile(&self.config, profile),
            None => ConfigLoader::load_from(&self.config),
        }
        .with_context(|| format!("Failed to load configuration from {}", self.config))?;

        tracing::debug!(run_mode = config.run_mode.as_str(), "Configuration loaded");
        Ok(config)
    }
}

/// Opens the configured database, creating the SQLite file's directory first.
///
/// # Errors
/// Returns an error if the directory cannot be created or migrations fail.
pub async fn connect_database(config: &AppConfig) -> Result<DatabaseClient> {
    let url = &config.database.url;
    if let Some(file_path) = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
    {
        let path = std::path::Path::new(file_path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && file_path != ":memory:" {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }
    }

    tracing::info!("Opening database at: {}", url);
    DatabaseClient::new(url, config.database.max_connections).await
}

/// Webhook notifier when a URL is configured, log-only otherwise.
///
/// # Errors
/// Returns an error if the webhook client cannot be built.
pub fn build_notifier(config: &AppConfig) -> Result<Arc<dyn Notifier>> {
    match config.notifications.webhook_url.as_deref() {
        Some(url) if !url.trim().is_empty() => {
            tracing::info!("Sending notifications to webhook");
            Ok(Arc::new(WebhookNotifier::new(url, config.feed.timeout_secs)?))
        }
        _ => Ok(Arc::new(LogNotifier)),
    }
}

/// # Errors
/// Returns an error if the notifier cannot be built.
pub fn build_engine(
    config: &AppConfig,
    db: &DatabaseClient,
) -> Result<SettlementEngine<SqliteContestStore>> {
    let store = Arc::new(SqliteContestStore::new(db));
    Ok(SettlementEngine::new(store, build_notifier(config)?))
}
