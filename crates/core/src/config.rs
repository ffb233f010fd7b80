use crate::ledger::FeeSchedule;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deployment profile. Controls how often scheduled jobs fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Principal,
    Staging,
    Proxy,
}

impl RunMode {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principal => "principal",
            Self::Staging => "staging",
            Self::Proxy => "proxy",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub run_mode: RunMode,
    pub database: DatabaseConfig,
    pub feed: FeedConfig,
    pub scheduler: SchedulerConfig,
    pub payments: PaymentConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    /// Subscription key for the statistics feed. Required to run the scheduler.
    #[serde(default)]
    pub api_key: Option<String>,
    pub requests_per_minute: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// How often the heartbeat checks persisted next-run timestamps.
    pub heartbeat_secs: u64,
}

/// Payment processor fee schedule, in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Percentage fee as a fraction (0.029 = 2.9%).
    pub fee_percent: Decimal,
    pub fee_fixed_minor: i64,
    pub min_withdrawal_minor: i64,
}

impl PaymentConfig {
    #[must_use]
    pub fn fee_schedule(&self) -> FeeSchedule {
        FeeSchedule {
            percent: self.fee_percent,
            fixed_minor: self.fee_fixed_minor,
            min_withdrawal_minor: self.min_withdrawal_minor,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Errors raised while validating configuration at process start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required secret: {0}")]
    MissingSecret(&'static str),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl AppConfig {
    /// Checks the settings the scheduler cannot run without.
    ///
    /// # Errors
    /// Returns an error if the feed API key is missing or a numeric setting is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.feed.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingSecret("feed.api_key")),
        }

        if self.feed.requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                field: "feed.requests_per_minute",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.scheduler.heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "scheduler.heartbeat_secs",
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.payments.fee_percent < Decimal::ZERO || self.payments.fee_percent >= Decimal::ONE {
            return Err(ConfigError::Invalid {
                field: "payments.fee_percent",
                reason: format!("{} is outside [0, 1)", self.payments.fee_percent),
            });
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::Staging,
            database: DatabaseConfig {
                url: "sqlite://data/duel.db".to_string(),
                max_connections: 5,
            },
            feed: FeedConfig {
                base_url: "https://api.sportsdata.io/v3/nfl".to_string(),
                api_key: None,
                requests_per_minute: 60,
                timeout_secs: 30,
            },
            scheduler: SchedulerConfig {
                enabled: true,
                heartbeat_secs: 15,
            },
            payments: PaymentConfig {
                fee_percent: Decimal::new(29, 3),
                fee_fixed_minor: 30,
                min_withdrawal_minor: 500,
            },
            notifications: NotificationConfig::default(),
        }
    }
}
