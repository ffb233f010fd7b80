//! Sports-statistics feed integration.
//!
//! - [`FeedClient`]: rate-limited REST client implementing [`duel_core::StatsFeed`]
//! - [`WebhookNotifier`]: posts settlement notifications to an HTTP endpoint

pub mod client;
pub mod error;
pub mod notifier;

pub use client::{FeedClient, FeedClientConfig, API_KEY_HEADER};
pub use error::{FeedError, Result};
pub use notifier::WebhookNotifier;
