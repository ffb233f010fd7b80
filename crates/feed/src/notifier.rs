//! Webhook delivery of settlement notifications.

use crate::error::{FeedError, Result};
use async_trait::async_trait;
use duel_core::{Notifier, SettlementEvent};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    user_id: &'a str,
    template: &'static str,
    context: &'a serde_json::Value,
}

/// Posts `{user_id, template, context}` JSON to a configured endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    url: String,
    http: Client,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| FeedError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
        })
    }

    /// Sends a single event.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-success status.
    pub async fn send(&self, event: &SettlementEvent) -> Result<()> {
        let payload = WebhookPayload {
            user_id: &event.user_id,
            template: event.template.as_str(),
            context: &event.context,
        };

        tracing::debug!(
            user_id = %event.user_id,
            contest_id = event.contest_id,
            template = event.template.as_str(),
            "POST {}",
            self.url
        );

        let response = self.http.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeedError::api(status.as_u16(), text));
        }

        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &SettlementEvent) -> anyhow::Result<()> {
        Ok(self.send(event).await?)
    }
}
