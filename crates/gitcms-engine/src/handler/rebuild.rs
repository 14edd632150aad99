//! Downstream rebuild notification
//!
//! Sent after a commit lands so the static site can rebuild. Delivery is best
//! effort: the handler spawns it and only logs a failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gitcms_core::errors::{CmsError, ErrorKind, Result};
use gitcms_core::CollectionKind;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// What changed, as posted to the hook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildNotice {
    pub commit: String,
    pub collections: Vec<CollectionKind>,
    pub triggered_at: DateTime<Utc>,
}

#[async_trait]
pub trait RebuildTrigger: Send + Sync {
    async fn trigger(&self, notice: &RebuildNotice) -> Result<()>;
}

/// Does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRebuildTrigger;

#[async_trait]
impl RebuildTrigger for NoopRebuildTrigger {
    async fn trigger(&self, _: &RebuildNotice) -> Result<()> {
        Ok(())
    }
}

/// POSTs the notice as JSON to a deploy hook URL
pub struct WebhookRebuildTrigger {
    client: Client,
    url: String,
}

impl WebhookRebuildTrigger {
    /// # Errors
    ///
    /// `Config` if the URL is empty or the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(CmsError::new(ErrorKind::Config)
                .with_op("rebuild_trigger")
                .with_message("Rebuild hook URL is empty"));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            CmsError::new(ErrorKind::Config)
                .with_op("rebuild_trigger")
                .with_message(e.to_string())
        })?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl RebuildTrigger for WebhookRebuildTrigger {
    async fn trigger(&self, notice: &RebuildNotice) -> Result<()> {
        let unavailable = |message: String| {
            CmsError::new(ErrorKind::RemoteUnavailable)
                .with_op("rebuild_trigger")
                .with_message(message)
        };

        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("Rebuild hook returned HTTP {}", status)));
        }

        tracing::debug!(commit = %notice.commit, "Rebuild hook accepted");
        Ok(())
    }
}
