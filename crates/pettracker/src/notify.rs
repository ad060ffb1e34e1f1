//! Issue notifications.
//!
//! State changes (registrations, saves, location updates, geofence alerts,
//! emergencies) are reported to an external ticketing endpoint. Delivery is
//! fire-and-forget: [`Notifier::create_issue`] logs failures and always
//! returns, so a successful return says nothing about delivery.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::tag::TagId;

/// One issue to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueEvent {
    /// Issue title.
    pub title: String,
    /// Issue body.
    pub body: String,
    /// Labels, including `tag-<id>` where a tag is bound.
    pub labels: Vec<String>,
    /// The bound tag, if any.
    pub tag_id: Option<String>,
}

/// Delivers issue events somewhere.
#[async_trait]
pub trait IssueTransport: Send + Sync {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event was not accepted.
    async fn deliver(&self, event: &IssueEvent) -> Result<()>;
}

/// Posts events as JSON to a webhook.
#[derive(Debug, Clone)]
pub struct WebhookTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookTransport {
    /// Create a transport posting to `endpoint`.
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl IssueTransport for WebhookTransport {
    async fn deliver(&self, event: &IssueEvent) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Writes events to the log for manual processing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTransport;

#[async_trait]
impl IssueTransport for LogTransport {
    async fn deliver(&self, event: &IssueEvent) -> Result<()> {
        info!(
            title = %event.title,
            labels = ?event.labels,
            tag = event.tag_id.as_deref().unwrap_or("-"),
            "Issue to create: {}",
            event.body
        );
        Ok(())
    }
}

/// Fire-and-forget issue sink.
#[derive(Clone)]
pub struct Notifier {
    transport: Arc<dyn IssueTransport>,
}

impl Notifier {
    /// Wrap a transport.
    #[must_use]
    pub fn new(transport: Arc<dyn IssueTransport>) -> Self {
        Self { transport }
    }

    /// A notifier for the configured endpoint, or one that only logs.
    #[must_use]
    pub fn from_endpoint(client: reqwest::Client, endpoint: Option<&str>) -> Self {
        match endpoint {
            Some(endpoint) => Self::new(Arc::new(WebhookTransport::new(client, endpoint))),
            None => Self::new(Arc::new(LogTransport)),
        }
    }

    /// Report an event. Never fails; delivery errors are logged.
    pub async fn create_issue(
        &self,
        title: impl Into<String>,
        body: impl Into<String>,
        labels: &[&str],
        tag: Option<&TagId>,
    ) {
        let event = IssueEvent {
            title: title.into(),
            body: body.into(),
            labels: labels.iter().map(ToString::to_string).collect(),
            tag_id: tag.map(ToString::to_string),
        };

        match self.transport.deliver(&event).await {
            Ok(()) => debug!(title = %event.title, "Issue created"),
            Err(e) => {
                warn!(error = %e, title = %event.title, "Failed to create issue");
                info!(
                    title = %event.title,
                    labels = ?event.labels,
                    tag = event.tag_id.as_deref().unwrap_or("-"),
                    "Issue to create: {}",
                    event.body
                );
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
