//! Outbound HTTP helpers: a capped-retry fetch and reverse geocoding.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// Shown when the geocoder answered but had no usable name.
pub const UNKNOWN_ADDRESS: &str = "Unknown address";

/// Shown when the geocoder could not be reached.
pub const ADDRESS_UNAVAILABLE: &str = "Address unavailable";

/// Retry schedule for [`fetch_with_retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay after the first failure; doubles after each further failure.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.network.retry_attempts,
            base_delay: config.retry_base_delay(),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (zero-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// GET `url`, retrying failed attempts with a doubling delay.
///
/// A non-success status counts as a failure. There is no delay after the
/// last attempt.
///
/// # Errors
///
/// Returns the error from the last attempt.
pub async fn fetch_with_retry(
    client: &reqwest::Client,
    url: &str,
    policy: RetryPolicy,
) -> Result<reqwest::Response> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        let outcome = match client.get(url).send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => Error::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            },
            Err(e) => Error::Http(e),
        };

        attempt += 1;
        if attempt >= attempts {
            warn!(url, attempts, error = %outcome, "Fetch failed");
            return Err(outcome);
        }

        let delay = policy.delay_after(attempt - 1);
        debug!(url, attempt, delay = ?delay, error = %outcome, "Fetch failed, retrying");
        tokio::time::sleep(delay).await;
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    display_name: Option<String>,
    locality: Option<String>,
}

/// Best-effort reverse geocoder.
#[derive(Debug, Clone)]
pub struct Geocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl Geocoder {
    /// Create a geocoder for `endpoint`.
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Look up a human-readable address. Never fails.
    pub async fn address_for(&self, lat: f64, lng: f64) -> String {
        match self.lookup(lat, lng).await {
            Ok(body) => body
                .display_name
                .filter(|s| !s.is_empty())
                .or(body.locality.filter(|s| !s.is_empty()))
                .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
            Err(e) => {
                warn!(error = %e, lat, lng, "Geocoding failed");
                ADDRESS_UNAVAILABLE.to_string()
            }
        }
    }

    async fn lookup(&self, lat: f64, lng: f64) -> Result<GeocodeResponse> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("latitude", lat.to_string()),
                ("longitude", lng.to_string()),
                ("localityLanguage", "en".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}
