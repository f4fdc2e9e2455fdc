//! Webhook delivery for fence transitions

use futures::future::join_all;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn, Instrument};
use url::Url;

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::models::{ResolvedFence, TransitionKind};

/// Why a single delivery failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    /// The fence's URL could not be parsed
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// No response within the configured timeout
    #[error("Webhook timed out: {0}")]
    Timeout(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status
    #[error("Webhook returned {0}")]
    Status(u16),
}

impl From<reqwest::Error> for WebhookError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Result of delivering one fence's webhook
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookOutcome {
    /// Fence the webhook belongs to
    pub fence_id: String,
    /// Destination as configured on the fence
    pub url: String,
    /// Response status on success
    pub result: std::result::Result<u16, WebhookError>,
}

impl WebhookOutcome {
    /// Whether the endpoint accepted the delivery
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload<'a> {
    geofence_id: &'a str,
    transition: TransitionKind,
}

/// Posts one best-effort request per fence carrying a webhook URL
pub struct WebhookDispatcher {
    client: Client,
    parallel: bool,
    span: tracing::Span,
}

impl WebhookDispatcher {
    /// Create a dispatcher whose requests are bounded by connect + read timeout
    pub fn new(config: &WebhookConfig, span: tracing::Span) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.total_timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            parallel: config.parallel,
            span,
        })
    }

    /// Deliver webhooks for `fences`; outcomes follow fence order
    ///
    /// Fences without a webhook URL produce no outcome. Nothing is retried.
    pub async fn deliver_all(&self, fences: &[ResolvedFence]) -> Vec<WebhookOutcome> {
        let targets = fences
            .iter()
            .filter_map(|fence| fence.record.webhook_url().map(|url| (fence, url)));

        async {
            if self.parallel {
                join_all(targets.map(|(fence, url)| self.deliver(fence, url))).await
            } else {
                let mut outcomes = Vec::new();
                for (fence, url) in targets {
                    outcomes.push(self.deliver(fence, url).await);
                }
                outcomes
            }
        }
        .instrument(self.span.clone())
        .await
    }

    /// Deliver a single webhook, capturing any failure in the outcome
    pub async fn deliver(&self, fence: &ResolvedFence, url: &str) -> WebhookOutcome {
        let result = self.send(fence, url).await;

        match &result {
            Ok(status) => {
                info!(fence_id = %fence.id(), url = %url, status, "Sent geofence transition to server");
            }
            Err(e) => {
                warn!(fence_id = %fence.id(), url = %url, error = %e, "Error while sending geofence transition");
            }
        }

        WebhookOutcome {
            fence_id: fence.id().to_string(),
            url: url.to_string(),
            result,
        }
    }

    async fn send(
        &self,
        fence: &ResolvedFence,
        url: &str,
    ) -> std::result::Result<u16, WebhookError> {
        let url = parse_url(url)?;

        let payload = WebhookPayload {
            geofence_id: fence.id(),
            transition: fence.transition,
        };

        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .json(&payload);

        if let Some(auth) = fence.record.webhook_auth_header() {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(WebhookError::Status(status.as_u16()));
        }

        Ok(status.as_u16())
    }
}

fn parse_url(raw: &str) -> std::result::Result<Url, WebhookError> {
    let url = Url::parse(raw).map_err(|e| WebhookError::InvalidUrl(format!("{raw}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(WebhookError::InvalidUrl(format!(
            "{raw}: unsupported scheme {scheme}"
        ))),
    }
}
