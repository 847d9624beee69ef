use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::{handle_reqwest_error, log_error, ProbeError, Result};

/// Best-effort outbound alerts. `notify` returns immediately; delivery
/// failures stay inside the notifier.
pub trait AlertNotifier: Send + Sync {
    fn notify(&self, message: String);
}

/// Posts to Slack's `chat.postMessage` (or any compatible webhook) with a bearer token.
#[derive(Clone)]
pub struct SlackNotifier {
    client: Client,
    api_url: String,
    channel: String,
    token: String,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("api_url", &self.api_url)
            .field("channel", &self.channel)
            .finish()
    }
}

impl SlackNotifier {
    pub fn new(
        api_url: impl Into<String>,
        channel: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            channel: channel.into(),
            token: token.into(),
        })
    }

    pub fn payload(&self, text: &str) -> Value {
        json!({
            "channel": self.channel,
            "mrkdwn": true,
            "text": text,
        })
    }

    /// Sends one message and waits for the HTTP exchange. The response status is
    /// only logged; Slack reports API errors in the body with a 200.
    pub async fn post(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|e| handle_reqwest_error(e, "Slack alert"))?;

        debug!(status = %response.status(), channel = %self.channel, "Slack alert posted");
        Ok(())
    }
}

impl AlertNotifier for SlackNotifier {
    fn notify(&self, message: String) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.post(&message).await {
                log_error(&e, "Slack alert delivery");
            }
        });
    }
}
