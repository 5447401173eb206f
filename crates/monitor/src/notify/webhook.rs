use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use super::Notifier;
use crate::config::CallbackConfig;
use crate::Result;

pub const SOURCE: &str = "netpilot-system-ops";
pub const USER_AGENT: &str = "NetPilot-System-Operations/1.0";

/// POSTs callback envelopes to the control plane with exponential backoff.
pub struct WebhookNotifier {
    client: reqwest::Client,
    token: String,
    api_key: Option<String>,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookNotifier {
    pub fn new(callbacks: &CallbackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(callbacks.timeout())
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            token: callbacks.token.clone(),
            api_key: callbacks.api_key.clone(),
            max_attempts: callbacks.max_attempts.max(1),
            backoff: callbacks.backoff(),
        })
    }

    pub fn envelope(&self, payload: &Value) -> Value {
        json!({
            "timestamp": Utc::now().to_rfc3339(),
            "source": SOURCE,
            "callback_token": self.token,
            "data": payload,
        })
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

fn accepted(status: StatusCode) -> bool {
    matches!(status.as_u16(), 200 | 201 | 202)
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, url: &str, payload: &Value) -> bool {
        let body = self.envelope(payload);

        for attempt in 0..self.max_attempts {
            let mut request = self
                .client
                .post(url)
                .header("X-Callback-Token", &self.token)
                .json(&body);
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            match request.send().await {
                Ok(response) if accepted(response.status()) => {
                    info!(url = %url, status = %response.status(), "Callback sent");
                    return true;
                }
                Ok(response) => {
                    warn!(
                        url = %url,
                        attempt = attempt + 1,
                        status = %response.status(),
                        "Callback rejected"
                    );
                }
                Err(e) => {
                    warn!(url = %url, attempt = attempt + 1, error = %e, "Callback request failed");
                }
            }

            if attempt + 1 < self.max_attempts {
                tokio::time::sleep(self.delay(attempt)).await;
            }
        }

        false
    }
}
