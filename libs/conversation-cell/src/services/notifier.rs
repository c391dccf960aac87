use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;

use crate::models::Payload;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// LINE accepts at most five messages per push.
const MAX_MESSAGES_PER_PUSH: usize = 5;
const MAX_QUICK_REPLY_ITEMS: usize = 13;
const MAX_LABEL_CHARS: usize = 20;

/// Outbound pushes to someone other than the sender, e.g. clinic staff.
///
/// Fire-and-forget: failures are logged, never returned or retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn push(&self, target: &str, payloads: &[Payload]);
}

/// Used when no messaging channel is configured.
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn push(&self, target: &str, payloads: &[Payload]) {
        for payload in payloads {
            info!("Notification for {} (not sent, no channel configured): {}", target, payload.body());
        }
    }
}

/// LINE Messaging API push.
pub struct LinePushNotifier {
    client: Client,
    base_url: String,
    access_token: String,
}

impl LinePushNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: config.line_api_base_url.trim_end_matches('/').to_string(),
            access_token: config.line_channel_access_token.clone(),
        }
    }

    async fn send(&self, target: &str, messages: &[Value]) -> Result<(), String> {
        let response = self.client
            .post(format!("{}/v2/bot/message/push", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&json!({ "to": target, "messages": messages }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: {}", status, body));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for LinePushNotifier {
    async fn push(&self, target: &str, payloads: &[Payload]) {
        let messages: Vec<Value> = payloads.iter().map(to_line_message).collect();

        for batch in messages.chunks(MAX_MESSAGES_PER_PUSH) {
            match self.send(target, batch).await {
                Ok(()) => debug!("Pushed {} message(s) to {}", batch.len(), target),
                Err(e) => warn!("LINE push to {} failed: {}", target, e),
            }
        }
    }
}

/// Builds the notifier for the configured channel.
pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    if config.is_line_configured() {
        Arc::new(LinePushNotifier::new(config))
    } else {
        warn!("LINE channel not configured, notifications will only be logged");
        Arc::new(LoggingNotifier)
    }
}

/// Text messages; choice lists become quick replies.
pub fn to_line_message(payload: &Payload) -> Value {
    match payload {
        Payload::Text { text } => json!({ "type": "text", "text": text }),
        Payload::Choices { prompt, options } => {
            let items: Vec<Value> = options
                .iter()
                .take(MAX_QUICK_REPLY_ITEMS)
                .map(|choice| json!({
                    "type": "action",
                    "action": {
                        "type": "message",
                        "label": choice.label.chars().take(MAX_LABEL_CHARS).collect::<String>(),
                        "text": choice.value,
                    }
                }))
                .collect();

            json!({ "type": "text", "text": prompt, "quickReply": { "items": items } })
        }
    }
}
