//! Slack backend: posts to `chat.postMessage` with a bot token.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use beacon_core::{Alert, DeliveryResult, Level, Settings};

use crate::{BoxFuture, Notifier, RetryPolicy};

const PLATFORM: &str = "slack";
const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Slack Web API reply; HTTP 200 can still carry `ok: false`.
#[derive(Debug, Deserialize)]
struct SlackReply {
    #[serde(default)]
    ok: bool,
    error: Option<String>,
}

pub struct SlackNotifier {
    client: reqwest::Client,
    token: Option<String>,
    channel_id: Option<String>,
    api_base: String,
    retry: RetryPolicy,
}

impl SlackNotifier {
    pub fn new(client: reqwest::Client, token: Option<String>, channel_id: Option<String>) -> Self {
        Self {
            client,
            token,
            channel_id,
            api_base: DEFAULT_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_settings(settings: &Settings, client: reqwest::Client) -> Self {
        Self::new(
            client,
            settings.slack_bot_token.clone(),
            settings.slack_channel_id.clone(),
        )
    }

    /// Point at a different Web API root (tests, proxies).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn deliver(&self, alert: &Alert) -> DeliveryResult {
        let (Some(token), Some(channel)) = (self.token.as_deref(), self.channel_id.as_deref())
        else {
            warn!("Slack alert requested, but Slack token or channel ID is not configured");
            return DeliveryResult::skipped(PLATFORM, "Slack not configured");
        };

        let url = format!("{}/chat.postMessage", self.api_base);
        let body = message_payload(channel, alert);

        let outcome = self
            .retry
            .run(PLATFORM, |_| {
                let request = self.client.post(&url).bearer_auth(token).json(&body);
                async move {
                    let resp = request
                        .send()
                        .await
                        .and_then(|r| r.error_for_status())
                        .map_err(|e| e.to_string())?;
                    let reply: SlackReply = resp.json().await.map_err(|e| e.to_string())?;
                    if reply.ok {
                        Ok(())
                    } else {
                        Err(reply.error.unwrap_or_else(|| "unknown_error".to_string()))
                    }
                }
            })
            .await;

        match outcome {
            Ok(()) => {
                info!(
                    title = alert.title.as_deref().unwrap_or("Info"),
                    message = %preview(&alert.message),
                    "Slack alert sent"
                );
                DeliveryResult::success(PLATFORM)
            }
            Err(e) => DeliveryResult::error(PLATFORM, e),
        }
    }
}

impl Notifier for SlackNotifier {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    fn is_configured(&self) -> bool {
        self.token.is_some() && self.channel_id.is_some()
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, DeliveryResult> {
        Box::pin(self.deliver(alert))
    }
}

fn level_icon(level: Level) -> &'static str {
    match level {
        Level::Info => ":information_source:",
        Level::Warning => ":warning:",
        Level::Error => ":rotating_light:",
        Level::Debug => ":mag:",
    }
}

/// Build the `chat.postMessage` body: a plain-text fallback plus one
/// mrkdwn section block.
pub fn message_payload(channel: &str, alert: &Alert) -> Value {
    let icon = level_icon(alert.level);
    let main_content = match alert.title.as_deref() {
        Some(title) => format!("{icon} *{title}*\n{}", alert.message),
        None => format!("{icon} {}", alert.message),
    };

    json!({
        "channel": channel,
        "text": format!(
            "{icon} {}: {}",
            alert.title.as_deref().unwrap_or("Alert"),
            alert.message
        ),
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": main_content }
            }
        ]
    })
}

fn preview(message: &str) -> String {
    message.chars().take(50).collect()
}
