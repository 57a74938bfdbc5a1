//! Home Assistant backend.
//!
//! Delivers through a webhook trigger when a webhook id is configured,
//! otherwise through the REST `notify` service with a long-lived token.

use serde_json::{Value, json};
use tracing::{error, info};

use beacon_core::{Alert, DeliveryResult, Settings};

use crate::{BoxFuture, Notifier, RetryPolicy};

const PLATFORM: &str = "homeassistant";
const DEFAULT_TITLE: &str = "Beacon Alert";
const EMPTY_MESSAGE: &str = "Empty Beacon Message";

pub struct HomeAssistantNotifier {
    client: reqwest::Client,
    url: Option<String>,
    token: Option<String>,
    webhook_id: Option<String>,
    entity: String,
    retry: RetryPolicy,
}

impl HomeAssistantNotifier {
    pub fn new(
        client: reqwest::Client,
        url: Option<String>,
        token: Option<String>,
        webhook_id: Option<String>,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            client,
            url: url.map(|u| u.trim_end_matches('/').to_string()),
            token,
            webhook_id,
            entity: entity.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_settings(settings: &Settings, client: reqwest::Client) -> Self {
        Self::new(
            client,
            settings.ha_url.clone(),
            settings.ha_token.clone(),
            settings.ha_webhook_id.clone(),
            settings.ha_notify_entity.clone(),
        )
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn deliver(&self, alert: &Alert) -> DeliveryResult {
        let Some(base) = self.url.as_deref() else {
            error!("HA_URL is not configured");
            return DeliveryResult::skipped(PLATFORM, "HA_URL is not configured");
        };

        match self.webhook_id.as_deref() {
            Some(webhook_id) => self.send_via_webhook(base, webhook_id, alert).await,
            None => self.send_via_api(base, alert).await,
        }
    }

    async fn send_via_webhook(&self, base: &str, webhook_id: &str, alert: &Alert) -> DeliveryResult {
        let url = format!("{base}/api/webhook/{webhook_id}");
        let body = webhook_payload(alert);

        match self.post(&url, None, &body).await {
            Ok(()) => {
                info!("HA webhook alert sent");
                DeliveryResult::success(PLATFORM).with_method("webhook")
            }
            Err(e) => DeliveryResult::error(PLATFORM, e).with_method("webhook"),
        }
    }

    async fn send_via_api(&self, base: &str, alert: &Alert) -> DeliveryResult {
        let Some(token) = self.token.as_deref() else {
            error!("HA_TOKEN is not configured for API delivery");
            return DeliveryResult::error(PLATFORM, "HA_TOKEN is not configured");
        };

        let url = format!("{base}/api/services/notify/{}", self.entity);
        let body = service_payload(alert);

        match self.post(&url, Some(token), &body).await {
            Ok(()) => {
                info!(entity = %self.entity, "HA API alert sent");
                DeliveryResult::success(PLATFORM).with_method("api")
            }
            Err(e) => DeliveryResult::error(PLATFORM, e).with_method("api"),
        }
    }

    async fn post(&self, url: &str, token: Option<&str>, body: &Value) -> Result<(), String> {
        self.retry
            .run(PLATFORM, |_| {
                let mut request = self.client.post(url).json(body);
                if let Some(token) = token {
                    request = request.bearer_auth(token);
                }
                async move {
                    request
                        .send()
                        .await
                        .and_then(|r| r.error_for_status())
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                }
            })
            .await
    }
}

impl Notifier for HomeAssistantNotifier {
    fn platform(&self) -> &'static str {
        PLATFORM
    }

    /// A base URL is enough to attempt delivery; missing auth is reported
    /// as an error by the send itself.
    fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, DeliveryResult> {
        Box::pin(self.deliver(alert))
    }
}

fn title_or_default(alert: &Alert) -> &str {
    alert.title.as_deref().unwrap_or(DEFAULT_TITLE)
}

fn message_or_default(alert: &Alert) -> &str {
    if alert.message.is_empty() {
        EMPTY_MESSAGE
    } else {
        &alert.message
    }
}

fn webhook_payload(alert: &Alert) -> Value {
    json!({
        "title": title_or_default(alert),
        "message": message_or_default(alert),
        "target": alert.target,
    })
}

fn service_payload(alert: &Alert) -> Value {
    json!({
        "title": title_or_default(alert),
        "message": message_or_default(alert),
    })
}
