//! Fan-out of one alert to every backend.

use std::sync::Arc;

use tracing::{debug, error, warn};

use beacon_core::{Alert, DeliveryResult};

use crate::Notifier;

/// Delivers alerts to a fixed set of backends, independently.
#[derive(Clone, Default)]
pub struct Dispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn platforms(&self) -> Vec<&'static str> {
        self.notifiers.iter().map(|n| n.platform()).collect()
    }

    /// Send `alert` to every backend concurrently.
    ///
    /// Results come back in registration order. Unconfigured backends are
    /// reported as skipped without any I/O; a backend task that dies is
    /// reported as an error. Nothing here fails the caller.
    pub async fn deliver(&self, alert: &Alert) -> Vec<DeliveryResult> {
        let mut pending = Vec::with_capacity(self.notifiers.len());

        for notifier in &self.notifiers {
            let platform = notifier.platform();
            if !notifier.is_configured() {
                debug!(%platform, "backend not configured, skipping");
                pending.push((platform, None));
                continue;
            }

            let notifier = notifier.clone();
            let alert = alert.clone();
            let handle = tokio::spawn(async move { notifier.send(&alert).await });
            pending.push((platform, Some(handle)));
        }

        let mut results = Vec::with_capacity(pending.len());
        for (platform, handle) in pending {
            let result = match handle {
                None => DeliveryResult::skipped(platform, format!("{platform} not configured")),
                Some(handle) => match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        error!(%platform, error = %e, "delivery task failed");
                        DeliveryResult::error(platform, e.to_string())
                    }
                },
            };
            if result.status == beacon_core::DeliveryStatus::Error {
                warn!(
                    %platform,
                    error = result.message.as_deref().unwrap_or(""),
                    "alert not delivered"
                );
            }
            results.push(result);
        }

        results
    }
}
