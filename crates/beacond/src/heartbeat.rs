//! Periodic GET to a dead-man's-switch URL.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info};

/// Ping `url` now and then every `interval` until `shutdown` flips.
///
/// Failures are logged and never end the loop.
pub async fn run_heartbeat(
    client: reqwest::Client,
    url: String,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(%url, ?interval, "heartbeat started");

    loop {
        tokio::select! {
            result = beat(&client, &url) => {
                if let Err(e) = result {
                    error!(%url, error = %e, "heartbeat failed");
                }
            }
            _ = shutdown.changed() => break,
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("heartbeat stopped");
}

async fn beat(client: &reqwest::Client, url: &str) -> Result<(), reqwest::Error> {
    debug!(%url, "sending heartbeat");
    client.get(url).send().await?.error_for_status()?;
    Ok(())
}
