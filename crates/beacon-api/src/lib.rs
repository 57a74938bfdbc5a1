//! beacon-api — HTTP surface of the Beacon alert service.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Instance status and verified peers |
//! | POST | `/slack/alert` | Send an alert to the Slack channel |
//! | POST | `/homeassistant/alert` | Send a notification to Home Assistant |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use beacon_core::Settings;
use beacon_notify::Notifier;
use beacon_watch::PeerSnapshot;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub settings: Arc<Settings>,
    pub slack: Arc<dyn Notifier>,
    pub home_assistant: Arc<dyn Notifier>,
    /// Verified peers; stays empty when the watcher is disabled.
    pub peers: PeerSnapshot,
}

/// Build the complete router, with permissive CORS and request tracing.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/slack/alert", post(handlers::slack_alert))
        .route("/homeassistant/alert", post(handlers::homeassistant_alert))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
