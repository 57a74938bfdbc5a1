//! Route handlers.
//!
//! Alert routes always answer `200` with the backend's delivery result;
//! a failed or skipped delivery is reported in the body, not the status.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::info;

use beacon_core::{Alert, Level};

use crate::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub instance_name: String,
    pub app: &'static str,
    pub modules: ModuleStatus,
    pub heartbeat: &'static str,
    pub peer_watcher: PeerWatcherStatus,
}

#[derive(Debug, Serialize)]
pub struct ModuleStatus {
    pub slack: &'static str,
    pub homeassistant: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PeerWatcherStatus {
    pub status: &'static str,
    pub peers_count: usize,
    pub discovered_peers: Vec<String>,
}

fn credentials(configured: bool) -> &'static str {
    if configured { "configured" } else { "missing_credentials" }
}

fn enabled(on: bool) -> &'static str {
    if on { "enabled" } else { "disabled" }
}

/// GET /health
pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let settings = &state.settings;
    let discovered_peers: Vec<String> = state.peers.snapshot().iter().cloned().collect();

    Json(HealthReport {
        instance_name: settings.beacon_instance_name.clone(),
        app: "healthy",
        modules: ModuleStatus {
            slack: credentials(settings.slack_configured()),
            homeassistant: credentials(settings.home_assistant_configured()),
        },
        heartbeat: enabled(settings.heartbeat_enabled()),
        peer_watcher: PeerWatcherStatus {
            status: enabled(settings.peer_watcher_enabled()),
            peers_count: discovered_peers.len(),
            discovered_peers,
        },
    })
}

/// Slack alert body.
#[derive(Debug, Deserialize)]
pub struct SlackAlertRequest {
    pub title: Option<String>,
    pub message: String,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

impl From<SlackAlertRequest> for Alert {
    fn from(req: SlackAlertRequest) -> Self {
        Alert {
            title: req.title,
            message: req.message,
            level: Level::parse(&req.level),
            target: None,
        }
    }
}

/// POST /slack/alert
pub async fn slack_alert(
    State(state): State<ApiState>,
    Json(req): Json<SlackAlertRequest>,
) -> impl IntoResponse {
    let alert = Alert::from(req);
    info!(level = alert.level.as_str(), "slack alert requested");
    Json(state.slack.send(&alert).await)
}

/// Home Assistant alert body.
#[derive(Debug, Deserialize)]
pub struct HomeAssistantAlertRequest {
    pub title: Option<String>,
    pub message: String,
    pub target: Option<String>,
}

impl From<HomeAssistantAlertRequest> for Alert {
    fn from(req: HomeAssistantAlertRequest) -> Self {
        Alert {
            title: req.title,
            message: req.message,
            level: Level::default(),
            target: req.target,
        }
    }
}

/// POST /homeassistant/alert
pub async fn homeassistant_alert(
    State(state): State<ApiState>,
    Json(req): Json<HomeAssistantAlertRequest>,
) -> impl IntoResponse {
    let alert = Alert::from(req);
    info!(target_device = ?alert.target, "home assistant alert requested");
    Json(state.home_assistant.send(&alert).await)
}
