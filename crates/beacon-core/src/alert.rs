//! Alert payloads and per-backend delivery results.

use serde::{Deserialize, Serialize};

/// Severity of an alert, used by backends that render it (Slack icons).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
}

impl Level {
    /// Lenient parse: unknown or empty strings fall back to `Info`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Level::Debug,
            "warning" | "warn" => Level::Warning,
            "error" => Level::Error,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

/// A single alert to relay to the configured backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: Option<String>,
    pub message: String,
    #[serde(default)]
    pub level: Level,
    /// Backend-specific recipient (Home Assistant notify target).
    pub target: Option<String>,
}

impl Alert {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            level: Level::Info,
            target: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Outcome class of one delivery attempt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Success,
    Error,
    /// Backend not configured; nothing was sent.
    Skipped,
}

/// What a backend reports after trying to deliver an [`Alert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub status: DeliveryStatus,
    pub platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl DeliveryResult {
    pub fn success(platform: &str) -> Self {
        Self {
            status: DeliveryStatus::Success,
            platform: platform.to_string(),
            message: None,
            method: None,
        }
    }

    pub fn error(platform: &str, message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Error,
            platform: platform.to_string(),
            message: Some(message.into()),
            method: None,
        }
    }

    pub fn skipped(platform: &str, message: impl Into<String>) -> Self {
        Self {
            status: DeliveryStatus::Skipped,
            platform: platform.to_string(),
            message: Some(message.into()),
            method: None,
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}
