//! Process settings: TOML file plus environment overrides.
//!
//! Every field can be set in `beacon.toml` or through an environment
//! variable named after the field in upper case (`SLACK_BOT_TOKEN`,
//! `PEER_WATCH_URLS`, ...). Environment values win over the file.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::{parse_duration, serde_duration};
use crate::error::{ConfigError, ConfigResult};

const REDACTED: &str = "<redacted>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ── Slack ──────────────────────────────────────────────────
    pub slack_bot_token: Option<String>,
    pub slack_channel_id: Option<String>,

    // ── Home Assistant ─────────────────────────────────────────
    pub ha_url: Option<String>,
    pub ha_token: Option<String>,
    pub ha_webhook_id: Option<String>,
    pub ha_notify_entity: String,

    // ── App ────────────────────────────────────────────────────
    pub app_port: u16,
    pub debug: bool,
    pub heartbeat_url: Option<String>,
    #[serde(with = "serde_duration")]
    pub heartbeat_interval: Duration,

    // ── Peer watcher ───────────────────────────────────────────
    pub peer_watch_urls: Vec<String>,
    #[serde(with = "serde_duration")]
    pub peer_watch_interval: Duration,
    #[serde(with = "serde_duration")]
    pub peer_watch_grace_period: Duration,
    /// Rediscover candidates every N passes.
    pub peer_discovery_every: u32,
    #[serde(with = "serde_duration")]
    pub peer_probe_timeout: Duration,
    /// Evict peer records absent from this many discoveries (0 = keep forever).
    pub peer_record_ttl: u32,
    pub beacon_instance_name: String,
    pub beacon_instance_url: Option<String>,
    pub beacon_service_name: String,
    pub local_ip_discovery_host: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            slack_bot_token: None,
            slack_channel_id: None,
            ha_url: None,
            ha_token: None,
            ha_webhook_id: None,
            ha_notify_entity: "notify".to_string(),
            app_port: 7867,
            debug: false,
            heartbeat_url: None,
            heartbeat_interval: Duration::from_secs(900),
            peer_watch_urls: Vec::new(),
            peer_watch_interval: Duration::from_secs(300),
            peer_watch_grace_period: Duration::from_secs(10),
            peer_discovery_every: 10,
            peer_probe_timeout: Duration::from_secs(10),
            peer_record_ttl: 0,
            beacon_instance_name: "beacon".to_string(),
            beacon_instance_url: None,
            beacon_service_name: "beacon".to_string(),
            local_ip_discovery_host: "8.8.8.8".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, then apply the process
    /// environment on top.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut settings = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Override fields from `lookup`, which maps an upper-case variable
    /// name to its value.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvSource { lookup };

        env.optional("SLACK_BOT_TOKEN", &mut self.slack_bot_token);
        env.optional("SLACK_CHANNEL_ID", &mut self.slack_channel_id);
        env.optional("HA_URL", &mut self.ha_url);
        env.optional("HA_TOKEN", &mut self.ha_token);
        env.optional("HA_WEBHOOK_ID", &mut self.ha_webhook_id);
        env.string("HA_NOTIFY_ENTITY", &mut self.ha_notify_entity);

        env.parsed("APP_PORT", &mut self.app_port)?;
        env.flag("DEBUG", &mut self.debug)?;
        env.optional("HEARTBEAT_URL", &mut self.heartbeat_url);
        env.duration("HEARTBEAT_INTERVAL", &mut self.heartbeat_interval)?;

        env.list("PEER_WATCH_URLS", &mut self.peer_watch_urls)?;
        env.duration("PEER_WATCH_INTERVAL", &mut self.peer_watch_interval)?;
        env.duration("PEER_WATCH_GRACE_PERIOD", &mut self.peer_watch_grace_period)?;
        env.parsed("PEER_DISCOVERY_EVERY", &mut self.peer_discovery_every)?;
        env.duration("PEER_PROBE_TIMEOUT", &mut self.peer_probe_timeout)?;
        env.parsed("PEER_RECORD_TTL", &mut self.peer_record_ttl)?;
        env.string("BEACON_INSTANCE_NAME", &mut self.beacon_instance_name);
        env.optional("BEACON_INSTANCE_URL", &mut self.beacon_instance_url);
        env.string("BEACON_SERVICE_NAME", &mut self.beacon_service_name);
        env.string("LOCAL_IP_DISCOVERY_HOST", &mut self.local_ip_discovery_host);

        Ok(())
    }

    /// The peer watcher runs when there is anything to discover.
    pub fn peer_watcher_enabled(&self) -> bool {
        !self.peer_watch_urls.is_empty() || !self.beacon_service_name.trim().is_empty()
    }

    pub fn heartbeat_enabled(&self) -> bool {
        self.heartbeat_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn slack_configured(&self) -> bool {
        self.slack_bot_token.is_some()
    }

    pub fn home_assistant_configured(&self) -> bool {
        self.ha_token.is_some() || self.ha_webhook_id.is_some()
    }

    /// Copy with credentials masked, for printing.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        Self {
            slack_bot_token: mask(&self.slack_bot_token),
            ha_token: mask(&self.ha_token),
            ha_webhook_id: mask(&self.ha_webhook_id),
            ..self.clone()
        }
    }
}

struct EnvSource<F> {
    lookup: F,
}

impl<F> EnvSource<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
    }

    /// Blank values clear the field.
    fn optional(&self, key: &str, field: &mut Option<String>) {
        if let Some(value) = self.get(key) {
            let value = value.trim();
            *field = (!value.is_empty()).then(|| value.to_string());
        }
    }

    fn string(&self, key: &str, field: &mut String) {
        if let Some(value) = self.get(key) {
            *field = value.trim().to_string();
        }
    }

    fn parsed<T: FromStr>(&self, key: &str, field: &mut T) -> ConfigResult<()> {
        if let Some(value) = self.get(key) {
            *field = value.trim().parse().map_err(|_| invalid(key, &value))?;
        }
        Ok(())
    }

    fn flag(&self, key: &str, field: &mut bool) -> ConfigResult<()> {
        if let Some(value) = self.get(key) {
            *field = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(invalid(key, &value)),
            };
        }
        Ok(())
    }

    fn duration(&self, key: &str, field: &mut Duration) -> ConfigResult<()> {
        if let Some(value) = self.get(key) {
            *field = parse_duration(&value).ok_or_else(|| invalid(key, &value))?;
        }
        Ok(())
    }

    /// JSON array (`["http://a:7867"]`) or comma-separated list.
    fn list(&self, key: &str, field: &mut Vec<String>) -> ConfigResult<()> {
        if let Some(value) = self.get(key) {
            let trimmed = value.trim();
            let items: Vec<String> = if trimmed.starts_with('[') {
                serde_json::from_str(trimmed).map_err(|_| invalid(key, &value))?
            } else {
                trimmed.split(',').map(str::to_string).collect()
            };
            *field = items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect();
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let s = Settings::default();
        assert_eq!(s.app_port, 7867);
        assert_eq!(s.peer_watch_interval, Duration::from_secs(300));
        assert_eq!(s.peer_probe_timeout, Duration::from_secs(10));
        assert_eq!(s.peer_discovery_every, 10);
        assert_eq!(s.heartbeat_interval, Duration::from_secs(900));
        assert_eq!(s.beacon_instance_name, "beacon");
        assert_eq!(s.ha_notify_entity, "notify");
        assert!(s.peer_watcher_enabled());
        assert!(!s.heartbeat_enabled());
    }

    #[test]
    fn parse_toml_file_contents() {
        let s = Settings::from_toml_str(
            r#"
app_port = 9000
peer_watch_urls = ["http://a:7867/", "http://b:7867"]
peer_watch_interval = 60
peer_probe_timeout = "1500ms"
beacon_instance_name = "beacon-1"
"#,
        )
        .unwrap();
        assert_eq!(s.app_port, 9000);
        assert_eq!(s.peer_watch_urls.len(), 2);
        assert_eq!(s.peer_watch_interval, Duration::from_secs(60));
        assert_eq!(s.peer_probe_timeout, Duration::from_millis(1500));
        assert_eq!(s.beacon_instance_name, "beacon-1");
        // Untouched fields keep their defaults.
        assert_eq!(s.beacon_service_name, "beacon");
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beacon.toml");
        std::fs::write(&path, "beacon_instance_name = \"from-file\"\n").unwrap();

        let s = Settings::from_file(&path).unwrap();
        assert_eq!(s.beacon_instance_name, "from-file");
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Settings::from_file(Path::new("/nonexistent/beacon.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = Settings::from_toml_str("peer_watch_interval = \"forever\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut s = Settings::from_toml_str("beacon_instance_name = \"file\"").unwrap();
        s.apply_env(env(&[
            ("BEACON_INSTANCE_NAME", "env"),
            ("APP_PORT", "8080"),
            ("DEBUG", "true"),
            ("PEER_WATCH_INTERVAL", "5m"),
        ]))
        .unwrap();
        assert_eq!(s.beacon_instance_name, "env");
        assert_eq!(s.app_port, 8080);
        assert!(s.debug);
        assert_eq!(s.peer_watch_interval, Duration::from_secs(300));
    }

    #[test]
    fn env_list_accepts_json_and_commas() {
        let mut s = Settings::default();
        s.apply_env(env(&[("PEER_WATCH_URLS", r#"["http://a:7867", "http://b:7867"]"#)]))
            .unwrap();
        assert_eq!(s.peer_watch_urls, vec!["http://a:7867", "http://b:7867"]);

        s.apply_env(env(&[("PEER_WATCH_URLS", "http://c:7867, ,http://d:7867")]))
            .unwrap();
        assert_eq!(s.peer_watch_urls, vec!["http://c:7867", "http://d:7867"]);
    }

    #[test]
    fn blank_env_clears_optional() {
        let mut s = Settings {
            heartbeat_url: Some("https://hc.example/ping".to_string()),
            ..Settings::default()
        };
        s.apply_env(env(&[("HEARTBEAT_URL", "  ")])).unwrap();
        assert!(s.heartbeat_url.is_none());
        assert!(!s.heartbeat_enabled());
    }

    #[test]
    fn invalid_env_values_name_the_key() {
        let mut s = Settings::default();
        let err = s.apply_env(env(&[("APP_PORT", "seventy")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "APP_PORT");
                assert_eq!(value, "seventy");
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(s.apply_env(env(&[("DEBUG", "maybe")])).is_err());
        assert!(s.apply_env(env(&[("PEER_PROBE_TIMEOUT", "soon")])).is_err());
        assert!(s.apply_env(env(&[("PEER_WATCH_URLS", "[not json")])).is_err());

        let err = s
            .apply_env(env(&[("PEER_WATCH_INTERVAL", "999999999999999999m")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value } => {
                assert_eq!(key, "PEER_WATCH_INTERVAL");
                assert_eq!(value, "999999999999999999m");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn watcher_disabled_without_sources() {
        let s = Settings {
            beacon_service_name: String::new(),
            ..Settings::default()
        };
        assert!(!s.peer_watcher_enabled());

        let s = Settings {
            beacon_service_name: String::new(),
            peer_watch_urls: vec!["http://a:7867".to_string()],
            ..Settings::default()
        };
        assert!(s.peer_watcher_enabled());
    }

    #[test]
    fn module_configuration_checks() {
        let s = Settings {
            slack_bot_token: Some("xoxb".to_string()),
            ha_webhook_id: Some("hook".to_string()),
            ..Settings::default()
        };
        assert!(s.slack_configured());
        assert!(s.home_assistant_configured());
        assert!(!Settings::default().slack_configured());
        assert!(!Settings::default().home_assistant_configured());
    }

    #[test]
    fn redacted_masks_secrets_only() {
        let s = Settings {
            slack_bot_token: Some("xoxb-secret".to_string()),
            slack_channel_id: Some("C123".to_string()),
            ha_token: Some("ha-secret".to_string()),
            ..Settings::default()
        };
        let r = s.redacted();
        assert_eq!(r.slack_bot_token.as_deref(), Some(REDACTED));
        assert_eq!(r.ha_token.as_deref(), Some(REDACTED));
        assert!(r.ha_webhook_id.is_none());
        assert_eq!(r.slack_channel_id.as_deref(), Some("C123"));
    }
}
