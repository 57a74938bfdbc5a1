//! The peer watcher loop. Ties discovery, probing, state tracking and
//! alerting together.
//!
//! One pass: optional rediscovery, probe every non-self candidate
//! concurrently, apply the outcomes to each peer's record in one place,
//! dispatch alerts for qualifying transitions, then publish the verified
//! set. Between passes the loop sleeps; at every await point it also
//! watches the shutdown channel.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use beacon_core::{Alert, Level, Settings};
use beacon_notify::Dispatcher;

use crate::identity::{SelfIdentity, detect_local_ip};
use crate::peer::{AlertEvent, Observation, PeerRecord};
use crate::probe::{ProbeOutcome, Prober};
use crate::resolver::{Resolver, endpoint_url, normalize_url};
use crate::snapshot::{PeerSet, PeerSnapshot};

/// Title used on every alert raised by the watcher.
pub const ALERT_TITLE: &str = "Beacon Peer Watcher";

/// Tunables for the watch loop.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Name this instance reports on `/health`; peers reporting it are self.
    pub instance_name: String,
    /// Explicit URL of this instance, excluded up front.
    pub self_url: Option<String>,
    /// Host used to find the local source address for self exclusion.
    pub local_ip_discovery_host: Option<String>,
    /// Port this instance (and every discovered peer) listens on.
    pub port: u16,
    pub interval: Duration,
    pub grace_period: Duration,
    /// Rediscover every N passes.
    pub discovery_every: u32,
    pub probe_timeout: Duration,
    /// Drop records absent from this many discoveries (0 = never).
    pub record_ttl: u32,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl WatchConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            instance_name: settings.beacon_instance_name.clone(),
            self_url: settings.beacon_instance_url.clone(),
            local_ip_discovery_host: Some(settings.local_ip_discovery_host.clone())
                .filter(|h| !h.trim().is_empty()),
            port: settings.app_port,
            interval: settings.peer_watch_interval,
            grace_period: settings.peer_watch_grace_period,
            discovery_every: settings.peer_discovery_every,
            probe_timeout: settings.peer_probe_timeout,
            record_ttl: settings.peer_record_ttl,
        }
    }
}

/// What one pass did, for logging and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub rediscovered: bool,
    pub probed: usize,
    pub self_detected: usize,
    pub alerts: Vec<(AlertEvent, String)>,
    pub verified: usize,
}

/// Owns all peer-watching state. Run it with [`PeerWatcher::run`].
pub struct PeerWatcher {
    config: WatchConfig,
    resolver: Resolver,
    prober: Prober,
    identity: SelfIdentity,
    dispatcher: Dispatcher,
    records: HashMap<String, PeerRecord>,
    candidates: BTreeSet<String>,
    passes: u64,
    snapshot_tx: watch::Sender<PeerSet>,
    snapshot: PeerSnapshot,
}

impl PeerWatcher {
    pub fn new(config: WatchConfig, resolver: Resolver, dispatcher: Dispatcher) -> Self {
        let identity = SelfIdentity::new();
        if let Some(url) = config.self_url.as_deref().and_then(normalize_url) {
            identity.mark_self(&url);
        }

        let (snapshot_tx, snapshot) = PeerSnapshot::channel();
        Self {
            prober: Prober::new(config.probe_timeout),
            config,
            resolver,
            identity,
            dispatcher,
            records: HashMap::new(),
            candidates: BTreeSet::new(),
            passes: 0,
            snapshot_tx,
            snapshot,
        }
    }

    /// Read handle for the health report.
    pub fn snapshot(&self) -> PeerSnapshot {
        self.snapshot.clone()
    }

    /// Shared handle onto the self-identity cache.
    pub fn identity(&self) -> SelfIdentity {
        self.identity.clone()
    }

    pub fn record(&self, url: &str) -> Option<&PeerRecord> {
        self.records.get(url)
    }

    pub fn candidates(&self) -> &BTreeSet<String> {
        &self.candidates
    }

    /// Exclude `http://<local-ip>:<port>`, if the local address can be found.
    pub async fn seed_local_identity(&self) {
        let Some(host) = self.config.local_ip_discovery_host.as_deref() else {
            return;
        };
        if let Some(ip) = detect_local_ip(host).await {
            self.identity.mark_self(&endpoint_url(ip, self.config.port));
        }
    }

    /// Run until `shutdown` flips (or its sender goes away).
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            instance = %self.config.instance_name,
            interval = ?self.config.interval,
            grace_period = ?self.config.grace_period,
            "peer watcher started"
        );

        // Let the network settle before the first pass. Local address
        // detection may block on DNS, so it shares the cancellable wait.
        tokio::select! {
            _ = async {
                self.seed_local_identity().await;
                tokio::time::sleep(self.config.grace_period).await;
            } => {}
            _ = shutdown.changed() => {
                info!("peer watcher shutting down");
                return;
            }
        }

        loop {
            // A pass dropped at an await point leaves every record in a
            // consistent state and the previous snapshot published.
            tokio::select! {
                _ = self.run_pass() => {}
                _ = shutdown.changed() => break,
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!("peer watcher shutting down");
    }

    /// One full pass. Never fails; problems degrade to `Unhealthy`.
    pub async fn run_pass(&mut self) -> PassSummary {
        let mut summary = PassSummary::default();

        let every = u64::from(self.config.discovery_every.max(1));
        if self.passes % every == 0 {
            self.rediscover().await;
            summary.rediscovered = true;
        }
        self.passes += 1;

        let outcomes = self.probe_candidates().await;
        summary.probed = outcomes.len();

        let mut verified = BTreeSet::new();
        for (url, outcome) in outcomes {
            let observed = match outcome {
                ProbeOutcome::SelfDetected => {
                    self.identity.mark_self(&url);
                    summary.self_detected += 1;
                    continue;
                }
                ProbeOutcome::Healthy(peer_name) => {
                    debug!(%url, peer = %peer_name, "peer healthy");
                    verified.insert(url.clone());
                    Observation::Healthy
                }
                ProbeOutcome::Unhealthy => Observation::Unhealthy,
            };

            let event = self
                .records
                .entry(url.clone())
                .or_insert_with(|| PeerRecord::new(url.as_str()))
                .advance(observed);

            if let Some(event) = event {
                self.raise(event, &url).await;
                summary.alerts.push((event, url));
            }
        }

        summary.verified = verified.len();
        self.snapshot_tx.send_replace(Arc::new(verified));

        debug!(
            pass = self.passes,
            rediscovered = summary.rediscovered,
            probed = summary.probed,
            alerts = summary.alerts.len(),
            verified = summary.verified,
            "peer watch pass complete"
        );
        summary
    }

    async fn rediscover(&mut self) {
        let discovered = self.resolver.discover().await;
        info!(count = discovered.len(), "peer candidates discovered");

        if self.config.record_ttl > 0 {
            let ttl = self.config.record_ttl;
            self.records.retain(|url, record| {
                if discovered.contains(url) {
                    record.mark_discovered();
                    return true;
                }
                let missed = record.mark_missed();
                if missed >= ttl {
                    debug!(%url, missed, "evicting stale peer record");
                    false
                } else {
                    true
                }
            });
        }

        self.candidates = discovered;
    }

    /// Probe every non-self candidate concurrently.
    ///
    /// Outcomes are returned keyed by URL; the caller is the only writer
    /// of peer records.
    async fn probe_candidates(&self) -> BTreeMap<String, ProbeOutcome> {
        let handles: Vec<_> = self
            .candidates
            .iter()
            .filter(|url| !self.identity.is_self(url))
            .map(|url| {
                let prober = self.prober.clone();
                let instance_name = self.config.instance_name.clone();
                let task_url = url.clone();
                let handle = tokio::spawn(async move {
                    prober.probe(&task_url, &instance_name).await
                });
                (url.clone(), handle)
            })
            .collect();

        let mut outcomes = BTreeMap::new();
        for (url, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(%url, error = %e, "probe task failed, treating peer as unhealthy");
                    ProbeOutcome::Unhealthy
                }
            };
            outcomes.insert(url, outcome);
        }
        outcomes
    }

    async fn raise(&self, event: AlertEvent, url: &str) {
        let alert = compose_alert(event, &self.config.instance_name, url);
        match event {
            AlertEvent::Critical => error!(%url, "{}", alert.message),
            AlertEvent::Resolved => info!(%url, "{}", alert.message),
        }

        let results = self.dispatcher.deliver(&alert).await;
        for result in results.iter().filter(|r| !r.is_success()) {
            debug!(
                %url,
                platform = %result.platform,
                status = ?result.status,
                "peer alert not delivered to backend"
            );
        }
    }
}

/// Build the alert for a peer transition.
pub fn compose_alert(event: AlertEvent, instance_name: &str, url: &str) -> Alert {
    let (condition, level) = match event {
        AlertEvent::Critical => ("is UNREACHABLE", Level::Error),
        AlertEvent::Resolved => ("is back online", Level::Info),
    };
    Alert::new(format!(
        "{}: Peer Beacon instance at {url} {condition} (seen from {instance_name}).",
        event.tag()
    ))
    .with_title(ALERT_TITLE)
    .with_level(level)
}
