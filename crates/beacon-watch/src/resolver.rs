//! Candidate peer URLs.
//!
//! Candidates are the union of:
//! 1. Static peer URLs from configuration (normalized)
//! 2. Every IPv4 address the service name currently resolves to,
//!    as `http://<ip>:<port>`
//!
//! Lookup failures are not errors: an unregistered service name simply
//! contributes no candidates.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, warn};

use beacon_core::Settings;

use crate::BoxFuture;

/// Name → addresses lookup used for service discovery.
pub trait NameLookup: Send + Sync {
    fn lookup<'a>(&'a self, name: &'a str, port: u16) -> BoxFuture<'a, io::Result<Vec<IpAddr>>>;
}

/// Host system resolver (container DNS, `/etc/hosts`, ...), IPv4 only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLookup;

impl NameLookup for SystemLookup {
    fn lookup<'a>(&'a self, name: &'a str, port: u16) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host((name, port)).await?;
            Ok(addrs.map(|a| a.ip()).filter(IpAddr::is_ipv4).collect())
        })
    }
}

/// Fixed service registry: name → addresses.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    registry: HashMap<String, Vec<IpAddr>>,
}

impl StaticLookup {
    pub fn new(registry: HashMap<String, Vec<IpAddr>>) -> Self {
        Self { registry }
    }

    pub fn with_entry(mut self, name: &str, addrs: Vec<IpAddr>) -> Self {
        self.registry.insert(name.to_lowercase(), addrs);
        self
    }
}

impl NameLookup for StaticLookup {
    fn lookup<'a>(&'a self, name: &'a str, _port: u16) -> BoxFuture<'a, io::Result<Vec<IpAddr>>> {
        let result = self
            .registry
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("HostNotFound: {name}")));
        Box::pin(async move { result })
    }
}

/// Turns configuration plus the naming layer into a candidate set.
#[derive(Clone)]
pub struct Resolver {
    static_urls: Vec<String>,
    service_name: Option<String>,
    port: u16,
    lookup: Arc<dyn NameLookup>,
}

impl Resolver {
    /// Static URLs that are blank or not plain `http` are dropped here.
    pub fn new(static_urls: &[String], service_name: Option<String>, port: u16) -> Self {
        let static_urls = static_urls
            .iter()
            .filter_map(|raw| {
                let url = normalize_url(raw)?;
                if url.starts_with("http://") {
                    Some(url)
                } else {
                    warn!(%url, "ignoring peer URL: only http:// endpoints can be probed");
                    None
                }
            })
            .collect();

        Self {
            static_urls,
            service_name: service_name
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            port,
            lookup: Arc::new(SystemLookup),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.peer_watch_urls,
            Some(settings.beacon_service_name.clone()),
            settings.app_port,
        )
    }

    pub fn with_lookup(mut self, lookup: Arc<dyn NameLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn static_urls(&self) -> &[String] {
        &self.static_urls
    }

    /// Current candidate set. Never fails.
    pub async fn discover(&self) -> BTreeSet<String> {
        let mut urls: BTreeSet<String> = self.static_urls.iter().cloned().collect();

        if let Some(name) = self.service_name.as_deref() {
            match self.lookup.lookup(name, self.port).await {
                Ok(addrs) => {
                    debug!(service = %name, count = addrs.len(), "service name resolved");
                    urls.extend(
                        addrs
                            .into_iter()
                            .filter(IpAddr::is_ipv4)
                            .map(|ip| endpoint_url(ip, self.port)),
                    );
                }
                Err(e) => {
                    debug!(service = %name, error = %e, "service name lookup failed");
                }
            }
        }

        urls
    }
}

/// `http://<ip>:<port>` for a discovered address.
pub fn endpoint_url(ip: IpAddr, port: u16) -> String {
    format!("http://{ip}:{port}")
}

/// Trim whitespace and trailing slashes; blank input yields `None`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim().trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}
