//! Self-identity cache.
//!
//! URLs known to point back at this instance. Entries are only ever
//! added: once an endpoint is identified as self it is never probed
//! again for the lifetime of the process.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

/// Shared, append-only set of self URLs. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct SelfIdentity {
    urls: Arc<RwLock<HashSet<String>>>,
}

impl SelfIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_self(&self, url: &str) -> bool {
        self.urls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(url)
    }

    /// Add `url` permanently. Returns `true` if it was not already known.
    pub fn mark_self(&self, url: &str) -> bool {
        let inserted = self
            .urls
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(url.to_string());
        if inserted {
            info!(%url, "endpoint identified as self, excluding from peer checks");
        }
        inserted
    }

    pub fn len(&self) -> usize {
        self.urls
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source address the OS would use to reach `discovery_host`.
///
/// Uses a connected UDP socket, so no packet is sent. Returns `None` if
/// the host cannot be routed to (no network, bad name).
pub async fn detect_local_ip(discovery_host: &str) -> Option<IpAddr> {
    let socket = match tokio::net::UdpSocket::bind("0.0.0.0:0").await {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "could not bind socket for local IP discovery");
            return None;
        }
    };

    if let Err(e) = socket.connect((discovery_host, 80)).await {
        warn!(host = %discovery_host, error = %e, "could not discover local IP");
        return None;
    }

    match socket.local_addr() {
        Ok(addr) if !addr.ip().is_unspecified() => {
            debug!(ip = %addr.ip(), "discovered local IP for self exclusion");
            Some(addr.ip())
        }
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "could not read local socket address");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_url_is_not_self() {
        let identity = SelfIdentity::new();
        assert!(!identity.is_self("http://10.0.0.5:7867"));
        assert!(identity.is_empty());
    }

    #[test]
    fn mark_self_is_idempotent() {
        let identity = SelfIdentity::new();
        assert!(identity.mark_self("http://10.0.0.5:7867"));
        assert!(!identity.mark_self("http://10.0.0.5:7867"));
        assert_eq!(identity.len(), 1);
        assert!(identity.is_self("http://10.0.0.5:7867"));
    }

    #[test]
    fn clones_share_the_set() {
        let identity = SelfIdentity::new();
        let handle = identity.clone();
        handle.mark_self("http://beacon:7867");
        assert!(identity.is_self("http://beacon:7867"));
    }

    #[test]
    fn concurrent_marks_of_same_url_are_harmless() {
        let identity = SelfIdentity::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let identity = identity.clone();
                std::thread::spawn(move || {
                    identity.mark_self("http://10.0.0.5:7867");
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(identity.len(), 1);
    }

    #[test]
    fn identity_is_exact_string_match() {
        let identity = SelfIdentity::new();
        identity.mark_self("http://beacon:7867");
        assert!(!identity.is_self("http://BEACON:7867"));
        assert!(!identity.is_self("http://beacon:7867/"));
    }

    #[tokio::test]
    async fn local_ip_for_loopback_host() {
        let ip = detect_local_ip("127.0.0.1").await;
        assert_eq!(ip, Some("127.0.0.1".parse().unwrap()));
    }
}
