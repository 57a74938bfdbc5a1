//! beacon-watch — the peer watcher.
//!
//! Discovers sibling Beacon instances, probes their `/health` endpoint,
//! excludes this instance from its own view, and raises one alert per
//! down/recovered transition through the [`Dispatcher`](beacon_notify::Dispatcher).
//!
//! # Architecture
//!
//! ```text
//! PeerWatcher (one background task)
//!   ├── every Kth pass: Resolver::discover()
//!   │     ├── static peer URLs
//!   │     └── service name → IPv4 addresses (NameLookup)
//!   ├── skip SelfIdentity hits
//!   ├── Prober::probe() per candidate (fanned out)
//!   │     └── Healthy(name) | Unhealthy | SelfDetected
//!   ├── PeerRecord::advance() → Option<AlertEvent>
//!   │     └── Dispatcher::deliver(alert)
//!   └── publish PeerSnapshot (verified peers of the finished pass)
//! ```
//!
//! A peer that is unreachable on its first sighting still raises a
//! CRITICAL alert. Repeated observations in the same state never re-alert.

pub mod identity;
pub mod peer;
pub mod probe;
pub mod resolver;
pub mod snapshot;
pub mod watcher;

use std::future::Future;
use std::pin::Pin;

pub use identity::SelfIdentity;
pub use peer::{AlertEvent, Observation, PeerRecord, PeerState};
pub use probe::{ProbeOutcome, Prober};
pub use resolver::{NameLookup, Resolver, StaticLookup, SystemLookup};
pub use snapshot::PeerSnapshot;
pub use watcher::{PassSummary, PeerWatcher, WatchConfig};

/// Boxed future returned by [`NameLookup::lookup`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
