//! Per-peer state machine.
//!
//! Tracks whether a peer is up or down and decides which observations
//! deserve an alert: one CRITICAL on every entry into `Down`, one RESOLVED
//! on every `Down → Up`. Staying in a state is silent.

use tracing::debug;

/// Monitoring state of one peer URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Never observed; no alert has been sent.
    Unknown,
    Up,
    Down,
}

/// What a single pass saw for a peer (self detections never get here).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Healthy,
    Unhealthy,
}

/// An alert-worthy transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertEvent {
    Critical,
    Resolved,
}

impl AlertEvent {
    pub fn tag(&self) -> &'static str {
        match self {
            AlertEvent::Critical => "CRITICAL",
            AlertEvent::Resolved => "RESOLVED",
        }
    }
}

/// Transition table.
///
/// | state   | observed  | next | emits    |
/// |---------|-----------|------|----------|
/// | Unknown | Healthy   | Up   | -        |
/// | Unknown | Unhealthy | Down | CRITICAL |
/// | Up      | Healthy   | Up   | -        |
/// | Up      | Unhealthy | Down | CRITICAL |
/// | Down    | Healthy   | Up   | RESOLVED |
/// | Down    | Unhealthy | Down | -        |
pub fn transition(state: PeerState, observed: Observation) -> (PeerState, Option<AlertEvent>) {
    match (state, observed) {
        (PeerState::Unknown | PeerState::Up, Observation::Healthy) => (PeerState::Up, None),
        (PeerState::Unknown | PeerState::Up, Observation::Unhealthy) => {
            (PeerState::Down, Some(AlertEvent::Critical))
        }
        (PeerState::Down, Observation::Healthy) => (PeerState::Up, Some(AlertEvent::Resolved)),
        (PeerState::Down, Observation::Unhealthy) => (PeerState::Down, None),
    }
}

/// Everything the watcher remembers about one peer URL.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    url: String,
    state: PeerState,
    /// A CRITICAL went out and no RESOLVED has followed yet.
    alert_in_flight: bool,
    /// Consecutive discoveries that did not return this URL.
    missed_discoveries: u32,
}

impl PeerRecord {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            state: PeerState::Unknown,
            alert_in_flight: false,
            missed_discoveries: 0,
        }
    }

    /// Feed one observation; returns the alert to send, if any.
    pub fn advance(&mut self, observed: Observation) -> Option<AlertEvent> {
        let (next, event) = transition(self.state, observed);
        if next != self.state {
            debug!(url = %self.url, from = ?self.state, to = ?next, "peer state changed");
        }
        self.state = next;
        match event {
            Some(AlertEvent::Critical) => self.alert_in_flight = true,
            Some(AlertEvent::Resolved) => self.alert_in_flight = false,
            None => {}
        }
        event
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn alert_in_flight(&self) -> bool {
        self.alert_in_flight
    }

    pub(crate) fn mark_discovered(&mut self) {
        self.missed_discoveries = 0;
    }

    /// Count a discovery without this URL; returns the new miss count.
    pub(crate) fn mark_missed(&mut self) -> u32 {
        self.missed_discoveries += 1;
        self.missed_discoveries
    }
}
