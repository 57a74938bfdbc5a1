//! Read side of the verified-peer set.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;

pub(crate) type PeerSet = Arc<BTreeSet<String>>;

/// Handle onto the peers verified by the most recently completed pass.
///
/// The watcher swaps the whole set at the end of a pass, so a reader
/// sees either the previous pass or the new one, never a mix. Reads do
/// not wait on the watcher.
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    rx: watch::Receiver<PeerSet>,
}

impl PeerSnapshot {
    pub(crate) fn channel() -> (watch::Sender<PeerSet>, Self) {
        let (tx, rx) = watch::channel(PeerSet::default());
        (tx, Self { rx })
    }

    /// A snapshot that stays empty (watcher disabled).
    pub fn empty() -> Self {
        Self::channel().1
    }

    pub fn snapshot(&self) -> Arc<BTreeSet<String>> {
        self.rx.borrow().clone()
    }

    /// Wait for the next published pass. Returns `false` once the watcher is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
