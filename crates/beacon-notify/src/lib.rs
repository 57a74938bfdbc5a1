//! beacon-notify — alert delivery to notification backends.
//!
//! Each backend implements [`Notifier`]. The [`Dispatcher`] fans a single
//! [`Alert`](beacon_core::Alert) out to every backend concurrently, so a
//! slow or failing backend never holds up the others.
//!
//! ```text
//! Dispatcher::deliver(alert)
//!   ├── SlackNotifier          → chat.postMessage
//!   └── HomeAssistantNotifier  → webhook or notify service
//!         └── RetryPolicy (3 attempts, 1s → 2s backoff)
//! ```

pub mod dispatcher;
pub mod homeassistant;
pub mod retry;
pub mod slack;

use std::future::Future;
use std::pin::Pin;

use beacon_core::{Alert, DeliveryResult};

pub use dispatcher::Dispatcher;
pub use homeassistant::HomeAssistantNotifier;
pub use retry::RetryPolicy;
pub use slack::SlackNotifier;

/// Boxed future returned by [`Notifier::send`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A notification backend.
pub trait Notifier: Send + Sync {
    /// Short platform name reported in [`DeliveryResult::platform`].
    fn platform(&self) -> &'static str;

    /// Whether enough credentials are present to attempt delivery.
    fn is_configured(&self) -> bool;

    /// Deliver an alert. Never fails: errors are folded into the result.
    fn send<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, DeliveryResult>;
}
