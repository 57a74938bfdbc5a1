//! beacon-core — shared types for the Beacon alert relay.
//!
//! Holds the process [`Settings`], the [`Alert`] payload that flows from
//! the HTTP routes and the peer watcher into the notification backends,
//! and the [`DeliveryResult`] every backend reports back.

pub mod alert;
pub mod config;
pub mod duration;
pub mod error;

pub use alert::{Alert, DeliveryResult, DeliveryStatus, Level};
pub use config::Settings;
pub use duration::parse_duration;
pub use error::{ConfigError, ConfigResult};
