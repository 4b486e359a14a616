//! Built-in generic components.
//!
//! Implementations that don't depend on specific storage backends or
//! transports and can be used across different configurations.

mod notify;
mod pending;

pub use notify::{BroadcastNotifier, LogNotifier, NotificationStream};
pub use pending::EphemeralPending;
