//! Messaging infrastructure: connection state and the inbound event bus.

pub mod connection;
pub mod event_bus;

pub use connection::{set_connection_state, ConnectionState, ConnectionStateObserver};
pub use event_bus::{EventBus, FrameHandler, SubscriptionId};
