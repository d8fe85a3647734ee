//! WebSocket client for the backend game channel
//!
//! - `client`: the connection manager (session task, heartbeat, reconnect)
//! - `core`: backoff policy
//! - `shared`: URL building, outbound encoding and timing constants

mod client;
mod core;
mod error;
mod shared;

pub use client::{ConnectionConfig, ConnectionManager, Session};
pub use core::{BackoffState, ReconnectPolicy};
pub use error::ConnectionError;
pub use shared::{build_session_url, encode_outbound};
