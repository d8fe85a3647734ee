//! Connection lifecycle state.
//!
//! The state lives in an `AtomicU8` owned by the connection manager; observers
//! share the same atomic and read it without locking.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Connection state for a game session.
///
/// `Disconnected → Connecting → Connected`; an unexpected close moves to
/// `Reconnecting`, a failed attempt to `Error`, and an exhausted retry budget
/// back to `Disconnected` (terminal until the next `connect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    /// Waiting out the backoff delay before the next attempt
    Reconnecting = 3,
    /// The last attempt failed; another may still be scheduled
    Error = 4,
}

impl ConnectionState {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Unknown values read as `Disconnected`.
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Error,
            _ => ConnectionState::Disconnected,
        }
    }

    /// A session exists and is either live or trying to become live.
    pub fn is_in_session(self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of a manager's state, cheap to clone into UI code.
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    pub fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// Store `new_state`, returning the previous one.
pub fn set_connection_state(state_ref: &AtomicU8, new_state: ConnectionState) -> ConnectionState {
    ConnectionState::from_u8(state_ref.swap(new_state.to_u8(), Ordering::SeqCst))
}
