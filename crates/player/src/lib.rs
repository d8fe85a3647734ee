//! Rulehaunt Player - real-time sync client for the rules-horror backend.
//!
//! - `infrastructure::websocket`: Connection Manager (one socket per game)
//! - `state`: Game State Store (pure reducer over REST and pushed updates)
//! - `application`: typed REST API and the game service that ties both together
//! - `config`: environment-driven configuration

pub mod application;
pub mod config;
pub mod infrastructure;
pub mod ports;
pub mod state;

pub use application::{GameApi, GameService, ServiceError};
pub use config::PlayerConfig;
pub use infrastructure::websocket::{ConnectionConfig, ConnectionError, ConnectionManager};
pub use infrastructure::{ApiAdapter, ConnectionState};
pub use state::{GameStore, SharedGameStore};
