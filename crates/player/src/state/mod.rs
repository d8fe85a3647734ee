//! Client-side game state
//!
//! The store is a plain reducer; handlers bound by the game service feed it
//! from WebSocket pushes and REST responses.

mod event_log;
mod game_store;

pub use event_log::{EventLog, LogPolicy};
pub use game_store::{
    shared_store, ApplyOutcome, GameStore, SharedGameStore, StorePolicy, UnknownEntityPolicy,
    INITIAL_FEAR_POINTS,
};
