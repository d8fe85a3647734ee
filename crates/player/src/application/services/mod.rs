//! Application services

pub mod game_service;

pub use game_service::{apply_frame, GameService, STORE_BOUND_KINDS};
