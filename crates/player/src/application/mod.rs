//! Application layer - Use cases and orchestration

pub mod api;
pub mod error;
pub mod services;

pub use api::GameApi;
pub use error::ServiceError;
pub use services::GameService;
