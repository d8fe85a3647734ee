//! Outbound ports - Interfaces for external services
//!
//! Application services reach the backend's REST surface only through these
//! contracts, so tests can swap in mocks.

pub mod api_port;
pub mod raw_api_port;

pub use api_port::{ApiError, ErrorEnvelope};
pub use raw_api_port::RawApiPort;

#[cfg(test)]
pub use raw_api_port::MockRawApiPort;
