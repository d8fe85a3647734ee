pub mod http_client;
pub mod messaging;
pub mod websocket;

pub use http_client::ApiAdapter;
pub use messaging::{ConnectionState, EventBus};
pub use websocket::{ConnectionConfig, ConnectionManager};
