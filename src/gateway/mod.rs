pub mod client;
pub mod discovery;
pub mod error;
pub mod heartbeat;
pub mod protocol;
pub mod reconnect;
pub mod session;
pub mod transport;

pub use client::{EventSink, GatewayClient};
pub use error::GatewayError;
pub use session::Session;
