//! Connection Layer
//!
//! Persistent duplex connection to the analysis service:
//! - `backoff` - Reconnect attempt bookkeeping
//! - `transport` - `Transport` / `Connector` seams
//! - `manager` - `ConnectionManager` supervisor
//! - `websocket` - tokio-tungstenite connector

pub mod backoff;
pub mod manager;
pub mod transport;
pub mod websocket;

pub use backoff::{ReconnectConfig, ReconnectPolicy};
pub use manager::{
    ConnectionEvent, ConnectionListener, ConnectionManager, ConnectionStatus, MessageHandler,
};
pub use transport::{Connector, DuplexChannel, Transport};
pub use websocket::WebSocketConnector;
