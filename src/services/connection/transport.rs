//! Transport Seams
//!
//! `Transport` is what request-issuing code sees: a connectivity check and a
//! send. `Connector` is what the connection manager uses to open the
//! underlying duplex stream.

use async_trait::async_trait;
use tokio::sync::mpsc;
use uilens_core::ClientMessage;

use crate::utils::error::AppResult;

/// Outbound half of the connection to the analysis service.
#[async_trait]
pub trait Transport: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Send one message.
    ///
    /// Fails with `AppError::ConnectionUnavailable` when no connection is open.
    async fn send(&self, message: &ClientMessage) -> AppResult<()>;
}

/// An open text-frame duplex stream.
///
/// Dropping `outbound` closes the connection; `inbound` yielding `None`
/// means the peer closed it.
#[derive(Debug)]
pub struct DuplexChannel {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl DuplexChannel {
    /// Build a connected pair: the channel handed to the manager and the
    /// peer end (`to_client`, `from_client`).
    pub fn pair() -> (
        Self,
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        let (outbound, from_client) = mpsc::unbounded_channel();
        let (to_client, inbound) = mpsc::unbounded_channel();
        (Self { outbound, inbound }, to_client, from_client)
    }
}

/// Opens connections.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> AppResult<DuplexChannel>;
}
