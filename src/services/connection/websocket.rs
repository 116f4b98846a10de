//! WebSocket Connector
//!
//! Opens a tokio-tungstenite client connection and bridges it onto a
//! [`DuplexChannel`] with two pump tasks.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::transport::{Connector, DuplexChannel};
use crate::utils::error::{AppError, AppResult};

/// Connector for `ws://` / `wss://` endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> AppResult<DuplexChannel> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| AppError::websocket(format!("connect {url}: {e}")))?;
        let (mut sink, mut stream) = ws.split();

        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound) = mpsc::unbounded_channel::<String>();

        // Writer: ends when the manager drops its sender.
        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!(error = %e, "websocket write failed");
                    return;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: dropping `inbound_tx` signals the close to the manager.
        tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(reason)) => {
                        debug!(?reason, "websocket closed by peer");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "websocket read failed");
                        break;
                    }
                }
            }
        });

        Ok(DuplexChannel { outbound, inbound })
    }
}
