//! Services
//!
//! Runtime services of the client:
//! - `scheduler` - sleep/yield seam used by reconnects and scans
//! - `connection` - WebSocket connection with reconnect backoff
//! - `correlator` - request/response correlation per request family
//! - `live` - the live scanner and the cache it keeps in sync

pub mod connection;
pub mod correlator;
pub mod live;
pub mod scheduler;

pub use connection::{ConnectionEvent, ConnectionManager, ConnectionStatus, WebSocketConnector};
pub use live::{LiveScanner, ScanSummary, ScannerOptions};
pub use scheduler::{RecordingScheduler, Scheduler, TokioScheduler};
