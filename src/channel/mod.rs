//! Reconnecting duplex channel
//!
//! `ResilientChannel` keeps one logical connection alive on top of a series of
//! physical transports:
//! - Unexpected closes are followed by a reconnect after an exponential backoff
//! - A successful open resets the backoff
//! - `close()` is terminal and cancels any pending reconnect
//! - Inbound frames are JSON-decoded when possible, raw text otherwise

mod backoff;
mod channel;
mod handlers;
mod transport;
mod websocket;

pub use backoff::{BackoffPolicy, DEFAULT_BASE_DELAY_MS};
pub use channel::{ChannelState, ResilientChannel};
pub use handlers::{ChannelHandlers, Inbound, Outbound};
pub use transport::{CloseEvent, Connector, Transport, TransportEvent, CLOSE_ABNORMAL, CLOSE_NORMAL};
pub use websocket::{WebSocketConnector, WebSocketTransport};
