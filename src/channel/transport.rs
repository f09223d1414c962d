use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Close code for a connection that dropped without a close handshake
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Close code for a normal, caller-requested close
pub const CLOSE_NORMAL: u16 = 1000;

/// Details of a transport closure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseEvent {
    pub code: u16,
    pub reason: String,
    pub was_clean: bool,
}

impl CloseEvent {
    pub fn normal() -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: String::new(),
            was_clean: true,
        }
    }

    pub fn abnormal() -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
            was_clean: false,
        }
    }
}

/// Event reported by an open transport
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete inbound text frame
    Message(String),
    /// A transport-level failure. A `Closed` event is expected to follow
    Error(anyhow::Error),
    /// The connection is gone. The transport must not be polled again
    Closed(CloseEvent),
}

/// One physical, message-framed duplex connection
///
/// `recv` is polled inside `tokio::select!`, so implementations must be
/// cancellation safe: dropping a pending `recv` must not lose a frame.
#[async_trait::async_trait]
pub trait Transport: Send {
    /// Transmit one text frame
    async fn send(&mut self, text: String) -> Result<()>;

    /// Wait for the next event
    async fn recv(&mut self) -> TransportEvent;

    /// Start a clean close handshake
    async fn close(&mut self) -> Result<()>;
}

/// Factory for transport instances
///
/// A successful `connect` means the transport is open.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>>;

    /// Connector name for logging
    fn name(&self) -> &str;
}
