use crate::recognition::{EngineError, ErrorKind};
use thiserror::Error;

/// Failure reported through a session's `on_error` callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// No recognition engine is available in this environment
    #[error("Speech recognition is not supported in this environment")]
    NotSupported,

    /// An engine instance could not be created or started
    #[error("Failed to start speech recognition: {0}")]
    EngineStart(String),

    /// A fatal error reported by the engine, unchanged
    #[error("Speech recognition error: {0}")]
    Engine(#[from] EngineError),
}

impl SessionError {
    /// Engine error kind, if this came from the engine
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            SessionError::Engine(err) => Some(&err.kind),
            _ => None,
        }
    }
}
