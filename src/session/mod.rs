//! Transcription session management
//!
//! `TranscriptionSession` wraps a continuous speech-recognition engine:
//! - Start/pause/resume/stop state machine, one engine instance at a time
//! - Recognition results normalized into timestamped `TranscriptChunk`s
//! - Routine engine noise (`no-speech`, `aborted`) swallowed, fatal errors forwarded

mod chunk;
mod config;
mod error;
mod session;

pub use chunk::{SessionStats, TranscriptChunk};
pub use config::{SessionCallbacks, SessionConfig, DEFAULT_LANG};
pub use error::SessionError;
pub use session::{SessionState, TranscriptionSession};

pub(crate) use session::SessionSignal;
