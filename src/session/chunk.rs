use super::session::SessionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One normalized recognition result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptChunk {
    /// Recognized text
    pub text: String,

    /// Whether the engine will not revise this text any further
    pub is_final: bool,

    /// Milliseconds since the session first started listening
    pub timestamp_ms: u64,
}

/// Statistics about a transcription session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Current lifecycle state
    pub state: SessionState,

    /// When the session first started listening
    pub started_at: Option<DateTime<Utc>>,

    /// Milliseconds since the session first started listening
    pub elapsed_ms: u64,

    /// Chunks handed to `on_chunk`
    pub chunks_delivered: usize,

    /// How many of those were final
    pub final_chunks: usize,

    /// Engine instances created by start/resume
    pub engines_created: usize,

    /// Fatal errors forwarded to `on_error`
    pub errors_reported: usize,
}
