use crate::session::{SessionState, TranscriptChunk};
use serde::{Deserialize, Serialize};

/// Transcript chunk forwarded to the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMessage {
    /// Always `"chunk"`
    #[serde(rename = "type")]
    pub message_type: String,
    pub session_id: String,
    pub sequence: u64,
    pub text: String,
    pub is_final: bool,
    /// Milliseconds since the session started listening
    pub timestamp_ms: u64,
    /// RFC3339 timestamp
    pub sent_at: String,
}

impl ChunkMessage {
    pub fn new(session_id: impl Into<String>, sequence: u64, chunk: &TranscriptChunk) -> Self {
        Self {
            message_type: "chunk".to_string(),
            session_id: session_id.into(),
            sequence,
            text: chunk.text.clone(),
            is_final: chunk.is_final,
            timestamp_ms: chunk.timestamp_ms,
            sent_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Pause,
    Resume,
    Stop,
}

/// Session lifecycle notification sent to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub action: ControlAction,
}

impl ControlMessage {
    pub fn new(action: ControlAction) -> Self {
        Self { action }
    }

    /// Announcement telling a freshly (re)connected server where the session stands
    pub fn for_state(state: SessionState) -> Option<Self> {
        let action = match state {
            SessionState::Idle => return None,
            SessionState::Listening => ControlAction::Start,
            SessionState::Paused => ControlAction::Pause,
            SessionState::Stopped => ControlAction::Stop,
        };
        Some(Self::new(action))
    }

    /// Notification for a pause/resume that actually changed the session state
    pub fn for_transition(before: SessionState, after: SessionState) -> Option<Self> {
        match (before, after) {
            (SessionState::Listening, SessionState::Paused) => Some(Self::new(ControlAction::Pause)),
            (SessionState::Paused, SessionState::Listening) => {
                Some(Self::new(ControlAction::Resume))
            }
            _ => None,
        }
    }
}
