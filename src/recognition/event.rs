use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind carried by every engine error event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    NotAllowed,
    ServiceNotAllowed,
    BadGrammar,
    LanguageNotSupported,
    Other(String),
}

impl ErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::NoSpeech => "no-speech",
            ErrorKind::Aborted => "aborted",
            ErrorKind::AudioCapture => "audio-capture",
            ErrorKind::Network => "network",
            ErrorKind::NotAllowed => "not-allowed",
            ErrorKind::ServiceNotAllowed => "service-not-allowed",
            ErrorKind::BadGrammar => "bad-grammar",
            ErrorKind::LanguageNotSupported => "language-not-supported",
            ErrorKind::Other(kind) => kind,
        }
    }

    /// `no-speech` and `aborted` are routine noise during continuous recognition
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::NoSpeech | ErrorKind::Aborted)
    }
}

impl From<&str> for ErrorKind {
    fn from(kind: &str) -> Self {
        match kind {
            "no-speech" => ErrorKind::NoSpeech,
            "aborted" => ErrorKind::Aborted,
            "audio-capture" => ErrorKind::AudioCapture,
            "network" => ErrorKind::Network,
            "not-allowed" => ErrorKind::NotAllowed,
            "service-not-allowed" => ErrorKind::ServiceNotAllowed,
            "bad-grammar" => ErrorKind::BadGrammar,
            "language-not-supported" => ErrorKind::LanguageNotSupported,
            other => ErrorKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let kind = String::deserialize(deserializer)?;
        Ok(ErrorKind::from(kind.as_str()))
    }
}

/// Native error descriptor reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct EngineError {
    #[serde(rename = "error")]
    pub kind: ErrorKind,
    #[serde(default)]
    pub message: String,
}

impl EngineError {
    pub fn new(kind: impl Into<ErrorKind>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// A single recognition result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub transcript: String,
    pub is_final: bool,
    /// Confidence score (0.0 to 1.0), if the engine reports one
    pub confidence: Option<f32>,
}

impl RecognitionResult {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
            confidence: None,
        }
    }

    pub fn final_result(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
            confidence: None,
        }
    }
}

/// Event raised by an engine instance
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Result(RecognitionResult),
    Error(EngineError),
    /// The engine has terminated
    End,
}
