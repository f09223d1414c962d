use super::chunk::TranscriptChunk;
use super::error::SessionError;
use serde::{Deserialize, Serialize};

/// Language used when none is configured
pub const DEFAULT_LANG: &str = "en-US";

/// Configuration for a transcription session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// BCP-47 language tag handed to every engine instance
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    DEFAULT_LANG.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
        }
    }
}

type ChunkCallback = Box<dyn FnMut(TranscriptChunk) + Send>;
type ErrorCallback = Box<dyn FnMut(SessionError) + Send>;
type EndCallback = Box<dyn FnMut() + Send>;

/// Callbacks a session reports through. `on_chunk` is mandatory.
pub struct SessionCallbacks {
    pub(crate) on_chunk: ChunkCallback,
    pub(crate) on_error: Option<ErrorCallback>,
    pub(crate) on_end: Option<EndCallback>,
}

impl SessionCallbacks {
    pub fn new(on_chunk: impl FnMut(TranscriptChunk) + Send + 'static) -> Self {
        Self {
            on_chunk: Box::new(on_chunk),
            on_error: None,
            on_end: None,
        }
    }

    pub fn on_error(mut self, handler: impl FnMut(SessionError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub fn on_end(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.on_end = Some(Box::new(handler));
        self
    }

    pub(crate) fn chunk(&mut self, chunk: TranscriptChunk) {
        (self.on_chunk)(chunk);
    }

    pub(crate) fn error(&mut self, error: SessionError) {
        if let Some(handler) = self.on_error.as_mut() {
            handler(error);
        }
    }

    pub(crate) fn end(&mut self) {
        if let Some(handler) = self.on_end.as_mut() {
            handler();
        }
    }
}

impl std::fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_error", &self.on_error.is_some())
            .field("on_end", &self.on_end.is_some())
            .finish()
    }
}
