//! Speech recognition engine seam
//!
//! A `RecognitionProvider` answers whether recognition is available and builds
//! engine instances. Engines report results, errors and termination through the
//! `EngineEventSink` they were created with.

mod event;
mod manual;

pub use event::{EngineError, EngineEvent, ErrorKind, RecognitionResult};
pub use manual::{ManualEngine, ManualProvider};

use crate::session::SessionSignal;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Settings every engine instance is created with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// BCP-47 language tag
    pub lang: String,
    /// Keep recognizing across pauses in speech
    pub continuous: bool,
    /// Report partial results before they are final
    pub interim_results: bool,
}

impl EngineConfig {
    /// Continuous recognition with interim results
    pub fn continuous(lang: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            continuous: true,
            interim_results: true,
        }
    }
}

/// One physical recognition session
pub trait RecognitionEngine: Send {
    /// Begin recognizing
    fn start(&mut self) -> Result<()>;

    /// Stop recognizing. The engine should emit `EngineEvent::End` once it has stopped.
    fn stop(&mut self);
}

/// Capability probe and engine factory
pub trait RecognitionProvider: Send + Sync {
    /// Whether this environment can run speech recognition at all
    fn is_supported(&self) -> bool;

    /// Build a new, not yet started engine instance
    fn create_engine(
        &self,
        config: &EngineConfig,
        events: EngineEventSink,
    ) -> Result<Box<dyn RecognitionEngine>>;

    /// Provider name for logging
    fn name(&self) -> &str;
}

/// Where an engine instance delivers its events
///
/// Each sink is bound to the engine instance it was created for; events from
/// an engine that has since been replaced are discarded by the session.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    generation: u64,
    signals: mpsc::UnboundedSender<SessionSignal>,
}

impl EngineEventSink {
    pub(crate) fn new(generation: u64, signals: mpsc::UnboundedSender<SessionSignal>) -> Self {
        Self {
            generation,
            signals,
        }
    }

    /// Deliver an event. Returns false once the session is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.signals
            .send(SessionSignal::Engine {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
