use super::chunk::{SessionStats, TranscriptChunk};
use super::config::{SessionCallbacks, SessionConfig};
use super::error::SessionError;
use crate::recognition::{
    EngineConfig, EngineEvent, EngineEventSink, RecognitionEngine, RecognitionProvider,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle state of a transcription session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Listening,
    Paused,
    Stopped,
}

/// Everything the event pump consumes, in delivery order
#[derive(Debug)]
pub(crate) enum SessionSignal {
    /// Event from the engine created with this generation
    Engine { generation: u64, event: EngineEvent },
    /// Failure raised by a caller operation
    Failed(SessionError),
    /// The caller stopped the session
    Ended,
}

/// What the pump hands to the callbacks after classifying a signal
enum Dispatch {
    Chunk(TranscriptChunk),
    Error(SessionError),
    End,
}

struct SessionInner {
    state: SessionState,
    /// The single live engine instance
    engine: Option<Box<dyn RecognitionEngine>>,
    /// Bumped every time the engine slot is refilled
    generation: u64,
    started_at: Option<Instant>,
    started_at_utc: Option<DateTime<Utc>>,
    last_timestamp_ms: u64,
    chunks_delivered: usize,
    final_chunks: usize,
    engines_created: usize,
    errors_reported: usize,
}

impl SessionInner {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            engine: None,
            generation: 0,
            started_at: None,
            started_at_utc: None,
            last_timestamp_ms: 0,
            chunks_delivered: 0,
            final_chunks: 0,
            engines_created: 0,
            errors_reported: 0,
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Stop and discard the current engine, if any
    fn release_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.stop();
        }
    }

    /// Decide what an engine event means for the caller
    fn classify(&mut self, generation: u64, event: EngineEvent) -> Option<Dispatch> {
        if generation != self.generation {
            debug!(
                "Discarding {:?} from replaced engine (generation {}, current {})",
                event, generation, self.generation
            );
            return None;
        }

        match event {
            EngineEvent::Result(result) => {
                if self.state != SessionState::Listening {
                    debug!("Discarding result received while {:?}", self.state);
                    return None;
                }

                let timestamp_ms = self.elapsed_ms().max(self.last_timestamp_ms);
                self.last_timestamp_ms = timestamp_ms;
                self.chunks_delivered += 1;
                if result.is_final {
                    self.final_chunks += 1;
                }

                Some(Dispatch::Chunk(TranscriptChunk {
                    text: result.transcript,
                    is_final: result.is_final,
                    timestamp_ms,
                }))
            }

            EngineEvent::Error(err) => {
                if !err.kind.is_fatal() {
                    debug!("Ignoring non-fatal recognition error: {}", err);
                    return None;
                }

                if self.state == SessionState::Stopped {
                    debug!("Ignoring recognition error after stop: {}", err);
                    return None;
                }

                warn!("Recognition error: {}", err);
                self.errors_reported += 1;
                Some(Dispatch::Error(SessionError::Engine(err)))
            }

            EngineEvent::End => {
                if self.state != SessionState::Listening {
                    // Pause and stop already accounted for this termination
                    return None;
                }

                info!("Recognition engine ended on its own, session stopped");
                self.state = SessionState::Stopped;
                self.engine = None;
                Some(Dispatch::End)
            }
        }
    }
}

/// A pausable continuous transcription session
///
/// Owns at most one recognition engine at a time and replaces it on every
/// start/resume. Callbacks are invoked from a background task, one at a time
/// and in event order; chunks are only delivered while `Listening`. Must be
/// created inside a tokio runtime.
///
/// A result is classified against the state under the lock, but `on_chunk`
/// runs after the lock is released. On a multi-thread runtime a `pause()` or
/// `stop()` from another thread can land in between: that one chunk is still
/// delivered, and every result after it is dropped. Operations called from
/// inside a callback take effect before the next event is classified.
pub struct TranscriptionSession {
    provider: Arc<dyn RecognitionProvider>,
    config: SessionConfig,
    supported: bool,
    inner: Arc<Mutex<SessionInner>>,
    signals: mpsc::UnboundedSender<SessionSignal>,
    pump_handle: JoinHandle<()>,
}

impl TranscriptionSession {
    /// Create a session. Support is probed once, here.
    pub fn new(
        provider: Arc<dyn RecognitionProvider>,
        config: SessionConfig,
        callbacks: SessionCallbacks,
    ) -> Self {
        let supported = provider.is_supported();

        info!(
            "Creating transcription session (provider={}, lang={}, supported={})",
            provider.name(),
            config.lang,
            supported
        );

        let inner = Arc::new(Mutex::new(SessionInner::new()));
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let pump_handle = tokio::spawn(pump(Arc::clone(&inner), signal_rx, callbacks));

        Self {
            provider,
            config,
            supported,
            inner,
            signals: signal_tx,
            pump_handle,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, signal: SessionSignal) {
        let _ = self.signals.send(signal);
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::continuous(self.config.lang.clone())
    }

    /// Put a freshly started engine into the slot, replacing any previous one
    fn spawn_engine(&self, inner: &mut SessionInner) -> Result<()> {
        inner.release_engine();
        inner.generation += 1;

        let sink = EngineEventSink::new(inner.generation, self.signals.clone());
        let mut engine = self
            .provider
            .create_engine(&self.engine_config(), sink)
            .context("Failed to create recognition engine")?;
        inner.engines_created += 1;

        engine.start().context("Failed to start recognition engine")?;
        inner.engine = Some(engine);

        Ok(())
    }

    /// Begin listening
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.state != SessionState::Idle {
            warn!("start() ignored, session is {:?}", inner.state);
            return;
        }

        if !self.supported {
            warn!("Speech recognition is not supported, cannot start");
            self.notify(SessionSignal::Failed(SessionError::NotSupported));
            return;
        }

        if let Err(e) = self.spawn_engine(&mut inner) {
            error!("Failed to start transcription session: {:#}", e);
            self.notify(SessionSignal::Failed(SessionError::EngineStart(format!("{:#}", e))));
            return;
        }

        if inner.started_at.is_none() {
            inner.started_at = Some(Instant::now());
            inner.started_at_utc = Some(Utc::now());
        }
        inner.state = SessionState::Listening;
        info!("Transcription session listening ({})", self.config.lang);
    }

    /// Stop the engine without ending the session
    pub fn pause(&self) {
        let mut inner = self.lock();
        if inner.state != SessionState::Listening {
            warn!("pause() ignored, session is {:?}", inner.state);
            return;
        }

        inner.state = SessionState::Paused;
        inner.release_engine();
        info!("Transcription session paused");
    }

    /// Continue listening on a new engine
    pub fn resume(&self) {
        if !self.supported {
            debug!("resume() ignored, speech recognition is not supported");
            return;
        }

        let mut inner = self.lock();
        if inner.state != SessionState::Paused {
            warn!("resume() ignored, session is {:?}", inner.state);
            return;
        }

        if let Err(e) = self.spawn_engine(&mut inner) {
            error!("Failed to resume transcription session: {:#}", e);
            self.notify(SessionSignal::Failed(SessionError::EngineStart(format!("{:#}", e))));
            return;
        }

        inner.state = SessionState::Listening;
        info!("Transcription session resumed");
    }

    /// End the session for good. `on_end` fires once.
    pub fn stop(&self) {
        let mut inner = self.lock();
        match inner.state {
            SessionState::Listening | SessionState::Paused => {}
            state => {
                warn!("stop() ignored, session is {:?}", state);
                return;
            }
        }

        inner.state = SessionState::Stopped;
        inner.release_engine();
        self.notify(SessionSignal::Ended);
        info!("Transcription session stopped");
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    pub fn language(&self) -> &str {
        &self.config.lang
    }

    /// Get current session statistics
    pub fn stats(&self) -> SessionStats {
        let inner = self.lock();
        SessionStats {
            state: inner.state,
            started_at: inner.started_at_utc,
            elapsed_ms: inner.elapsed_ms(),
            chunks_delivered: inner.chunks_delivered,
            final_chunks: inner.final_chunks,
            engines_created: inner.engines_created,
            errors_reported: inner.errors_reported,
        }
    }
}

impl Drop for TranscriptionSession {
    fn drop(&mut self) {
        self.pump_handle.abort();
        self.lock().release_engine();
    }
}

/// Deliver signals to the callbacks, never while holding the state lock
async fn pump(
    inner: Arc<Mutex<SessionInner>>,
    mut signals: mpsc::UnboundedReceiver<SessionSignal>,
    mut callbacks: SessionCallbacks,
) {
    debug!("Transcription event pump started");

    while let Some(signal) = signals.recv().await {
        let dispatch = match signal {
            SessionSignal::Engine { generation, event } => {
                let mut inner = inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                inner.classify(generation, event)
            }
            SessionSignal::Failed(err) => Some(Dispatch::Error(err)),
            SessionSignal::Ended => Some(Dispatch::End),
        };

        match dispatch {
            Some(Dispatch::Chunk(chunk)) => callbacks.chunk(chunk),
            Some(Dispatch::Error(err)) => callbacks.error(err),
            Some(Dispatch::End) => callbacks.end(),
            None => {}
        }
    }

    debug!("Transcription event pump stopped");
}
