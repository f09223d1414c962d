use super::{
    EngineConfig, EngineError, EngineEvent, EngineEventSink, ErrorKind, RecognitionEngine,
    RecognitionProvider, RecognitionResult,
};
use anyhow::{bail, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// How many of the most recent engines stay addressable
pub const MAX_RETAINED_ENGINES: usize = 16;

#[derive(Debug)]
struct EngineRecord {
    config: EngineConfig,
    sink: EngineEventSink,
    running: bool,
}

#[derive(Debug)]
struct ManualState {
    supported: bool,
    fail_start: bool,
    /// Index of the oldest record still in `engines`
    first_index: usize,
    engines: VecDeque<EngineRecord>,
}

impl ManualState {
    fn created(&self) -> usize {
        self.first_index + self.engines.len()
    }

    fn get(&self, index: usize) -> Option<&EngineRecord> {
        index
            .checked_sub(self.first_index)
            .and_then(|offset| self.engines.get(offset))
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut EngineRecord> {
        index
            .checked_sub(self.first_index)
            .and_then(|offset| self.engines.get_mut(offset))
    }

    fn record(&mut self, record: EngineRecord) -> usize {
        if self.engines.len() == MAX_RETAINED_ENGINES {
            if let Some(oldest) = self.engines.pop_front() {
                debug!("Forgetting engine {} ({:?})", self.first_index, oldest.config);
            }
            self.first_index += 1;
        }
        self.engines.push_back(record);
        self.created() - 1
    }
}

/// Recognition provider whose engines emit whatever events are pushed into it
///
/// Engines are addressed by creation index, so events can also be pushed
/// through an engine that has already been stopped or replaced. Only the
/// `MAX_RETAINED_ENGINES` most recent engines are kept; pushes to older ones
/// are dropped. Used by the line-driven CLI and by tests.
#[derive(Debug, Clone)]
pub struct ManualProvider {
    state: Arc<Mutex<ManualState>>,
}

impl ManualProvider {
    pub fn new() -> Self {
        Self::with_support(true)
    }

    /// A provider for an environment without speech recognition
    pub fn unsupported() -> Self {
        Self::with_support(false)
    }

    fn with_support(supported: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                supported,
                fail_start: false,
                first_index: 0,
                engines: VecDeque::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every following `start()` fail
    pub fn set_fail_start(&self, fail: bool) {
        self.lock().fail_start = fail;
    }

    /// Number of engine instances created so far
    pub fn engines_created(&self) -> usize {
        self.lock().created()
    }

    /// Number of engines still addressable through `push_to`
    pub fn retained_engines(&self) -> usize {
        self.lock().engines.len()
    }

    /// Number of engines currently running
    pub fn running_engines(&self) -> usize {
        self.lock().engines.iter().filter(|e| e.running).count()
    }

    pub fn is_running(&self, index: usize) -> bool {
        self.lock().get(index).map(|e| e.running).unwrap_or(false)
    }

    pub fn engine_config(&self, index: usize) -> Option<EngineConfig> {
        self.lock().get(index).map(|e| e.config.clone())
    }

    /// Emit through the most recently created engine
    pub fn push(&self, event: EngineEvent) -> bool {
        let state = self.lock();
        match state.engines.back() {
            Some(engine) => engine.sink.emit(event),
            None => {
                debug!("No recognition engine created yet, dropping {:?}", event);
                false
            }
        }
    }

    /// Emit through the engine created `index`-th
    pub fn push_to(&self, index: usize, event: EngineEvent) -> bool {
        let state = self.lock();
        match state.get(index) {
            Some(engine) => engine.sink.emit(event),
            None => {
                debug!("Engine {} is not retained, dropping {:?}", index, event);
                false
            }
        }
    }

    pub fn push_final(&self, text: impl Into<String>) -> bool {
        self.push(EngineEvent::Result(RecognitionResult::final_result(text)))
    }

    pub fn push_interim(&self, text: impl Into<String>) -> bool {
        self.push(EngineEvent::Result(RecognitionResult::interim(text)))
    }

    pub fn push_error(&self, kind: impl Into<ErrorKind>, message: impl Into<String>) -> bool {
        self.push(EngineEvent::Error(EngineError::new(kind, message)))
    }

    /// Simulate the engine ending on its own
    pub fn push_end(&self) -> bool {
        let mut state = self.lock();
        match state.engines.back_mut() {
            Some(engine) => {
                engine.running = false;
                engine.sink.emit(EngineEvent::End)
            }
            None => false,
        }
    }
}

impl Default for ManualProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionProvider for ManualProvider {
    fn is_supported(&self) -> bool {
        self.lock().supported
    }

    fn create_engine(
        &self,
        config: &EngineConfig,
        events: EngineEventSink,
    ) -> Result<Box<dyn RecognitionEngine>> {
        let mut state = self.lock();
        if !state.supported {
            bail!("Speech recognition is not available");
        }

        let index = state.record(EngineRecord {
            config: config.clone(),
            sink: events,
            running: false,
        });

        Ok(Box::new(ManualEngine {
            state: Arc::clone(&self.state),
            index,
        }))
    }

    fn name(&self) -> &str {
        "manual"
    }
}

/// Engine instance created by `ManualProvider`
#[derive(Debug)]
pub struct ManualEngine {
    state: Arc<Mutex<ManualState>>,
    index: usize,
}

impl RecognitionEngine for ManualEngine {
    fn start(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.fail_start {
            bail!("Engine {} refused to start", self.index);
        }

        if let Some(engine) = state.get_mut(self.index) {
            engine.running = true;
        }
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(engine) = state.get_mut(self.index) {
            if engine.running {
                engine.running = false;
                engine.sink.emit(EngineEvent::End);
            }
        }
    }
}
