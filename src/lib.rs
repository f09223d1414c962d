pub mod channel;
pub mod config;
pub mod messages;
pub mod recognition;
pub mod session;

pub use channel::{
    BackoffPolicy, ChannelHandlers, ChannelState, CloseEvent, Connector, Inbound, Outbound,
    ResilientChannel, Transport, TransportEvent, WebSocketConnector,
};
pub use config::Config;
pub use messages::{ChunkMessage, ControlAction, ControlMessage};
pub use recognition::{
    EngineConfig, EngineError, EngineEvent, EngineEventSink, ErrorKind, ManualProvider,
    RecognitionEngine, RecognitionProvider, RecognitionResult,
};
pub use session::{
    SessionCallbacks, SessionConfig, SessionError, SessionState, SessionStats, TranscriptChunk,
    TranscriptionSession,
};
