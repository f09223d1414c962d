use super::backoff::BackoffPolicy;
use super::handlers::{ChannelHandlers, Inbound, Outbound};
use super::transport::{CloseEvent, Connector, Transport, TransportEvent};
use super::websocket::WebSocketConnector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Connection state of a channel handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    Connecting,
    Open,
    Closing,
    Closed,
}

enum Command {
    Send(String),
    Close,
}

/// What the connection task does after a transport goes away
enum Flow {
    Reconnect,
    Terminate,
}

/// A duplex channel that transparently reconnects with exponential backoff
///
/// The handle owns a background task holding the single live transport.
/// Events are delivered to the `ChannelHandlers` from that task, one at a
/// time. Must be created inside a tokio runtime.
pub struct ResilientChannel {
    url: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ChannelState>,
    reconnect_attempts: Arc<AtomicU32>,
    intentional_close: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl ResilientChannel {
    /// Open a WebSocket channel to `url` with the default backoff
    pub fn connect(url: impl Into<String>, handlers: ChannelHandlers) -> Self {
        Self::connect_with(
            url,
            handlers,
            Arc::new(WebSocketConnector::new()),
            BackoffPolicy::default(),
        )
    }

    /// Open a channel over any transport
    pub fn connect_with(
        url: impl Into<String>,
        handlers: ChannelHandlers,
        connector: Arc<dyn Connector>,
        backoff: BackoffPolicy,
    ) -> Self {
        let url = url.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);
        let reconnect_attempts = Arc::new(AtomicU32::new(0));
        let intentional_close = Arc::new(AtomicBool::new(false));

        info!("Creating channel to {} via {}", url, connector.name());

        let task = ChannelTask {
            url: url.clone(),
            connector,
            backoff,
            handlers,
            commands: command_rx,
            state: state_tx,
            reconnect_attempts: Arc::clone(&reconnect_attempts),
            intentional_close: Arc::clone(&intentional_close),
        };

        let task = tokio::spawn(task.run());

        Self {
            url,
            commands: command_tx,
            state: state_rx,
            reconnect_attempts,
            intentional_close,
            task: Some(task),
        }
    }

    /// Transmit `payload` if the channel is open, otherwise drop it silently
    pub fn send(&self, payload: impl Into<Outbound>) {
        if self.ready_state() != ChannelState::Open {
            debug!("Channel to {} not open, dropping outbound message", self.url);
            return;
        }

        let payload: Outbound = payload.into();
        let _ = self.commands.send(Command::Send(payload.into_text()));
    }

    /// Serialize `payload` to JSON and send it
    pub fn send_json<T: Serialize>(&self, payload: &T) {
        match Outbound::json(payload) {
            Ok(outbound) => self.send(outbound),
            Err(e) => warn!("Failed to serialize outbound message: {}", e),
        }
    }

    /// Close the channel for good. Safe to call repeatedly.
    pub fn close(&self) {
        if self.intentional_close.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Closing channel to {}", self.url);
        let _ = self.commands.send(Command::Close);
    }

    /// Close and wait for the connection task to finish
    pub async fn shutdown(mut self) {
        self.close();

        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Channel task for {} panicked: {}", self.url, e);
            }
        }
    }

    /// Current state of the live transport, `Closed` once `close()` was called
    pub fn ready_state(&self) -> ChannelState {
        if self.intentional_close.load(Ordering::SeqCst) {
            return ChannelState::Closed;
        }
        *self.state.borrow()
    }

    /// Unexpected disconnects since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Drop for ResilientChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Background task owning the transport, handlers and reconnect timer
struct ChannelTask {
    url: String,
    connector: Arc<dyn Connector>,
    backoff: BackoffPolicy,
    handlers: ChannelHandlers,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ChannelState>,
    reconnect_attempts: Arc<AtomicU32>,
    intentional_close: Arc<AtomicBool>,
}

impl ChannelTask {
    async fn run(mut self) {
        loop {
            if let Flow::Terminate = self.connect_once().await {
                break;
            }

            if !self.wait_for_reconnect().await {
                break;
            }
        }

        self.state.send_replace(ChannelState::Closed);
        info!("Channel to {} closed", self.url);
    }

    /// Run one transport from connect to close
    async fn connect_once(&mut self) -> Flow {
        self.state.send_replace(ChannelState::Connecting);

        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let connecting = connector.connect(&url);
        tokio::pin!(connecting);

        let mut transport = loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Send(_)) => {
                        debug!("Channel to {} still connecting, dropping outbound message", self.url);
                    }
                    Some(Command::Close) | None => {
                        info!("Connection attempt to {} abandoned", self.url);
                        self.state.send_replace(ChannelState::Closed);
                        self.handlers.closed(CloseEvent::abnormal());
                        return Flow::Terminate;
                    }
                },

                result = &mut connecting => match result {
                    Ok(transport) => break transport,
                    Err(e) => {
                        warn!("Failed to connect to {}: {:#}", self.url, e);
                        self.handlers.error(e);
                        self.state.send_replace(ChannelState::Closed);
                        self.handlers.closed(CloseEvent::abnormal());
                        return Flow::Reconnect;
                    }
                },
            }
        };

        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.state.send_replace(ChannelState::Open);
        info!("Channel to {} open", self.url);
        self.handlers.opened();

        self.pump(transport.as_mut()).await
    }

    /// Forward commands and transport events until the transport closes
    async fn pump(&mut self, transport: &mut dyn Transport) -> Flow {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Send(text)) => {
                        if let Err(e) = transport.send(text).await {
                            warn!("Failed to send on channel to {}: {:#}", self.url, e);
                            self.handlers.error(e);
                        }
                    }
                    Some(Command::Close) | None => {
                        self.state.send_replace(ChannelState::Closing);
                        if let Err(e) = transport.close().await {
                            debug!("Close handshake with {} failed: {:#}", self.url, e);
                        }
                        self.state.send_replace(ChannelState::Closed);
                        self.handlers.closed(CloseEvent::normal());
                        return Flow::Terminate;
                    }
                },

                event = transport.recv() => match event {
                    TransportEvent::Message(raw) => self.handlers.message(Inbound::parse(raw)),
                    TransportEvent::Error(e) => {
                        warn!("Channel to {} reported an error: {:#}", self.url, e);
                        self.handlers.error(e);
                    }
                    TransportEvent::Closed(event) => {
                        info!(
                            "Channel to {} closed (code={}, clean={})",
                            self.url, event.code, event.was_clean
                        );
                        self.state.send_replace(ChannelState::Closed);
                        self.handlers.closed(event);
                        return Flow::Reconnect;
                    }
                },
            }
        }
    }

    /// Sleep out the backoff delay. Returns false if the channel was closed meanwhile.
    async fn wait_for_reconnect(&mut self) -> bool {
        if self.intentional_close.load(Ordering::SeqCst) {
            return false;
        }

        let previous = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.backoff.delay(previous);

        info!(
            "Reconnecting to {} in {:?} (attempt {})",
            self.url,
            delay,
            previous + 1
        );

        let timer = tokio::time::sleep(delay);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Send(_)) => {
                        debug!("Channel to {} reconnecting, dropping outbound message", self.url);
                    }
                    Some(Command::Close) | None => {
                        info!("Pending reconnect to {} canceled", self.url);
                        return false;
                    }
                },

                _ = &mut timer => return true,
            }
        }
    }
}
