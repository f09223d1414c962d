// Integration tests for the reconnecting channel
//
// A mock connector hands every connection attempt to the test, which decides
// whether it opens or fails. Timing runs on tokio's paused clock, so backoff
// delays are measured in virtual time.

use anyhow::{anyhow, Result};
use live_transcript::channel::{
    BackoffPolicy, ChannelHandlers, ChannelState, CloseEvent, Connector, Inbound,
    ResilientChannel, Transport, TransportEvent,
};
use live_transcript::{ControlAction, ControlMessage, SessionState};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

const URL: &str = "ws://transcripts.test/live";

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

struct PendingAttempt {
    url: String,
    reply: oneshot::Sender<Result<Box<dyn Transport>>>,
}

impl PendingAttempt {
    /// Let the connection open
    fn accept(self) -> Peer {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();

        let transport = MockTransport {
            events: event_rx,
            sent: sent_tx,
        };
        let _ = self.reply.send(Ok(Box::new(transport)));

        Peer {
            events: event_tx,
            sent: sent_rx,
        }
    }

    /// Fail the connection before it opens
    fn refuse(self) {
        let _ = self.reply.send(Err(anyhow!("connection refused")));
    }
}

/// Server side of one accepted connection
struct Peer {
    events: mpsc::UnboundedSender<TransportEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

impl Peer {
    fn message(&self, text: &str) {
        let _ = self.events.send(TransportEvent::Message(text.to_string()));
    }

    fn error(&self, message: &str) {
        let _ = self.events.send(TransportEvent::Error(anyhow!(message.to_string())));
    }

    fn drop_connection(&self) {
        let _ = self.events.send(TransportEvent::Closed(CloseEvent::abnormal()));
    }

    async fn next_sent(&mut self) -> Option<String> {
        tokio::time::timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .ok()
            .flatten()
    }
}

struct MockTransport {
    events: mpsc::UnboundedReceiver<TransportEvent>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sent.send(text).map_err(|_| anyhow!("peer gone"))
    }

    async fn recv(&mut self) -> TransportEvent {
        match self.events.recv().await {
            Some(event) => event,
            None => TransportEvent::Closed(CloseEvent::abnormal()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

struct MockConnector {
    attempts: mpsc::UnboundedSender<PendingAttempt>,
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.attempts
            .send(PendingAttempt {
                url: url.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("test finished"))?;

        reply_rx.await.map_err(|_| anyhow!("attempt dropped"))?
    }

    fn name(&self) -> &str {
        "mock"
    }
}

struct Server {
    attempts: mpsc::UnboundedReceiver<PendingAttempt>,
}

impl Server {
    async fn next_attempt(&mut self) -> PendingAttempt {
        tokio::time::timeout(Duration::from_secs(3600), self.attempts.recv())
            .await
            .expect("no connection attempt within an hour")
            .expect("connector dropped")
    }

    fn has_pending_attempt(&mut self) -> bool {
        self.attempts.try_recv().is_ok()
    }
}

fn mock_connector() -> (Arc<dyn Connector>, Server) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(MockConnector { attempts: tx }), Server { attempts: rx })
}

// ---------------------------------------------------------------------------
// Handler recording
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Seen {
    Open,
    Message(Inbound),
    Close(CloseEvent),
    Error(String),
}

fn recording_handlers() -> (ChannelHandlers, mpsc::UnboundedReceiver<Seen>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let open_tx = tx.clone();
    let message_tx = tx.clone();
    let close_tx = tx.clone();
    let error_tx = tx;

    let handlers = ChannelHandlers::new()
        .on_open(move || {
            let _ = open_tx.send(Seen::Open);
        })
        .on_message(move |message| {
            let _ = message_tx.send(Seen::Message(message));
        })
        .on_close(move |event| {
            let _ = close_tx.send(Seen::Close(event));
        })
        .on_error(move |e| {
            let _ = error_tx.send(Seen::Error(e.to_string()));
        });

    (handlers, rx)
}

async fn next_seen(events: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(3600), events.recv())
        .await
        .expect("no handler invoked")
        .expect("handlers dropped")
}

fn assert_waited(elapsed: Duration, expected_ms: u64) {
    let expected = Duration::from_millis(expected_ms);
    assert!(
        elapsed >= expected && elapsed < expected + Duration::from_millis(50),
        "expected ~{:?} backoff, waited {:?}",
        expected,
        elapsed
    );
}

fn open_channel(connector: Arc<dyn Connector>, handlers: ChannelHandlers) -> ResilientChannel {
    ResilientChannel::connect_with(URL, handlers, connector, BackoffPolicy::default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_reconnect_delays_double() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let attempt = server.next_attempt().await;
    assert_eq!(attempt.url, URL);
    let peer = attempt.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    peer.drop_connection();
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::abnormal()));
    assert_eq!(channel.reconnect_attempts(), 1);

    let closed_at = Instant::now();
    let attempt = server.next_attempt().await;
    assert_waited(closed_at.elapsed(), 1000);
    assert_eq!(attempt.url, URL);
    assert!(!server.has_pending_attempt());

    // Second attempt fails before opening: error, then close
    attempt.refuse();
    assert!(matches!(next_seen(&mut events).await, Seen::Error(msg) if msg.contains("refused")));
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::abnormal()));
    assert_eq!(channel.reconnect_attempts(), 2);

    let closed_at = Instant::now();
    let attempt = server.next_attempt().await;
    assert_waited(closed_at.elapsed(), 2000);
    assert_eq!(attempt.url, URL);
    assert!(!server.has_pending_attempt());

    attempt.refuse();
    next_seen(&mut events).await;
    next_seen(&mut events).await;

    let closed_at = Instant::now();
    let _attempt = server.next_attempt().await;
    assert_waited(closed_at.elapsed(), 4000);
}

#[tokio::test(start_paused = true)]
async fn test_successful_open_resets_backoff() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    peer.drop_connection();
    next_seen(&mut events).await;

    server.next_attempt().await.refuse();
    next_seen(&mut events).await;
    next_seen(&mut events).await;
    assert_eq!(channel.reconnect_attempts(), 2);

    let peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    assert_eq!(channel.reconnect_attempts(), 0);
    assert_eq!(channel.ready_state(), ChannelState::Open);

    peer.drop_connection();
    next_seen(&mut events).await;

    let closed_at = Instant::now();
    let _attempt = server.next_attempt().await;
    assert_waited(closed_at.elapsed(), 1000);
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_all_reconnects() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    channel.close();
    assert_eq!(channel.ready_state(), ChannelState::Closed);
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::normal()));

    // Anything the server does afterwards is irrelevant
    peer.drop_connection();
    tokio::time::sleep(Duration::from_secs(24 * 3600)).await;

    assert!(!server.has_pending_attempt());
    assert_eq!(channel.ready_state(), ChannelState::Closed);

    // Repeated close and send are harmless
    channel.close();
    channel.send("ignored");
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_pending_reconnect() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    peer.drop_connection();
    next_seen(&mut events).await;

    // Reconnect timer is pending now
    channel.close();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert!(!server.has_pending_attempt());
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_close_while_connecting() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let attempt = server.next_attempt().await;
    assert_eq!(channel.ready_state(), ChannelState::Connecting);

    channel.close();
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::abnormal()));

    // The abandoned attempt can no longer open the channel
    let _peer = attempt.accept();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert!(!server.has_pending_attempt());
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_send_only_transmits_when_open() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let attempt = server.next_attempt().await;
    channel.send("too early");

    let mut peer = attempt.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    channel.send(json!({"action": "start"}));
    assert_eq!(peer.next_sent().await.as_deref(), Some(r#"{"action":"start"}"#));

    channel.send("plain text");
    assert_eq!(peer.next_sent().await.as_deref(), Some("plain text"));

    channel.send_json(&ControlMessage::new(ControlAction::Pause));
    assert_eq!(peer.next_sent().await.as_deref(), Some(r#"{"action":"pause"}"#));

    peer.drop_connection();
    next_seen(&mut events).await;
    assert_eq!(channel.ready_state(), ChannelState::Closed);

    // Dropped, not queued for the next connection
    channel.send("while disconnected");

    let mut peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    channel.send("after reconnect");
    assert_eq!(peer.next_sent().await.as_deref(), Some("after reconnect"));
}

#[tokio::test(start_paused = true)]
async fn test_start_sent_before_open_is_lost() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    assert_eq!(channel.ready_state(), ChannelState::Connecting);
    channel.send_json(&ControlMessage::new(ControlAction::Start));

    let mut peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    channel.send("marker");
    assert_eq!(peer.next_sent().await.as_deref(), Some("marker"));
}

#[tokio::test(start_paused = true)]
async fn test_session_state_announced_on_every_open() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);
    let mut session_state = SessionState::Listening;

    // Host pattern: announce from the open notification, not right after connect
    let mut peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    if let Some(announcement) = ControlMessage::for_state(session_state) {
        channel.send_json(&announcement);
    }
    assert_eq!(peer.next_sent().await.as_deref(), Some(r#"{"action":"start"}"#));

    peer.drop_connection();
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::abnormal()));
    session_state = SessionState::Paused;

    let mut peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);
    if let Some(announcement) = ControlMessage::for_state(session_state) {
        channel.send_json(&announcement);
    }
    assert_eq!(peer.next_sent().await.as_deref(), Some(r#"{"action":"pause"}"#));
}

#[tokio::test(start_paused = true)]
async fn test_inbound_messages_parsed_or_passed_through() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let _channel = open_channel(connector, handlers);

    let peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    peer.message("not-json-data");
    assert_eq!(
        next_seen(&mut events).await,
        Seen::Message(Inbound::Text("not-json-data".to_string()))
    );

    peer.message(r#"{"type":"ack","sequence":7}"#);
    assert_eq!(
        next_seen(&mut events).await,
        Seen::Message(Inbound::Json(json!({"type": "ack", "sequence": 7})))
    );

    peer.message("{broken");
    assert_eq!(
        next_seen(&mut events).await,
        Seen::Message(Inbound::Text("{broken".to_string()))
    );
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_alone_does_not_reconnect() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    peer.error("frame too large");
    assert_eq!(next_seen(&mut events).await, Seen::Error("frame too large".to_string()));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(channel.ready_state(), ChannelState::Open);
    assert!(!server.has_pending_attempt());

    peer.drop_connection();
    next_seen(&mut events).await;
    let _attempt = server.next_attempt().await;
}

#[tokio::test(start_paused = true)]
async fn test_handlers_are_optional() {
    let (connector, mut server) = mock_connector();
    let channel = open_channel(connector, ChannelHandlers::new());

    let peer = server.next_attempt().await.accept();
    peer.message("hello");
    peer.error("boom");
    peer.drop_connection();

    let attempt = server.next_attempt().await;
    assert_eq!(attempt.url, URL);
    assert_eq!(channel.url(), URL);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_task() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let _peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    channel.shutdown().await;
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::normal()));
    assert!(!server.has_pending_attempt());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_closes_channel() {
    let (connector, mut server) = mock_connector();
    let (handlers, mut events) = recording_handlers();
    let channel = open_channel(connector, handlers);

    let _peer = server.next_attempt().await.accept();
    assert_eq!(next_seen(&mut events).await, Seen::Open);

    drop(channel);
    assert_eq!(next_seen(&mut events).await, Seen::Close(CloseEvent::normal()));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(!server.has_pending_attempt());
}
