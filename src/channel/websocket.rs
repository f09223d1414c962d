use super::transport::{CloseEvent, Connector, Transport, TransportEvent};
use anyhow::{bail, Context, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code reported when the peer sent a close frame without a status
const CLOSE_NO_STATUS: u16 = 1005;

/// WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid channel URL: {}", url))?;

        match parsed.scheme() {
            "ws" | "wss" => {}
            other => bail!("Unsupported channel URL scheme: {}", other),
        }

        info!("Opening WebSocket connection to {}", parsed);

        let (ws_stream, _response) = connect_async(parsed.as_str())
            .await
            .with_context(|| format!("Failed to connect to {}", parsed))?;

        let (sink, stream) = ws_stream.split();

        Ok(Box::new(WebSocketTransport {
            sink,
            stream,
            finished: false,
        }))
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

/// One open WebSocket connection
pub struct WebSocketTransport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    /// Set once the stream has ended or failed
    finished: bool,
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .context("Failed to send WebSocket frame")
    }

    async fn recv(&mut self) -> TransportEvent {
        if self.finished {
            return TransportEvent::Closed(CloseEvent::abnormal());
        }

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Message(text),
                Some(Ok(Message::Binary(bytes))) => {
                    return TransportEvent::Message(String::from_utf8_lossy(&bytes).into_owned());
                }
                Some(Ok(Message::Close(frame))) => {
                    self.finished = true;
                    let event = match frame {
                        Some(frame) => CloseEvent {
                            code: u16::from(frame.code),
                            reason: frame.reason.into_owned(),
                            was_clean: true,
                        },
                        None => CloseEvent {
                            code: CLOSE_NO_STATUS,
                            reason: String::new(),
                            was_clean: true,
                        },
                    };
                    return TransportEvent::Closed(event);
                }
                Some(Ok(other)) => {
                    // Ping/pong are answered by tungstenite itself
                    debug!("Ignoring control frame: {:?}", other);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return TransportEvent::Error(
                        anyhow::Error::new(e).context("WebSocket connection failed"),
                    );
                }
                None => {
                    self.finished = true;
                    return TransportEvent::Closed(CloseEvent::abnormal());
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .context("Failed to close WebSocket connection")
    }
}
