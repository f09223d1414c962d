use super::transport::CloseEvent;
use serde::Serialize;
use serde_json::Value;

type OpenHandler = Box<dyn FnMut() + Send>;
type MessageHandler = Box<dyn FnMut(Inbound) + Send>;
type CloseHandler = Box<dyn FnMut(CloseEvent) + Send>;
type ErrorHandler = Box<dyn FnMut(anyhow::Error) + Send>;

/// Inbound message as handed to `on_message`
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Payload parsed as JSON
    Json(Value),
    /// Payload that is not valid JSON, unchanged
    Text(String),
}

impl Inbound {
    /// Parse a raw frame, falling back to the raw text
    pub fn parse(raw: String) -> Self {
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Inbound::Json(value),
            Err(_) => Inbound::Text(raw),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Inbound::Json(value) => Some(value),
            Inbound::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Inbound::Text(text) => Some(text),
            Inbound::Json(_) => None,
        }
    }
}

/// Outbound payload accepted by `ResilientChannel::send`
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Sent unchanged
    Text(String),
    /// Sent as compact JSON text
    Json(Value),
}

impl Outbound {
    /// Serialize any structured payload
    pub fn json<T: Serialize>(payload: &T) -> serde_json::Result<Self> {
        Ok(Outbound::Json(serde_json::to_value(payload)?))
    }

    /// Wire text for this payload
    pub fn into_text(self) -> String {
        match self {
            Outbound::Text(text) => text,
            // Serializing a Value cannot fail
            Outbound::Json(value) => value.to_string(),
        }
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Outbound::Text(text)
    }
}

impl From<&str> for Outbound {
    fn from(text: &str) -> Self {
        Outbound::Text(text.to_string())
    }
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        Outbound::Json(value)
    }
}

/// Per-event callbacks for a `ResilientChannel`. Any subset may be set.
#[derive(Default)]
pub struct ChannelHandlers {
    on_open: Option<OpenHandler>,
    on_message: Option<MessageHandler>,
    on_close: Option<CloseHandler>,
    on_error: Option<ErrorHandler>,
}

impl ChannelHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(handler));
        self
    }

    pub fn on_message(mut self, handler: impl FnMut(Inbound) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(handler));
        self
    }

    pub fn on_close(mut self, handler: impl FnMut(CloseEvent) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(handler));
        self
    }

    pub fn on_error(mut self, handler: impl FnMut(anyhow::Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    pub(crate) fn opened(&mut self) {
        if let Some(handler) = self.on_open.as_mut() {
            handler();
        }
    }

    pub(crate) fn message(&mut self, message: Inbound) {
        if let Some(handler) = self.on_message.as_mut() {
            handler(message);
        }
    }

    pub(crate) fn closed(&mut self, event: CloseEvent) {
        if let Some(handler) = self.on_close.as_mut() {
            handler(event);
        }
    }

    pub(crate) fn error(&mut self, error: anyhow::Error) {
        if let Some(handler) = self.on_error.as_mut() {
            handler(error);
        }
    }
}

impl std::fmt::Debug for ChannelHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_message", &self.on_message.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
