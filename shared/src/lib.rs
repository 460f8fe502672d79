//! WidgetLink Shared Protocol Types
//!
//! This crate provides the wire protocol shared by hardware devices, the
//! server and app clients: command and response codes, frame types, the
//! binary codec and helpers for the `\0`-separated text bodies.

pub mod body;
pub mod codec;
pub mod command;

use std::time::{SystemTime, UNIX_EPOCH};

pub use body::{parse_pin, split2, split3, PinParseError, PinType, BODY_SEPARATOR};
pub use command::{Command, ResponseCode};

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Timing and sizing parameters shared by both ends of a connection
pub mod limits {
    /// Ping interval for hardware connections in milliseconds
    pub const PING_INTERVAL_MS: u64 = 10_000;

    /// How long a request may wait for its response before it is given up
    pub const ACK_TIMEOUT_MS: u64 = 5_000;

    /// Default depth of a connection's outbound frame queue
    pub const OUTBOUND_QUEUE_DEPTH: usize = 256;
}

/// A command frame carrying a text body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: Command,
    pub id: u16,
    pub body: String,
}

/// A response frame: message id plus status code, no body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub id: u16,
    pub code: ResponseCode,
}

/// Anything that can travel over a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(Message),
    Response(Response),
}

impl Message {
    /// Create a message with an arbitrary command and body
    pub fn new(command: Command, id: u16, body: impl Into<String>) -> Self {
        Self {
            command,
            id,
            body: body.into(),
        }
    }

    /// Login request; the body is a device token or `email\0password`
    pub fn login(id: u16, credentials: impl Into<String>) -> Self {
        Self::new(Command::Login, id, credentials)
    }

    /// Keep-alive request
    pub fn ping(id: u16) -> Self {
        Self::new(Command::Ping, id, String::new())
    }

    /// Ask the server to change a display property of the widget on a virtual pin
    pub fn set_widget_property(id: u16, pin: u8, property: &str, value: &str) -> Self {
        let body = format!("{pin}{BODY_SEPARATOR}{property}{BODY_SEPARATOR}{value}");
        Self::new(Command::SetWidgetProperty, id, body)
    }
}

impl Response {
    pub fn new(id: u16, code: ResponseCode) -> Self {
        Self { id, code }
    }

    /// Successful acknowledgement
    pub fn ok(id: u16) -> Self {
        Self::new(id, ResponseCode::Ok)
    }

    /// The request body could not be accepted
    pub fn illegal_command_body(id: u16) -> Self {
        Self::new(id, ResponseCode::IllegalCommandBody)
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}

impl Frame {
    /// Message id of the frame, whatever its kind
    pub fn id(&self) -> u16 {
        match self {
            Frame::Message(m) => m.id,
            Frame::Response(r) => r.id,
        }
    }
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Frame::Message(message)
    }
}

impl From<Response> for Frame {
    fn from(response: Response) -> Self {
        Frame::Response(response)
    }
}
