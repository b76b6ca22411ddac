//! Client transport abstraction layer for wirechat.
//!
//! Provides the [`Connector`], [`FrameSink`] and [`FrameSource`] traits that
//! abstract over the persistent connection a chat client keeps open, plus
//! [`Endpoint`] selection and the close-code vocabulary shared by the layers
//! above.
//!
//! A connection carries two kinds of data frames, exactly like a browser
//! WebSocket: text (JSON) and binary. The layers above decide what the bytes
//! mean; this crate only moves them.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket connector via `tokio-tungstenite`
//! - `tls`: `wss://` support through rustls

mod endpoint;
mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use endpoint::{DEFAULT_LOCAL_PORT, Endpoint, PageLocation, PageScheme};
pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnector, WebSocketSink, WebSocketSource};

use std::fmt;
use std::future::Future;

use bytes::Bytes;

// ---------------------------------------------------------------------------
// Close codes
// ---------------------------------------------------------------------------

/// Deliberate, local closure. The only code that suppresses reconnection.
pub const CLOSE_NORMAL: u16 = 1000;

/// A close frame arrived without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// The connection dropped without a close frame (or never opened).
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Code and reason carried by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFrame {
    /// The numeric close code (1000 = normal).
    pub code: u16,
    /// Human-readable reason, possibly empty.
    pub reason: String,
}

impl CloseFrame {
    /// A deliberate close with the given reason.
    pub fn normal(reason: impl Into<String>) -> Self {
        Self {
            code: CLOSE_NORMAL,
            reason: reason.into(),
        }
    }

    /// Returns `true` for the deliberate-closure code.
    pub fn is_normal(&self) -> bool {
        self.code == CLOSE_NORMAL
    }
}

impl fmt::Display for CloseFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One unit of data on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text frame (JSON in practice).
    Text(String),
    /// A binary frame (encoded container or raw attachment bytes).
    Binary(Bytes),
    /// The peer is closing the connection.
    ///
    /// `None` means the close frame carried no status code.
    Close(Option<CloseFrame>),
}

impl Frame {
    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
            Self::Close(_) => "close",
        }
    }

    /// Payload length in bytes (0 for close frames).
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
            Self::Close(_) => 0,
        }
    }

    /// Returns `true` if the frame carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Opens new outbound connections.
///
/// The returned futures must be `Send` because the connection manager drives
/// connect attempts and reads from helper tasks.
pub trait Connector: Send + Sync + 'static {
    /// The write half produced by this connector.
    type Sink: FrameSink;
    /// The read half produced by this connector.
    type Source: FrameSource;

    /// Dials `url` and returns the two halves of the open connection.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Source), TransportError>> + Send;
}

/// The write half of an open connection.
pub trait FrameSink: Send + 'static {
    /// Writes a single frame.
    fn send(&mut self, frame: Frame) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a close frame with the given code and reason.
    fn close(
        &mut self,
        frame: CloseFrame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// The read half of an open connection.
pub trait FrameSource: Send + 'static {
    /// Receives the next data or close frame.
    ///
    /// Returns `None` when the stream ended without a close frame.
    /// Must be cancel-safe.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<Frame, TransportError>>> + Send;
}
