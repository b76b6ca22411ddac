//! Connection management for wirechat.
//!
//! This crate keeps one chat connection alive on behalf of a UI:
//!
//! 1. **State machine**: `Connecting → Open → Closed`, plus `Closing` for
//!    deliberate shutdown ([`ConnectionState`])
//! 2. **Reconnection**: exponential backoff after abnormal closes, with a
//!    hard attempt limit and a pause switch ([`ReconnectPolicy`])
//! 3. **Dispatch**: inbound frames become [`LogicalMessage`]s delivered to an
//!    [`EventHandler`]; outbound messages become binary, JSON or attachment
//!    frames
//! 4. **Fallback**: chat messages sent while disconnected go out over HTTP
//!    ([`HttpFallback`])
//!
//! All of it runs inside a single actor task ([`ConnectionManager`]),
//! controlled through a cloneable [`ConnectionHandle`].
//!
//! # How it fits in the stack
//!
//! ```text
//! UI (above)                  ← EventHandler callbacks, ConnectionHandle calls
//!     ↕
//! Client Layer (this crate)   ← connection lifecycle and dispatch
//!     ↕
//! Protocol Layer (below)      ← MessageCodec, AttachmentFramer
//!     ↕
//! Transport Layer             ← Connector, FrameSink, FrameSource
//! ```
//!
//! [`LogicalMessage`]: wirechat_protocol::LogicalMessage

mod config;
mod error;
mod fallback;
mod handler;
mod manager;
mod reconnect;
mod state;

pub use config::ClientConfig;
pub use error::ClientError;
pub use fallback::{FallbackSender, HttpFallback, SEND_MESSAGE_PATH};
pub use handler::{ClientEvent, EventHandler};
pub use manager::{ConnectionHandle, ConnectionManager};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use state::{ConnectionState, ConnectionStatus};
