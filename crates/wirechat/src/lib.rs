//! # Wirechat
//!
//! Transport core for a real-time chat client.
//!
//! Wirechat keeps one persistent connection to a chat server and moves
//! messages over it: compact schema-validated binary when it can, JSON text
//! when it can't, and images as a metadata/bytes frame pair. The connection
//! heals itself after unexpected drops with exponential backoff, and chat
//! typed while offline is delivered over HTTP instead.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wirechat::prelude::*;
//!
//! // Implement EventHandler (or pass an mpsc sender of ClientEvent), then:
//! // let client = WirechatClient::builder()
//! //     .page(PageLocation::new(PageScheme::Https, "chat.example.com"))
//! //     .remote_host("ws.example.com")
//! //     .start(my_handler)
//! //     .await?;
//! // client.send(LogicalMessage::text("hi").in_group("lobby"));
//! ```
//!
//! ## Crates
//!
//! | Crate                | Layer                                              |
//! |----------------------|----------------------------------------------------|
//! | `wirechat-transport` | frames, connector traits, endpoint selection       |
//! | `wirechat-protocol`  | schema registry, codec, attachment framing         |
//! | `wirechat-client`    | connection state machine, reconnect, callbacks     |

mod client;
mod error;

pub use client::{ClientBuilder, WirechatClient};
pub use error::WirechatError;

pub use wirechat_client as connection;
pub use wirechat_protocol as protocol;
pub use wirechat_transport as transport;

/// Common imports for wirechat users.
pub mod prelude {
    pub use crate::{ClientBuilder, WirechatClient, WirechatError};
    pub use wirechat_client::{
        ClientConfig, ClientEvent, ConnectionState, ConnectionStatus, EventHandler,
        ReconnectConfig,
    };
    pub use wirechat_protocol::{
        AttachmentResource, GroupMember, LogicalMessage, MessageKind, Payload, SchemaSource,
    };
    pub use wirechat_transport::{CloseFrame, PageLocation, PageScheme};
}
