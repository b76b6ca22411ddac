//! Message protocol for wirechat.
//!
//! This crate defines what travels over a chat connection and how:
//!
//! - **Model** ([`LogicalMessage`], [`MessageKind`], [`Payload`]): the
//!   only message type the UI ever sees.
//! - **Binary container** ([`WireContainer`], [`wire`]): a tagged union of
//!   seven typed variants, serialized as MessagePack.
//! - **Schema** ([`SchemaRegistry`]): loads the protocol schema once and
//!   validates containers in both directions.
//! - **JSON fallback** ([`JsonEnvelope`]): what goes out when the binary
//!   path can't carry a message, and what most servers send back.
//! - **Codec** ([`MessageCodec`]): picks the format, owns the fallback
//!   decision.
//! - **Attachments** ([`AttachmentFramer`]): the metadata-then-bytes frame
//!   pair used for images.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and the connection
//! manager (callbacks). It doesn't know about sockets or reconnects; it only
//! turns frames into messages and messages into frames.
//!
//! ```text
//! Transport (Frame) → Protocol (LogicalMessage) → Client (EventHandler)
//! ```

mod attachment;
mod codec;
mod error;
pub mod json;
mod message_codec;
pub mod schema;
mod types;
pub mod wire;

pub use attachment::{AttachmentFramer, AttachmentMetadata};
pub use codec::{Codec, JsonCodec, MsgPackCodec};
pub use error::ProtocolError;
pub use json::{Inbound, JsonEnvelope};
pub use message_codec::{DEFAULT_NOTICE_SENDER, MessageCodec};
pub use schema::{SchemaRegistry, SchemaSource, TypeHandle};
pub use types::{AttachmentResource, GroupMember, LogicalMessage, MessageKind, Payload};
pub use wire::{VariantName, WireContainer, WireVariant};
