//! Dual-format message codec.
//!
//! [`MessageCodec`] turns a [`LogicalMessage`] into a frame and back. It
//! prefers the typed binary container and falls back to the JSON envelope
//! whenever the binary path can't carry the message faithfully:
//!
//! | Condition                              | Outbound frame |
//! |----------------------------------------|----------------|
//! | schema unavailable                     | JSON text      |
//! | kind has no container variant          | JSON text      |
//! | variant would drop a field             | JSON text      |
//! | variant fails schema validation        | JSON text      |
//! | otherwise                              | binary         |
//!
//! The fallible steps are exposed as `try_*` methods returning
//! [`ProtocolError`]; the plain methods log the reason and return `None`.
//! Nothing here panics on bad input.

use std::sync::Arc;

use wirechat_transport::Frame;

use crate::json::{Inbound, JsonEnvelope, parse_inbound};
use crate::schema::{CONTAINER_TYPE, SchemaRegistry};
use crate::types::{now_millis_id, now_timestamp};
use crate::wire::{VariantName, WireContainer, WireVariant};
use crate::{LogicalMessage, ProtocolError};

/// Sender id used for client-originated notices that don't name one.
pub const DEFAULT_NOTICE_SENDER: &str = "client";

/// Converts messages to and from both wire formats.
///
/// Cheap to clone; clones share the registry.
#[derive(Debug, Clone)]
pub struct MessageCodec {
    registry: Arc<SchemaRegistry>,
}

impl MessageCodec {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    // -- Binary --------------------------------------------------------------

    /// Encodes `msg` as a binary container, or `None` to signal the JSON
    /// fallback.
    pub fn encode(&self, msg: &LogicalMessage) -> Option<Vec<u8>> {
        match self.try_encode(msg) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::debug!(kind = %msg.kind, reason = %e, "binary encode skipped");
                None
            }
        }
    }

    /// Encodes `msg` as a binary container.
    ///
    /// Missing defaults are filled in first: chat messages get an id and a
    /// timestamp, notices and recalls get [`DEFAULT_NOTICE_SENDER`] and a
    /// timestamp.
    ///
    /// # Errors
    /// - [`ProtocolError::SchemaUnavailable`] before a successful load
    /// - [`ProtocolError::NoVariant`] for JSON-only kinds
    /// - [`ProtocolError::Lossy`] when the variant can't hold every field
    /// - [`ProtocolError::Validation`] when the schema rejects the variant
    pub fn try_encode(&self, msg: &LogicalMessage) -> Result<Vec<u8>, ProtocolError> {
        if !self.registry.is_available() {
            return Err(ProtocolError::SchemaUnavailable);
        }
        let name = msg.kind.variant().ok_or(ProtocolError::NoVariant(msg.kind))?;

        let filled = with_defaults(msg);
        let variant = WireVariant::from_logical(name, &filled);
        if variant.clone().into_logical() != filled {
            return Err(ProtocolError::Lossy(name));
        }

        self.encode_container(&WireContainer::from_variant(variant))
    }

    /// Validates and serializes a container as is.
    ///
    /// The container schema requires exactly one variant, so malformed
    /// containers are rejected here rather than sent.
    pub fn encode_container(&self, container: &WireContainer) -> Result<Vec<u8>, ProtocolError> {
        self.registry.lookup(CONTAINER_TYPE)?.encode(container)
    }

    /// Decodes a binary container, or `None` if it isn't a valid one.
    pub fn decode(&self, bytes: &[u8]) -> Option<LogicalMessage> {
        match self.try_decode(bytes) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::warn!(len = bytes.len(), error = %e, "dropping undecodable binary frame");
                None
            }
        }
    }

    /// Decodes a binary container.
    ///
    /// # Errors
    /// Unavailable schema, malformed bytes, schema violations, and containers
    /// without exactly one variant.
    pub fn try_decode(&self, bytes: &[u8]) -> Result<LogicalMessage, ProtocolError> {
        if !self.registry.is_available() {
            return Err(ProtocolError::SchemaUnavailable);
        }
        let container: WireContainer = self.registry.lookup(CONTAINER_TYPE)?.decode(bytes)?;
        Ok(container.into_variant()?.into_logical())
    }

    // -- JSON ----------------------------------------------------------------

    /// The JSON envelope text for `msg`.
    pub fn encode_json(&self, msg: &LogicalMessage) -> Result<String, ProtocolError> {
        JsonEnvelope::from_logical(msg).to_text()
    }

    /// Classifies an inbound text frame.
    pub fn parse_text(&self, text: &str) -> Result<Inbound, ProtocolError> {
        parse_inbound(text)
    }

    // -- Frames --------------------------------------------------------------

    /// The single frame to write for `msg`: binary when the container can
    /// carry it, JSON text otherwise.
    ///
    /// Attachments are not handled here; see
    /// [`AttachmentFramer`](crate::AttachmentFramer).
    pub fn encode_frame(&self, msg: &LogicalMessage) -> Result<Frame, ProtocolError> {
        match self.encode(msg) {
            Some(bytes) => Ok(Frame::Binary(bytes.into())),
            None => self.encode_json(msg).map(Frame::Text),
        }
    }
}

/// Fills the defaults the wire types expect.
fn with_defaults(msg: &LogicalMessage) -> LogicalMessage {
    let mut filled = msg.clone();
    match msg.kind.variant() {
        Some(VariantName::ChatMessage) => {
            filled.id.get_or_insert_with(now_millis_id);
            filled.timestamp.get_or_insert_with(now_timestamp);
        }
        Some(
            VariantName::SystemMessage | VariantName::ErrorMessage | VariantName::RecallMessage,
        ) => {
            filled
                .sender_id
                .get_or_insert_with(|| DEFAULT_NOTICE_SENDER.to_string());
            filled.timestamp.get_or_insert_with(now_timestamp);
        }
        Some(VariantName::LoginSuccess | VariantName::LoginError | VariantName::GroupMembers)
        | None => {}
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GroupMember, MessageKind, Payload};

    fn codec() -> MessageCodec {
        MessageCodec::new(Arc::new(SchemaRegistry::embedded()))
    }

    #[test]
    fn test_encode_fills_chat_defaults() {
        let codec = codec();
        let bytes = codec.encode(&LogicalMessage::text("hello")).unwrap();
        let back = codec.decode(&bytes).unwrap();
        assert!(back.id.is_some());
        assert!(back.timestamp.is_some());
        assert_eq!(back.content, "hello");
    }

    #[test]
    fn test_encode_fills_notice_sender() {
        let codec = codec();
        let msg = LogicalMessage::new(MessageKind::System, "bye");
        let back = codec.decode(&codec.encode(&msg).unwrap()).unwrap();
        assert_eq!(back.sender_id.as_deref(), Some(DEFAULT_NOTICE_SENDER));
    }

    #[test]
    fn test_encode_without_schema_is_none() {
        let codec = MessageCodec::new(Arc::new(SchemaRegistry::new()));
        let msg = LogicalMessage::text("x");
        assert!(matches!(
            codec.try_encode(&msg),
            Err(ProtocolError::SchemaUnavailable)
        ));
        assert!(matches!(codec.encode_frame(&msg).unwrap(), Frame::Text(_)));
    }

    #[test]
    fn test_encode_control_kind_falls_back_to_json() {
        let codec = codec();
        let msg = LogicalMessage::new(MessageKind::JoinGroup, "").in_group("g1");
        assert!(matches!(
            codec.try_encode(&msg),
            Err(ProtocolError::NoVariant(MessageKind::JoinGroup))
        ));
        let Frame::Text(text) = codec.encode_frame(&msg).unwrap() else {
            panic!("expected JSON");
        };
        assert!(text.contains(r#""type":"joinGroup""#));
    }

    #[test]
    fn test_voice_duration_is_lossy_in_binary() {
        let codec = codec();
        let msg = LogicalMessage::new(MessageKind::Voice, "clip")
            .with_payload(Payload::Voice { duration: 2.0 });
        assert!(matches!(
            codec.try_encode(&msg),
            Err(ProtocolError::Lossy(VariantName::ChatMessage))
        ));
    }

    #[test]
    fn test_nickname_on_notice_is_lossy() {
        let codec = codec();
        let msg = LogicalMessage::new(MessageKind::Error, "boom").from_sender("s", "server");
        assert!(codec.encode(&msg).is_none());
    }

    #[test]
    fn test_group_members_round_trip() {
        let codec = codec();
        let msg = LogicalMessage::new(MessageKind::GroupMembers, "")
            .in_group("g1")
            .with_payload(Payload::Members(vec![GroupMember {
                user_id: "u1".into(),
                nickname: "alice".into(),
                avatar: String::new(),
            }]));
        assert_eq!(codec.decode(&codec.encode(&msg).unwrap()), Some(msg));
    }

    #[test]
    fn test_decode_empty_input_is_none() {
        assert!(codec().decode(&[]).is_none());
    }

    #[test]
    fn test_parse_text_returns_message() {
        let inbound = codec()
            .parse_text(r#"{"type":"system","content":"alice joined"}"#)
            .unwrap();
        let Inbound::Message(msg) = inbound else {
            panic!("expected message");
        };
        assert_eq!(msg.kind, MessageKind::System);
        assert_eq!(msg.content, "alice joined");
    }
}
