//! Two-frame attachment protocol.
//!
//! Images don't fit the typed container, so they travel as a pair of frames
//! on the same connection:
//!
//! ```text
//! text   {"type":"imageMetadata","id":..,"senderId":..,"messageType":"image",..}
//! binary <raw image bytes>
//! ```
//!
//! The receiver keeps the metadata in a single slot until the next binary
//! frame arrives, then combines the two into one image message.
//!
//! ## Known limitation
//!
//! The slot is a slot, not a queue. If a second metadata frame arrives before
//! the first attachment's bytes, the first metadata is lost and the bytes
//! that follow are attributed to the second. Servers in the wild rely on this
//! exact pairing rule, so it is kept as is; [`AttachmentFramer::receive_metadata`]
//! hands back the overwritten entry so the caller can log it.

use bytes::Bytes;
use wirechat_transport::Frame;

use crate::json::{EnvelopeData, IMAGE_METADATA_TYPE, JsonEnvelope};
use crate::types::{now_millis_id, now_timestamp};
use crate::{AttachmentResource, LogicalMessage, MessageKind, Payload, ProtocolError};

/// Everything about an attachment except its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttachmentMetadata {
    pub id: Option<String>,
    pub sender_id: Option<String>,
    pub sender_nickname: Option<String>,
    pub timestamp: Option<String>,
    pub group_id: Option<String>,
}

impl AttachmentMetadata {
    /// Metadata announcing `msg`'s attachment.
    pub fn for_message(msg: &LogicalMessage) -> Self {
        Self {
            id: msg.id.clone(),
            sender_id: msg.sender_id.clone(),
            sender_nickname: msg.sender_nickname.clone(),
            timestamp: msg.timestamp.clone(),
            group_id: msg.group_id.clone(),
        }
    }

    /// Reads metadata out of a parsed envelope.
    ///
    /// `groupId` is taken from `data` when present, else from the top level;
    /// senders disagree on where it belongs.
    pub fn from_envelope(envelope: JsonEnvelope) -> Self {
        let group_id = envelope.group();
        Self {
            id: envelope.id,
            sender_id: envelope.sender_id,
            sender_nickname: envelope.sender_nickname,
            timestamp: envelope.timestamp,
            group_id,
        }
    }

    /// The metadata frame's JSON text.
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        JsonEnvelope {
            kind: IMAGE_METADATA_TYPE.to_string(),
            id: self.id.clone(),
            sender_id: self.sender_id.clone(),
            sender_nickname: self.sender_nickname.clone(),
            message_type: Some(MessageKind::Image.as_str().to_string()),
            timestamp: self.timestamp.clone(),
            data: Some(EnvelopeData {
                group_id: self.group_id.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }
        .to_text()
    }
}

/// Builds outbound frame pairs and reassembles inbound ones.
#[derive(Debug, Default)]
pub struct AttachmentFramer {
    pending: Option<AttachmentMetadata>,
}

impl AttachmentFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata and binary frames for `msg`, in write order.
    ///
    /// The two frames must be written back to back; the receiver pairs a
    /// binary frame with whatever metadata came right before it.
    /// A missing id or timestamp is filled in with the current time.
    pub fn start_outbound(
        &self,
        msg: &LogicalMessage,
        bytes: Bytes,
    ) -> Result<(Frame, Frame), ProtocolError> {
        let mut metadata = AttachmentMetadata::for_message(msg);
        metadata.id.get_or_insert_with(now_millis_id);
        metadata.timestamp.get_or_insert_with(now_timestamp);

        let text = metadata.to_text()?;
        Ok((Frame::Text(text), Frame::Binary(bytes)))
    }

    /// Stores metadata in the slot, returning what it replaced.
    pub fn receive_metadata(&mut self, metadata: AttachmentMetadata) -> Option<AttachmentMetadata> {
        self.pending.replace(metadata)
    }

    /// Combines the pending metadata with `bytes`.
    ///
    /// Returns `None` (and leaves `bytes` to the caller's other decoders)
    /// when nothing is pending. The slot is empty afterwards either way.
    pub fn receive_binary(&mut self, bytes: Bytes) -> Option<LogicalMessage> {
        let metadata = self.pending.take()?;
        let resource = AttachmentResource::inbound(bytes);

        Some(LogicalMessage {
            id: metadata.id,
            sender_id: metadata.sender_id,
            sender_nickname: metadata.sender_nickname,
            content: resource.url.clone(),
            kind: MessageKind::Image,
            timestamp: metadata.timestamp,
            group_id: metadata.group_id,
            sent: false,
            payload: Payload::Attachment(resource),
        })
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&AttachmentMetadata> {
        self.pending.as_ref()
    }

    /// Drops any pending metadata.
    pub fn clear(&mut self) {
        self.pending = None;
    }
}
