//! The application-level message model.
//!
//! [`LogicalMessage`] is the only type that crosses the boundary between this
//! core and the UI. It is deliberately independent of both wire formats: the
//! binary container ([`crate::wire`]) and the JSON envelope ([`crate::json`])
//! are translations of it, never the other way around.

use std::fmt;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// What a message is.
///
/// The first three kinds are chat content and share one wire variant; the
/// next six each have their own variant; the last three are control messages
/// that only ever travel as JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Plain chat text.
    Text,
    /// An image attachment.
    Image,
    /// A voice clip.
    Voice,
    /// Server notice (join/leave announcements and the like).
    System,
    /// Server-reported error.
    Error,
    /// Login accepted.
    LoginSuccess,
    /// Login rejected.
    LoginError,
    /// Member list of a group.
    GroupMembers,
    /// A previously sent message was withdrawn.
    Recall,
    /// Client asks to join a group.
    JoinGroup,
    /// Server confirms a group join.
    JoinGroupSuccess,
    /// Client leaves a group.
    LeaveGroup,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::Text,
        Self::Image,
        Self::Voice,
        Self::System,
        Self::Error,
        Self::LoginSuccess,
        Self::LoginError,
        Self::GroupMembers,
        Self::Recall,
        Self::JoinGroup,
        Self::JoinGroupSuccess,
        Self::LeaveGroup,
    ];

    /// Returns `true` for text, image and voice.
    pub fn is_chat(self) -> bool {
        matches!(self, Self::Text | Self::Image | Self::Voice)
    }

    /// Stable lowercase name, used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::System => "system",
            Self::Error => "error",
            Self::LoginSuccess => "login-success",
            Self::LoginError => "login-error",
            Self::GroupMembers => "group-members",
            Self::Recall => "recall",
            Self::JoinGroup => "join-group",
            Self::JoinGroupSuccess => "join-group-success",
            Self::LeaveGroup => "leave-group",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// One entry of a group member list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupMember {
    /// Member's user id.
    #[serde(deserialize_with = "crate::json::lenient_text")]
    pub user_id: String,
    /// Display name.
    #[serde(deserialize_with = "crate::json::lenient_text")]
    pub nickname: String,
    /// Avatar URL, possibly empty.
    #[serde(deserialize_with = "crate::json::lenient_text")]
    pub avatar: String,
}

/// A displayable handle for attachment bytes.
///
/// Inbound attachments get a fresh `blob:` style URL that the UI can hand to
/// an image element; the URL is random, NOT derived from the attachment id,
/// so two deliveries of the same attachment get different handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentResource {
    /// Opaque URL referencing the bytes. Empty on outbound attachments.
    pub url: String,
    /// MIME type of the bytes.
    pub mime: String,
    /// The raw attachment bytes.
    pub bytes: Bytes,
}

impl AttachmentResource {
    /// MIME type assumed for image attachments.
    pub const IMAGE_MIME: &'static str = "image/jpeg";

    /// Wraps inbound bytes in a new resource with a random handle.
    pub fn inbound(bytes: Bytes) -> Self {
        Self {
            url: generate_resource_url(),
            mime: Self::IMAGE_MIME.to_string(),
            bytes,
        }
    }

    /// Wraps bytes the local user is about to send.
    pub fn outbound(bytes: Bytes) -> Self {
        Self {
            url: String::new(),
            mime: Self::IMAGE_MIME.to_string(),
            bytes,
        }
    }
}

/// Kind-specific data that does not fit the common fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    /// Nothing beyond the common fields.
    #[default]
    None,
    /// Voice clip length in seconds.
    Voice {
        /// Duration in seconds.
        duration: f64,
    },
    /// Avatar handed out on login.
    Login {
        /// Avatar URL.
        avatar: String,
    },
    /// The members of [`LogicalMessage::group_id`].
    Members(Vec<GroupMember>),
    /// Which message a recall withdraws.
    Recall {
        /// Id of the withdrawn message.
        message_id: String,
    },
    /// Binary attachment data.
    Attachment(AttachmentResource),
}

// ---------------------------------------------------------------------------
// LogicalMessage
// ---------------------------------------------------------------------------

/// A chat-level message, independent of how it travels.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalMessage {
    /// Message id. Chat messages get one assigned on send if missing.
    pub id: Option<String>,
    /// Sender's user id.
    pub sender_id: Option<String>,
    /// Sender's display name.
    pub sender_nickname: Option<String>,
    /// Text content, or the resource URL for inbound attachments.
    pub content: String,
    /// What this message is.
    pub kind: MessageKind,
    /// ISO-8601 timestamp.
    pub timestamp: Option<String>,
    /// Group the message belongs to.
    pub group_id: Option<String>,
    /// `true` when the local user sent it.
    pub sent: bool,
    /// Kind-specific data.
    pub payload: Payload,
}

impl LogicalMessage {
    /// A message of `kind` with the given content and nothing else set.
    pub fn new(kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: None,
            sender_id: None,
            sender_nickname: None,
            content: content.into(),
            kind,
            timestamp: None,
            group_id: None,
            sent: false,
            payload: Payload::None,
        }
    }

    /// A plain text chat message.
    pub fn text(content: impl Into<String>) -> Self {
        Self::new(MessageKind::Text, content)
    }

    /// An outbound image attachment.
    pub fn image(bytes: impl Into<Bytes>) -> Self {
        Self {
            payload: Payload::Attachment(AttachmentResource::outbound(bytes.into())),
            sent: true,
            ..Self::new(MessageKind::Image, "")
        }
    }

    /// A recall request for `message_id` in `group_id`.
    pub fn recall(group_id: impl Into<String>, message_id: impl Into<String>) -> Self {
        Self {
            group_id: Some(group_id.into()),
            payload: Payload::Recall {
                message_id: message_id.into(),
            },
            ..Self::new(MessageKind::Recall, "")
        }
    }

    /// Sets the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets sender id and nickname.
    pub fn from_sender(mut self, id: impl Into<String>, nickname: impl Into<String>) -> Self {
        self.sender_id = Some(id.into());
        self.sender_nickname = Some(nickname.into());
        self
    }

    /// Sets the group.
    pub fn in_group(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    /// Sets the timestamp.
    pub fn at(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    /// Marks the message as sent by the local user (or not).
    pub fn mine(mut self, sent: bool) -> Self {
        self.sent = sent;
        self
    }

    /// Replaces the payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// The attachment, if this message carries one.
    pub fn attachment(&self) -> Option<&AttachmentResource> {
        match &self.payload {
            Payload::Attachment(resource) => Some(resource),
            _ => None,
        }
    }

    /// Returns `true` when the message must go out as metadata + raw bytes.
    pub fn is_outbound_attachment(&self) -> bool {
        self.kind == MessageKind::Image
            && self.attachment().is_some_and(|a| !a.bytes.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current time as an ISO-8601 UTC string with millisecond precision.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch, as a message id.
pub(crate) fn now_millis_id() -> String {
    chrono::Utc::now().timestamp_millis().to_string()
}

/// Generates a `blob:` URL with 128 bits of randomness.
fn generate_resource_url() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    format!("blob:wirechat/{hex}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_chat_only_for_content_kinds() {
        let chat: Vec<_> = MessageKind::ALL.iter().filter(|k| k.is_chat()).collect();
        assert_eq!(
            chat,
            [&MessageKind::Text, &MessageKind::Image, &MessageKind::Voice]
        );
    }

    #[test]
    fn test_kind_names_are_unique() {
        let mut names: Vec<_> = MessageKind::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MessageKind::ALL.len());
    }

    #[test]
    fn test_image_constructor_is_outbound_attachment() {
        let msg = LogicalMessage::image(vec![1u8, 2, 3]);
        assert!(msg.is_outbound_attachment());
        assert!(msg.sent);
        assert_eq!(msg.attachment().unwrap().bytes.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_image_without_bytes_is_not_outbound_attachment() {
        let msg = LogicalMessage::image(Vec::<u8>::new());
        assert!(!msg.is_outbound_attachment());
        assert!(!LogicalMessage::text("hi").is_outbound_attachment());
    }

    #[test]
    fn test_inbound_resources_get_distinct_urls() {
        let a = AttachmentResource::inbound(Bytes::from_static(b"x"));
        let b = AttachmentResource::inbound(Bytes::from_static(b"x"));
        assert!(a.url.starts_with("blob:wirechat/"));
        assert_eq!(a.url.len(), "blob:wirechat/".len() + 32);
        assert_ne!(a.url, b.url);
        assert_eq!(a.mime, "image/jpeg");
    }

    #[test]
    fn test_now_timestamp_is_iso_utc() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'), "expected UTC suffix: {ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_builders_set_fields() {
        let msg = LogicalMessage::text("hello")
            .with_id("m1")
            .from_sender("u1", "alice")
            .in_group("g1")
            .at("2024-01-01T00:00:00.000Z")
            .mine(true);
        assert_eq!(msg.id.as_deref(), Some("m1"));
        assert_eq!(msg.sender_id.as_deref(), Some("u1"));
        assert_eq!(msg.sender_nickname.as_deref(), Some("alice"));
        assert_eq!(msg.group_id.as_deref(), Some("g1"));
        assert!(msg.sent);
    }
}
