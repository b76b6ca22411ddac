//! The JSON fallback envelope.
//!
//! Every message can travel as JSON text. The envelope is deliberately loose
//! on the way in: servers send numeric ids where strings are expected, put
//! `groupId` either inside `data` or at the top level, and omit whatever they
//! don't need. On the way out it only writes the fields that are set.
//!
//! ```json
//! {
//!   "type": "message",
//!   "id": "1717171717171",
//!   "senderId": "42",
//!   "senderNickname": "alice",
//!   "content": "hello",
//!   "messageType": "text",
//!   "timestamp": "2024-06-01T12:00:00.000Z",
//!   "data": { "groupId": "7" }
//! }
//! ```

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    AttachmentMetadata, Codec, GroupMember, JsonCodec, LogicalMessage, MessageKind, Payload,
    ProtocolError,
};

/// `type` of the metadata frame that announces an attachment.
pub const IMAGE_METADATA_TYPE: &str = "imageMetadata";

/// `type` shared by every chat kind; `messageType` tells them apart.
const CHAT_TYPE: &str = "message";

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Nested `data` object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<GroupMember>>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub message_id: Option<String>,
}

impl EnvelopeData {
    fn is_empty(&self) -> bool {
        self.group_id.is_none() && self.members.is_none() && self.message_id.is_none()
    }
}

/// A message as JSON text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonEnvelope {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sender_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_nickname: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "String::is_empty"
    )]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub sent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Accepted on input only; outbound messages use `data.groupId`.
    #[serde(default, deserialize_with = "lenient_string", skip_serializing)]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<EnvelopeData>,
}

impl JsonEnvelope {
    /// Parses JSON text.
    ///
    /// # Errors
    /// [`ProtocolError::JsonDecode`] on malformed text.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        JsonCodec.decode(text.as_bytes())
    }

    /// Serializes to JSON text.
    pub fn to_text(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::JsonEncode)
    }

    /// Group id from `data.groupId`, else the top-level `groupId`.
    pub fn group(&self) -> Option<String> {
        self.data
            .as_ref()
            .and_then(|d| d.group_id.clone())
            .or_else(|| self.group_id.clone())
    }

    /// Returns `true` for an attachment announcement.
    pub fn is_image_metadata(&self) -> bool {
        self.kind == IMAGE_METADATA_TYPE
    }

    /// Builds the envelope for a message.
    pub fn from_logical(msg: &LogicalMessage) -> Self {
        let mut data = EnvelopeData {
            group_id: msg.group_id.clone(),
            ..Default::default()
        };
        let mut envelope = Self {
            kind: envelope_type(msg.kind).to_string(),
            id: msg.id.clone(),
            sender_id: msg.sender_id.clone(),
            sender_nickname: msg.sender_nickname.clone(),
            content: msg.content.clone(),
            message_type: msg.kind.is_chat().then(|| msg.kind.as_str().to_string()),
            timestamp: msg.timestamp.clone(),
            sent: msg.sent,
            ..Default::default()
        };

        match &msg.payload {
            Payload::Voice { duration } => envelope.duration = Some(*duration),
            Payload::Login { avatar } => envelope.avatar = Some(avatar.clone()),
            Payload::Members(members) => data.members = Some(members.clone()),
            Payload::Recall { message_id } => data.message_id = Some(message_id.clone()),
            // The bytes travel in their own frame.
            Payload::Attachment(_) | Payload::None => {}
        }

        if !data.is_empty() {
            envelope.data = Some(data);
        }
        envelope
    }

    /// Converts the envelope into a message.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] when `type` is not a message type this
    /// client understands (attachment metadata included).
    pub fn into_logical(self) -> Result<LogicalMessage, ProtocolError> {
        let kind = match self.kind.as_str() {
            CHAT_TYPE => chat_kind(self.message_type.as_deref()),
            other => envelope_kind(other).ok_or_else(|| ProtocolError::UnknownType(other.into()))?,
        };
        let group_id = self.group();
        let data = self.data.unwrap_or_default();

        let payload = match kind {
            MessageKind::Voice => self
                .duration
                .map_or(Payload::None, |duration| Payload::Voice { duration }),
            MessageKind::LoginSuccess => self
                .avatar
                .map_or(Payload::None, |avatar| Payload::Login { avatar }),
            MessageKind::GroupMembers => Payload::Members(data.members.unwrap_or_default()),
            MessageKind::Recall => Payload::Recall {
                message_id: data.message_id.unwrap_or_default(),
            },
            _ => Payload::None,
        };

        Ok(LogicalMessage {
            id: self.id,
            sender_id: self.sender_id,
            sender_nickname: self.sender_nickname,
            content: self.content,
            kind,
            timestamp: self.timestamp,
            group_id,
            sent: self.sent,
            payload,
        })
    }
}

/// What an inbound text frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A complete message for the UI.
    Message(LogicalMessage),
    /// The first half of an attachment; the bytes follow in a binary frame.
    AttachmentMetadata(AttachmentMetadata),
}

/// Classifies one inbound text frame.
///
/// # Errors
/// Malformed JSON or an unknown `type`.
pub fn parse_inbound(text: &str) -> Result<Inbound, ProtocolError> {
    let envelope = JsonEnvelope::parse(text)?;
    if envelope.is_image_metadata() {
        return Ok(Inbound::AttachmentMetadata(AttachmentMetadata::from_envelope(
            envelope,
        )));
    }
    envelope.into_logical().map(Inbound::Message)
}

// ---------------------------------------------------------------------------
// Type strings
// ---------------------------------------------------------------------------

fn envelope_type(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text | MessageKind::Image | MessageKind::Voice => CHAT_TYPE,
        MessageKind::System => "system",
        MessageKind::Error => "error",
        MessageKind::LoginSuccess => "loginSuccess",
        MessageKind::LoginError => "loginError",
        MessageKind::GroupMembers => "groupMembers",
        MessageKind::Recall => "recallMessage",
        MessageKind::JoinGroup => "joinGroup",
        MessageKind::JoinGroupSuccess => "joinGroupSuccess",
        MessageKind::LeaveGroup => "leaveGroup",
    }
}

fn envelope_kind(kind: &str) -> Option<MessageKind> {
    MessageKind::ALL
        .into_iter()
        .filter(|k| !k.is_chat())
        .find(|k| envelope_type(*k) == kind)
}

fn chat_kind(message_type: Option<&str>) -> MessageKind {
    match message_type {
        Some("image") => MessageKind::Image,
        Some("voice") => MessageKind::Voice,
        _ => MessageKind::Text,
    }
}

/// Accepts a string, a number, or null.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        match Option::<serde_json::Value>::deserialize(deserializer)? {
            Some(serde_json::Value::String(s)) => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        },
    )
}

/// Like `lenient_string`, with null read as the empty string.
pub(crate) fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

/// Accepts a boolean or null (read as `false`).
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_ids_become_strings() {
        let env = JsonEnvelope::parse(
            r#"{"type":"message","id":1717,"senderId":42,"content":"hi","messageType":"text"}"#,
        )
        .unwrap();
        assert_eq!(env.id.as_deref(), Some("1717"));
        assert_eq!(env.sender_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_numeric_and_null_member_fields_are_tolerated() {
        let inbound = parse_inbound(
            r#"{"type":"groupMembers","data":{"groupId":7,"members":[{"userId":42,"nickname":"A","avatar":null}]}}"#,
        )
        .unwrap();
        let Inbound::Message(message) = inbound else {
            panic!("expected a message");
        };
        assert_eq!(message.group_id.as_deref(), Some("7"));
        let Payload::Members(members) = &message.payload else {
            panic!("expected members");
        };
        assert_eq!(
            members,
            &vec![GroupMember {
                user_id: "42".into(),
                nickname: "A".into(),
                avatar: String::new(),
            }]
        );
    }

    #[test]
    fn test_null_content_and_sent_read_as_defaults() {
        let env = JsonEnvelope::parse(r#"{"type":"system","content":null,"sent":null}"#).unwrap();
        assert_eq!(env.content, "");
        assert!(!env.sent);

        let inbound = parse_inbound(r#"{"type":"system","content":null}"#).unwrap();
        let Inbound::Message(message) = inbound else {
            panic!("expected a message");
        };
        assert_eq!(message.kind, MessageKind::System);
        assert_eq!(message.content, "");
    }

    #[test]
    fn test_group_prefers_data_then_top_level() {
        let nested =
            JsonEnvelope::parse(r#"{"type":"message","groupId":"a","data":{"groupId":"b"}}"#)
                .unwrap();
        assert_eq!(nested.group().as_deref(), Some("b"));

        let top = JsonEnvelope::parse(r#"{"type":"message","groupId":9}"#).unwrap();
        assert_eq!(top.group().as_deref(), Some("9"));
    }

    #[test]
    fn test_chat_message_round_trips_through_json() {
        let msg = LogicalMessage::new(MessageKind::Voice, "clip")
            .with_id("m1")
            .from_sender("u1", "alice")
            .in_group("g1")
            .at("2024-01-01T00:00:00.000Z")
            .with_payload(Payload::Voice { duration: 3.5 });

        let text = JsonEnvelope::from_logical(&msg).to_text().unwrap();
        let back = JsonEnvelope::parse(&text).unwrap().into_logical().unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_control_kinds_round_trip_through_json() {
        for kind in [
            MessageKind::JoinGroup,
            MessageKind::JoinGroupSuccess,
            MessageKind::LeaveGroup,
        ] {
            let msg = LogicalMessage::new(kind, "").in_group("g7");
            let text = JsonEnvelope::from_logical(&msg).to_text().unwrap();
            let back = JsonEnvelope::parse(&text).unwrap().into_logical().unwrap();
            assert_eq!(back, msg, "{kind}");
        }
    }

    #[test]
    fn test_outbound_chat_uses_message_type_and_data_group() {
        let msg = LogicalMessage::text("hello").in_group("g1");
        let value: serde_json::Value =
            serde_json::from_str(&JsonEnvelope::from_logical(&msg).to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "message");
        assert_eq!(value["messageType"], "text");
        assert_eq!(value["data"]["groupId"], "g1");
        assert!(value.get("groupId").is_none());
        assert!(value.get("sent").is_none());
    }

    #[test]
    fn test_recall_carries_message_id_in_data() {
        let msg = LogicalMessage::recall("g1", "m9");
        let value: serde_json::Value =
            serde_json::from_str(&JsonEnvelope::from_logical(&msg).to_text().unwrap()).unwrap();
        assert_eq!(value["type"], "recallMessage");
        assert_eq!(value["data"]["messageId"], "m9");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = JsonEnvelope::parse(r#"{"type":"typing"}"#)
            .unwrap()
            .into_logical()
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownType(t) if t == "typing"));
    }

    #[test]
    fn test_unknown_message_type_defaults_to_text() {
        let msg = JsonEnvelope::parse(r#"{"type":"message","messageType":"sticker"}"#)
            .unwrap()
            .into_logical()
            .unwrap();
        assert_eq!(msg.kind, MessageKind::Text);
    }

    #[test]
    fn test_parse_inbound_classifies_metadata() {
        let inbound = parse_inbound(
            r#"{"type":"imageMetadata","id":"a1","senderId":"u1","messageType":"image"}"#,
        )
        .unwrap();
        assert!(matches!(inbound, Inbound::AttachmentMetadata(m) if m.id.as_deref() == Some("a1")));
    }

    #[test]
    fn test_parse_inbound_malformed_fails() {
        assert!(matches!(
            parse_inbound("{not json"),
            Err(ProtocolError::JsonDecode(_))
        ));
    }
}
