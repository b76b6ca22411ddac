//! The binary wire container and its seven variants.
//!
//! A [`WireContainer`] is a tagged union: exactly one of its fields is
//! populated on a well-formed frame. On the wire it is a MessagePack map with
//! a single key (the variant's field name) whose value is the variant struct,
//! itself a map with camelCase keys.
//!
//! ## Mapping to [`LogicalMessage`]
//!
//! Two exhaustive `match`es keep the translation symmetric:
//!
//! - [`WireVariant::from_logical`] builds a variant from a message,
//! - [`WireVariant::into_logical`] maps it back.
//!
//! Adding a variant without handling it in both directions is a compile
//! error, not a runtime surprise. Optional string fields travel as empty
//! strings (the wire types have no "absent" state) and come back as `None`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{GroupMember, LogicalMessage, MessageKind, Payload, ProtocolError};

// ---------------------------------------------------------------------------
// Content kind table
// ---------------------------------------------------------------------------

/// Numeric `messageType` codes of the chat variant.
///
/// The single source for both directions: [`content_code`] reads it left to
/// right, [`content_kind`] right to left.
pub const CONTENT_KINDS: [(MessageKind, i32); 3] = [
    (MessageKind::Text, 0),
    (MessageKind::Image, 1),
    (MessageKind::Voice, 2),
];

/// Wire code for a chat kind. Anything not in the table encodes as text.
pub fn content_code(kind: MessageKind) -> i32 {
    CONTENT_KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map_or(0, |(_, code)| *code)
}

/// Chat kind for a wire code. Unknown codes decode as text.
pub fn content_kind(code: i32) -> MessageKind {
    CONTENT_KINDS
        .iter()
        .find(|(_, c)| *c == code)
        .map_or(MessageKind::Text, |(kind, _)| *kind)
}

// ---------------------------------------------------------------------------
// Variant structs
// ---------------------------------------------------------------------------

/// `chatMessage`: text, image and voice content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_nickname: String,
    pub content: String,
    pub message_type: i32,
    pub timestamp: String,
    pub sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

/// `systemMessage`, `errorMessage` and `loginError` share this shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoticeMessage {
    pub content: String,
    pub sender_id: String,
    pub timestamp: String,
}

/// `loginSuccess`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginSuccess {
    pub content: String,
    pub sender_id: String,
    pub timestamp: String,
    pub avatar: String,
}

/// `groupMembers`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupMembers {
    pub group_id: String,
    pub members: Vec<GroupMember>,
}

/// `recallMessage`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecallMessage {
    pub message_id: String,
    pub group_id: String,
    pub sender_id: String,
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// VariantName
// ---------------------------------------------------------------------------

/// Names one arm of the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantName {
    ChatMessage,
    SystemMessage,
    ErrorMessage,
    LoginSuccess,
    LoginError,
    GroupMembers,
    RecallMessage,
}

impl VariantName {
    /// Every variant, in container field order.
    pub const ALL: [Self; 7] = [
        Self::ChatMessage,
        Self::SystemMessage,
        Self::ErrorMessage,
        Self::LoginSuccess,
        Self::LoginError,
        Self::GroupMembers,
        Self::RecallMessage,
    ];

    /// The container field that holds this variant.
    pub fn field(self) -> &'static str {
        match self {
            Self::ChatMessage => "chatMessage",
            Self::SystemMessage => "systemMessage",
            Self::ErrorMessage => "errorMessage",
            Self::LoginSuccess => "loginSuccess",
            Self::LoginError => "loginError",
            Self::GroupMembers => "groupMembers",
            Self::RecallMessage => "recallMessage",
        }
    }

    /// The schema type that describes this variant.
    pub fn type_name(self) -> &'static str {
        match self {
            Self::ChatMessage => "ChatMessage",
            Self::SystemMessage => "SystemMessage",
            Self::ErrorMessage => "ErrorMessage",
            Self::LoginSuccess => "LoginSuccess",
            Self::LoginError => "LoginError",
            Self::GroupMembers => "GroupMembers",
            Self::RecallMessage => "RecallMessage",
        }
    }
}

impl fmt::Display for VariantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

impl MessageKind {
    /// The container variant that carries this kind, or `None` for the
    /// control kinds that only travel as JSON.
    pub fn variant(self) -> Option<VariantName> {
        match self {
            Self::Text | Self::Image | Self::Voice => Some(VariantName::ChatMessage),
            Self::System => Some(VariantName::SystemMessage),
            Self::Error => Some(VariantName::ErrorMessage),
            Self::LoginSuccess => Some(VariantName::LoginSuccess),
            Self::LoginError => Some(VariantName::LoginError),
            Self::GroupMembers => Some(VariantName::GroupMembers),
            Self::Recall => Some(VariantName::RecallMessage),
            Self::JoinGroup | Self::JoinGroupSuccess | Self::LeaveGroup => None,
        }
    }
}

// ---------------------------------------------------------------------------
// WireVariant
// ---------------------------------------------------------------------------

/// One populated arm of the container, by value.
#[derive(Debug, Clone, PartialEq)]
pub enum WireVariant {
    Chat(ChatMessage),
    System(NoticeMessage),
    Error(NoticeMessage),
    LoginSuccess(LoginSuccess),
    LoginError(NoticeMessage),
    GroupMembers(GroupMembers),
    Recall(RecallMessage),
}

impl WireVariant {
    /// Which arm this is.
    pub fn name(&self) -> VariantName {
        match self {
            Self::Chat(_) => VariantName::ChatMessage,
            Self::System(_) => VariantName::SystemMessage,
            Self::Error(_) => VariantName::ErrorMessage,
            Self::LoginSuccess(_) => VariantName::LoginSuccess,
            Self::LoginError(_) => VariantName::LoginError,
            Self::GroupMembers(_) => VariantName::GroupMembers,
            Self::Recall(_) => VariantName::RecallMessage,
        }
    }

    /// Builds the `name` variant from a message.
    ///
    /// Fields the variant has no room for are dropped here; callers that care
    /// compare [`into_logical`](Self::into_logical) of the result with the
    /// input to detect the loss.
    pub fn from_logical(name: VariantName, msg: &LogicalMessage) -> Self {
        let text = |field: &Option<String>| field.clone().unwrap_or_default();

        match name {
            VariantName::ChatMessage => Self::Chat(ChatMessage {
                id: text(&msg.id),
                sender_id: text(&msg.sender_id),
                sender_nickname: text(&msg.sender_nickname),
                content: msg.content.clone(),
                message_type: content_code(msg.kind),
                timestamp: text(&msg.timestamp),
                sent: msg.sent,
                group_id: msg.group_id.clone(),
            }),
            VariantName::SystemMessage => Self::System(notice(msg)),
            VariantName::ErrorMessage => Self::Error(notice(msg)),
            VariantName::LoginError => Self::LoginError(notice(msg)),
            VariantName::LoginSuccess => Self::LoginSuccess(LoginSuccess {
                content: msg.content.clone(),
                sender_id: text(&msg.sender_id),
                timestamp: text(&msg.timestamp),
                avatar: match &msg.payload {
                    Payload::Login { avatar } => avatar.clone(),
                    _ => String::new(),
                },
            }),
            VariantName::GroupMembers => Self::GroupMembers(GroupMembers {
                group_id: text(&msg.group_id),
                members: match &msg.payload {
                    Payload::Members(members) => members.clone(),
                    _ => Vec::new(),
                },
            }),
            VariantName::RecallMessage => Self::Recall(RecallMessage {
                message_id: match &msg.payload {
                    Payload::Recall { message_id } => message_id.clone(),
                    _ => String::new(),
                },
                group_id: text(&msg.group_id),
                sender_id: text(&msg.sender_id),
                timestamp: text(&msg.timestamp),
            }),
        }
    }

    /// Maps the variant back to a message.
    pub fn into_logical(self) -> LogicalMessage {
        match self {
            Self::Chat(c) => LogicalMessage {
                id: non_empty(c.id),
                sender_id: non_empty(c.sender_id),
                sender_nickname: non_empty(c.sender_nickname),
                content: c.content,
                kind: content_kind(c.message_type),
                timestamp: non_empty(c.timestamp),
                group_id: c.group_id,
                sent: c.sent,
                payload: Payload::None,
            },
            Self::System(n) => from_notice(MessageKind::System, n),
            Self::Error(n) => from_notice(MessageKind::Error, n),
            Self::LoginError(n) => from_notice(MessageKind::LoginError, n),
            Self::LoginSuccess(l) => LogicalMessage {
                sender_id: non_empty(l.sender_id),
                timestamp: non_empty(l.timestamp),
                payload: if l.avatar.is_empty() {
                    Payload::None
                } else {
                    Payload::Login { avatar: l.avatar }
                },
                ..LogicalMessage::new(MessageKind::LoginSuccess, l.content)
            },
            Self::GroupMembers(g) => LogicalMessage {
                group_id: non_empty(g.group_id),
                payload: Payload::Members(g.members),
                ..LogicalMessage::new(MessageKind::GroupMembers, "")
            },
            Self::Recall(r) => LogicalMessage {
                sender_id: non_empty(r.sender_id),
                timestamp: non_empty(r.timestamp),
                group_id: non_empty(r.group_id),
                payload: Payload::Recall {
                    message_id: r.message_id,
                },
                ..LogicalMessage::new(MessageKind::Recall, "")
            },
        }
    }
}

fn notice(msg: &LogicalMessage) -> NoticeMessage {
    NoticeMessage {
        content: msg.content.clone(),
        sender_id: msg.sender_id.clone().unwrap_or_default(),
        timestamp: msg.timestamp.clone().unwrap_or_default(),
    }
}

fn from_notice(kind: MessageKind, n: NoticeMessage) -> LogicalMessage {
    LogicalMessage {
        sender_id: non_empty(n.sender_id),
        timestamp: non_empty(n.timestamp),
        ..LogicalMessage::new(kind, n.content)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// ---------------------------------------------------------------------------
// WireContainer
// ---------------------------------------------------------------------------

/// The top-level binary frame.
///
/// Every field is optional so that malformed containers (zero or several
/// variants) still deserialize and can be rejected with a precise error
/// instead of an opaque decode failure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireContainer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_message: Option<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<NoticeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<NoticeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_success: Option<LoginSuccess>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_error: Option<NoticeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_members: Option<GroupMembers>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_message: Option<RecallMessage>,
}

impl WireContainer {
    /// A container holding exactly `variant`.
    pub fn from_variant(variant: WireVariant) -> Self {
        let mut container = Self::default();
        match variant {
            WireVariant::Chat(v) => container.chat_message = Some(v),
            WireVariant::System(v) => container.system_message = Some(v),
            WireVariant::Error(v) => container.error_message = Some(v),
            WireVariant::LoginSuccess(v) => container.login_success = Some(v),
            WireVariant::LoginError(v) => container.login_error = Some(v),
            WireVariant::GroupMembers(v) => container.group_members = Some(v),
            WireVariant::Recall(v) => container.recall_message = Some(v),
        }
        container
    }

    /// Number of populated variants. Exactly one on a well-formed frame.
    pub fn populated(&self) -> usize {
        [
            self.chat_message.is_some(),
            self.system_message.is_some(),
            self.error_message.is_some(),
            self.login_success.is_some(),
            self.login_error.is_some(),
            self.group_members.is_some(),
            self.recall_message.is_some(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }

    /// Takes the single populated variant.
    ///
    /// # Errors
    /// [`ProtocolError::VariantCount`] unless exactly one field is set.
    pub fn into_variant(self) -> Result<WireVariant, ProtocolError> {
        let count = self.populated();
        if count != 1 {
            return Err(ProtocolError::VariantCount(count));
        }

        let variant = self
            .chat_message
            .map(WireVariant::Chat)
            .or(self.system_message.map(WireVariant::System))
            .or(self.error_message.map(WireVariant::Error))
            .or(self.login_success.map(WireVariant::LoginSuccess))
            .or(self.login_error.map(WireVariant::LoginError))
            .or(self.group_members.map(WireVariant::GroupMembers))
            .or(self.recall_message.map(WireVariant::Recall));

        variant.ok_or(ProtocolError::VariantCount(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_table_round_trips_every_chat_kind() {
        for (kind, code) in CONTENT_KINDS {
            assert_eq!(content_code(kind), code);
            assert_eq!(content_kind(code), kind);
        }
    }

    #[test]
    fn test_unknown_content_code_decodes_as_text() {
        assert_eq!(content_kind(7), MessageKind::Text);
        assert_eq!(content_kind(-1), MessageKind::Text);
    }

    #[test]
    fn test_non_chat_kind_encodes_as_text_code() {
        assert_eq!(content_code(MessageKind::System), 0);
    }

    #[test]
    fn test_every_variant_is_reachable_from_some_kind() {
        for name in VariantName::ALL {
            assert!(
                MessageKind::ALL.iter().any(|k| k.variant() == Some(name)),
                "{name} has no kind"
            );
        }
    }

    #[test]
    fn test_control_kinds_have_no_variant() {
        assert_eq!(MessageKind::JoinGroup.variant(), None);
        assert_eq!(MessageKind::JoinGroupSuccess.variant(), None);
        assert_eq!(MessageKind::LeaveGroup.variant(), None);
    }

    #[test]
    fn test_from_variant_populates_exactly_one_field() {
        for name in VariantName::ALL {
            let msg = LogicalMessage::text("x");
            let container = WireContainer::from_variant(WireVariant::from_logical(name, &msg));
            assert_eq!(container.populated(), 1, "{name}");
            assert_eq!(container.into_variant().unwrap().name(), name);
        }
    }

    #[test]
    fn test_into_variant_empty_container_fails() {
        let err = WireContainer::default().into_variant().unwrap_err();
        assert!(matches!(err, ProtocolError::VariantCount(0)));
    }

    #[test]
    fn test_into_variant_two_fields_fails() {
        let container = WireContainer {
            chat_message: Some(ChatMessage::default()),
            system_message: Some(NoticeMessage::default()),
            ..Default::default()
        };
        let err = container.into_variant().unwrap_err();
        assert!(matches!(err, ProtocolError::VariantCount(2)));
    }

    #[test]
    fn test_chat_variant_maps_empty_strings_to_none() {
        let msg = WireVariant::Chat(ChatMessage {
            content: "hi".into(),
            message_type: 2,
            ..Default::default()
        })
        .into_logical();
        assert_eq!(msg.kind, MessageKind::Voice);
        assert_eq!(msg.id, None);
        assert_eq!(msg.sender_nickname, None);
    }

    #[test]
    fn test_container_serializes_single_key() {
        let container = WireContainer::from_variant(WireVariant::System(NoticeMessage {
            content: "joined".into(),
            sender_id: "server".into(),
            timestamp: "t".into(),
        }));
        let value = serde_json::to_value(&container).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["systemMessage"]["senderId"], "server");
    }
}
