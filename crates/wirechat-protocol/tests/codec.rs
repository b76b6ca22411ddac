//! Integration tests for the message codec, schema loading and attachment
//! framing working together.

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use wirechat_protocol::schema::EMBEDDED_SCHEMA;
use wirechat_protocol::wire::{ChatMessage, NoticeMessage};
use wirechat_protocol::{
    AttachmentFramer, GroupMember, Inbound, LogicalMessage, MessageCodec, MessageKind, Payload,
    ProtocolError, SchemaRegistry, SchemaSource, WireContainer,
};
use wirechat_transport::Frame;

// =========================================================================
// Helpers
// =========================================================================

fn codec() -> MessageCodec {
    MessageCodec::new(Arc::new(SchemaRegistry::embedded()))
}

/// One fully specified message per kind the container can carry.
///
/// Images are left out: an inbound image is only ever built from an
/// attachment frame pair, never from a container.
fn binary_kinds() -> Vec<LogicalMessage> {
    let ts = "2024-06-01T12:00:00.000Z";
    vec![
        LogicalMessage::text("hello")
            .with_id("m1")
            .from_sender("u1", "alice")
            .in_group("g1")
            .at(ts)
            .mine(true),
        LogicalMessage::new(MessageKind::Voice, "blob:voice")
            .with_id("m2")
            .from_sender("u2", "bob")
            .at(ts),
        LogicalMessage {
            sender_id: Some("server".into()),
            ..LogicalMessage::new(MessageKind::System, "alice joined").at(ts)
        },
        LogicalMessage {
            sender_id: Some("server".into()),
            ..LogicalMessage::new(MessageKind::Error, "rate limited").at(ts)
        },
        LogicalMessage {
            sender_id: Some("u1".into()),
            ..LogicalMessage::new(MessageKind::LoginSuccess, "welcome")
                .at(ts)
                .with_payload(Payload::Login {
                    avatar: "https://cdn.example/a.png".into(),
                })
        },
        LogicalMessage {
            sender_id: Some("server".into()),
            ..LogicalMessage::new(MessageKind::LoginError, "bad nickname").at(ts)
        },
        LogicalMessage::new(MessageKind::GroupMembers, "")
            .in_group("g1")
            .with_payload(Payload::Members(vec![
                GroupMember {
                    user_id: "u1".into(),
                    nickname: "alice".into(),
                    avatar: String::new(),
                },
                GroupMember {
                    user_id: "u2".into(),
                    nickname: "bob".into(),
                    avatar: "https://cdn.example/b.png".into(),
                },
            ])),
        LogicalMessage {
            sender_id: Some("u1".into()),
            ..LogicalMessage::recall("g1", "m1").at(ts)
        },
    ]
}

/// The embedded schema with `ChatMessage.content` capped at five characters.
fn schema_with_short_content() -> String {
    let mut doc: serde_json::Value = serde_json::from_str(EMBEDDED_SCHEMA).unwrap();
    doc["$defs"]["ChatMessage"]["properties"]["content"]["maxLength"] = 5.into();
    doc.to_string()
}

fn schema_with_closed_chat() -> String {
    let mut doc: serde_json::Value = serde_json::from_str(EMBEDDED_SCHEMA).unwrap();
    doc["$defs"]["ChatMessage"]["additionalProperties"] = false.into();
    doc.to_string()
}

// =========================================================================
// Round trips
// =========================================================================

#[test]
fn test_binary_round_trip_every_non_image_kind() {
    let codec = codec();
    for msg in binary_kinds() {
        let bytes = codec
            .encode(&msg)
            .unwrap_or_else(|| panic!("{} should encode", msg.kind));
        assert_eq!(codec.decode(&bytes).as_ref(), Some(&msg), "{}", msg.kind);
    }
}

#[test]
fn test_json_and_binary_decode_to_same_message() {
    let codec = codec();
    for msg in binary_kinds() {
        let from_binary = codec.decode(&codec.encode(&msg).unwrap()).unwrap();
        let text = codec.encode_json(&msg).unwrap();
        let Inbound::Message(from_json) = codec.parse_text(&text).unwrap() else {
            panic!("{} should parse as a message", msg.kind);
        };
        assert_eq!(from_binary, from_json, "{}", msg.kind);
    }
}

// =========================================================================
// Malformed input
// =========================================================================

#[test]
fn test_decode_malformed_bytes_is_none() {
    let codec = codec();
    let inputs: [&[u8]; 6] = [
        &[],
        &[0xc1],
        &[0xff, 0xff, 0xff],
        b"{\"chatMessage\":{}}",
        // A msgpack string, not a map.
        &[0xa3, b'a', b'b', b'c'],
        // A map whose only key is unknown.
        &[0x81, 0xa1, b'x', 0x01],
    ];
    for input in inputs {
        assert!(codec.decode(input).is_none(), "{input:?}");
    }
}

#[test]
fn test_decode_wrong_field_type_is_none() {
    // {"chatMessage": {"messageType": "zero"}}
    let bytes = rmp_serde::to_vec_named(&serde_json::json!({
        "chatMessage": { "messageType": "zero" }
    }))
    .unwrap();
    assert!(codec().decode(&bytes).is_none());
}

#[test]
fn test_two_variants_rejected_on_encode_and_decode() {
    let codec = codec();
    let container = WireContainer {
        chat_message: Some(ChatMessage {
            content: "hi".into(),
            ..Default::default()
        }),
        system_message: Some(NoticeMessage {
            content: "hi".into(),
            ..Default::default()
        }),
        ..Default::default()
    };

    let err = codec.encode_container(&container).unwrap_err();
    assert!(matches!(err, ProtocolError::Validation { .. }), "{err}");

    let raw = rmp_serde::to_vec_named(&container).unwrap();
    assert!(codec.decode(&raw).is_none());
    assert!(matches!(
        codec.try_decode(&raw),
        Err(ProtocolError::Validation { .. })
    ));
}

#[test]
fn test_unknown_key_beside_known_variant_rejected() {
    let codec = codec();
    let raw = rmp_serde::to_vec_named(&serde_json::json!({
        "chatMessage": { "content": "hi" },
        "stickerMessage": { "url": "x" }
    }))
    .unwrap();

    assert!(codec.decode(&raw).is_none());
    assert!(matches!(
        codec.try_decode(&raw),
        Err(ProtocolError::Validation { .. })
    ));
}

#[test]
fn test_unknown_key_inside_variant_is_validated_as_sent() {
    let registry = SchemaRegistry::loaded_from(&schema_with_closed_chat());
    let codec = MessageCodec::new(Arc::new(registry));
    let raw = rmp_serde::to_vec_named(&serde_json::json!({
        "chatMessage": { "content": "hi", "reaction": "+1" }
    }))
    .unwrap();

    assert!(matches!(
        codec.try_decode(&raw),
        Err(ProtocolError::Validation { .. })
    ));
}

#[test]
fn test_empty_container_rejected() {
    let codec = codec();
    assert!(codec.encode_container(&WireContainer::default()).is_err());
    let raw = rmp_serde::to_vec_named(&WireContainer::default()).unwrap();
    assert!(codec.decode(&raw).is_none());
}

// =========================================================================
// Fallback decision
// =========================================================================

#[test]
fn test_validation_failure_falls_back_to_json() {
    let registry = SchemaRegistry::loaded_from(&schema_with_short_content());
    assert!(registry.is_available());
    let codec = MessageCodec::new(Arc::new(registry));

    let short = LogicalMessage::text("hi");
    assert!(matches!(codec.encode_frame(&short).unwrap(), Frame::Binary(_)));

    let long = LogicalMessage::text("this is far too long");
    assert!(matches!(
        codec.try_encode(&long),
        Err(ProtocolError::Validation { .. })
    ));
    let Frame::Text(text) = codec.encode_frame(&long).unwrap() else {
        panic!("expected JSON fallback");
    };
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(value["content"], "this is far too long");
}

#[test]
fn test_unavailable_registry_decodes_nothing() {
    let offline = MessageCodec::new(Arc::new(SchemaRegistry::new()));
    let bytes = codec().encode(&LogicalMessage::text("hi")).unwrap();
    assert!(offline.decode(&bytes).is_none());
}

// =========================================================================
// Schema loading
// =========================================================================

#[tokio::test]
async fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(EMBEDDED_SCHEMA.as_bytes()).unwrap();

    let registry = SchemaRegistry::new();
    assert!(registry.load(SchemaSource::File(file.path().to_path_buf())).await);
    assert!(registry.lookup("messageApp.RecallMessage").is_ok());
}

#[tokio::test]
async fn test_load_missing_file_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = SchemaRegistry::new();

    assert!(!registry.load(SchemaSource::File(dir.path().join("missing.json"))).await);
    assert!(registry.is_loaded());
    assert!(!registry.is_available());
    assert!(matches!(
        registry.lookup("ChatMessage"),
        Err(ProtocolError::NotFound(_))
    ));

    // The codec keeps working, in JSON.
    let codec = MessageCodec::new(Arc::new(registry));
    assert!(matches!(
        codec.encode_frame(&LogicalMessage::text("hi")).unwrap(),
        Frame::Text(_)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_share_one_outcome() {
    let registry = Arc::new(SchemaRegistry::new());

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                // Only one of these sources is ever read.
                let source = if i % 2 == 0 {
                    SchemaSource::Embedded
                } else {
                    SchemaSource::Inline(EMBEDDED_SCHEMA.to_string())
                };
                registry.load(source).await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap());
    }

    // A later load with a broken source doesn't undo the first.
    assert!(registry.load(SchemaSource::Inline("{".into())).await);
    assert!(registry.is_available());
}

// =========================================================================
// Attachments
// =========================================================================

#[test]
fn test_outbound_attachment_pair_reassembles_on_receive() {
    let codec = codec();
    let sender = AttachmentFramer::new();
    let mut receiver = AttachmentFramer::new();

    let msg = LogicalMessage::image(vec![0xff, 0xd8, 0xff])
        .with_id("img7")
        .from_sender("u1", "alice")
        .in_group("g1");
    let bytes = msg.attachment().unwrap().bytes.clone();
    let (meta_frame, binary_frame) = sender.start_outbound(&msg, bytes).unwrap();

    let Frame::Text(text) = meta_frame else { panic!() };
    let Inbound::AttachmentMetadata(meta) = codec.parse_text(&text).unwrap() else {
        panic!("metadata frame should classify as metadata");
    };
    assert!(receiver.receive_metadata(meta).is_none());

    let Frame::Binary(payload) = binary_frame else { panic!() };
    let image = receiver.receive_binary(payload).unwrap();

    assert_eq!(image.kind, MessageKind::Image);
    assert_eq!(image.id.as_deref(), Some("img7"));
    assert_eq!(image.sender_nickname.as_deref(), Some("alice"));
    assert_eq!(image.group_id.as_deref(), Some("g1"));
    assert!(!image.sent);
    assert_eq!(
        image.attachment().unwrap().bytes,
        Bytes::from_static(&[0xff, 0xd8, 0xff])
    );
    assert!(!receiver.is_pending());
}
