//! Codec trait and implementations for serializing/deserializing values.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The layers above don't care HOW a value is serialized: they just need
//! something that implements the [`Codec`] trait. This is the "strategy
//! pattern": one interface, swappable implementations.
//!
//! Two implementations cover the two wire formats a chat connection speaks:
//!
//! - [`MsgPackCodec`]: compact binary frames (the typed container).
//! - [`JsonCodec`]: human-readable text frames (the fallback envelope).

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → safe to share between threads (the connection actor
///   may run on any thread in Tokio's pool).
/// - `'static` → the codec owns everything it needs, so it can live inside
///   long-running tasks.
///
/// `DeserializeOwned` (vs plain `Deserialize`) means the result doesn't
/// borrow from the input bytes, so the frame buffer can be dropped right
/// after decoding.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns an encode error if the value can't be represented in this
    /// format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns a decode error if the bytes are malformed, incomplete, or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Used for the fallback envelope and for attachment metadata. Anything that
/// can't go out as a binary container goes out through this codec.
///
/// ## Example
///
/// ```rust
/// use wirechat_protocol::{Codec, JsonCodec, JsonEnvelope};
///
/// let envelope = JsonEnvelope {
///     kind: "system".into(),
///     content: "alice joined".into(),
///     ..Default::default()
/// };
///
/// let bytes = JsonCodec.encode(&envelope).unwrap();
/// let decoded: JsonEnvelope = JsonCodec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::JsonEncode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::JsonDecode)
    }
}

// ---------------------------------------------------------------------------
// MsgPackCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses MessagePack (via `rmp-serde`).
///
/// Structs are written as maps keyed by field name (`to_vec_named`), not as
/// positional arrays. That costs a few bytes per frame but lets either side
/// add optional fields without breaking the other, and makes the container's
/// "which variant is set" question answerable from the map's keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl Codec for MsgPackCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        // `?`-style conversion via the `#[from]` impl on `BinaryEncode`.
        Ok(rmp_serde::to_vec_named(value)?)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        Ok(rmp_serde::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{NoticeMessage, WireContainer, WireVariant};

    #[test]
    fn test_msgpack_writes_named_fields() {
        let container = WireContainer::from_variant(WireVariant::System(NoticeMessage {
            content: "hi".into(),
            sender_id: "server".into(),
            timestamp: String::new(),
        }));
        let bytes = MsgPackCodec.encode(&container).unwrap();

        // A fixmap with one entry whose key is the variant's field name.
        assert_eq!(bytes[0], 0x81);
        let key = b"systemMessage";
        assert!(bytes.windows(key.len()).any(|w| w == key));
    }

    #[test]
    fn test_msgpack_decode_garbage_fails() {
        let result: Result<WireContainer, _> = MsgPackCodec.decode(&[0xc1, 0x00, 0xff]);
        assert!(matches!(result, Err(ProtocolError::BinaryDecode(_))));
    }

    #[test]
    fn test_json_decode_garbage_fails() {
        let result: Result<serde_json::Value, _> = JsonCodec.decode(b"{oops");
        assert!(matches!(result, Err(ProtocolError::JsonDecode(_))));
    }
}
