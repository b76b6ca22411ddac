//! Error types for the protocol layer.
//!
//! Every codec fault in the taxonomy lands here: schema problems, validation
//! failures, malformed bytes or JSON, and containers with the wrong number of
//! variants. The public `encode`/`decode` entry points swallow these into
//! `None` (after logging); the `try_*` variants surface them for callers that
//! want the reason.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing to JSON failed.
    #[error("JSON encode failed: {0}")]
    JsonEncode(#[source] serde_json::Error),

    /// Parsing JSON failed (malformed text, wrong field types).
    #[error("JSON decode failed: {0}")]
    JsonDecode(#[source] serde_json::Error),

    /// Serializing the binary container failed.
    #[error("binary encode failed: {0}")]
    BinaryEncode(#[from] rmp_serde::encode::Error),

    /// The bytes are not a well-formed binary container.
    #[error("binary decode failed: {0}")]
    BinaryDecode(#[from] rmp_serde::decode::Error),

    /// The schema has not loaded (yet, or ever).
    #[error("protocol schema unavailable")]
    SchemaUnavailable,

    /// The schema has no type with this name.
    #[error("schema type not found: {0}")]
    NotFound(String),

    /// Reading the schema source failed.
    #[error("failed to load schema: {0}")]
    SchemaLoad(String),

    /// The schema document is not a valid JSON Schema.
    #[error("failed to compile schema: {0}")]
    SchemaCompile(String),

    /// A payload does not satisfy its schema type.
    #[error("{type_name} failed validation: {message}")]
    Validation {
        /// The schema type that rejected the payload.
        type_name: String,
        /// The first few validation errors, joined.
        message: String,
    },

    /// A wire container must carry exactly one variant.
    #[error("container must hold exactly one variant, found {0}")]
    VariantCount(usize),

    /// The message kind has no wire variant (JSON only).
    #[error("message kind {0} has no binary variant")]
    NoVariant(crate::MessageKind),

    /// The binary variant cannot carry every field of the message.
    #[error("message does not fit the {0} variant without loss")]
    Lossy(crate::VariantName),

    /// A JSON envelope carried a `type` this client does not know.
    #[error("unknown message type: {0}")]
    UnknownType(String),
}
