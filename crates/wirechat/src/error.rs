//! Unified error type for the wirechat client.

use wirechat_client::ClientError;
use wirechat_protocol::ProtocolError;
use wirechat_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `wirechat` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WirechatError {
    /// A transport-level error (connect, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (schema, encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client-level error (actor gone, fallback delivery).
    #[error(transparent)]
    Client(#[from] ClientError),
}
