//! Error types for the client layer.
//!
//! None of these ever reach the caller of [`send`](crate::ConnectionHandle::send):
//! transport faults drive reconnection, codec faults drop or reroute the
//! message, and both are only logged. Errors here surface from the handle's
//! control methods (when the actor is gone) and through
//! [`EventHandler::on_delivery_failure`](crate::EventHandler::on_delivery_failure).

/// Errors that can occur in the client layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection actor has stopped (after `shutdown`, or because every
    /// handle was dropped).
    #[error("connection manager is not running")]
    Unavailable,

    /// The out-of-band HTTP delivery failed.
    #[error("fallback delivery failed: {0}")]
    Fallback(#[from] reqwest::Error),

    /// The fallback endpoint answered with something other than JSON.
    #[error("fallback endpoint returned an invalid reply: {0}")]
    FallbackReply(String),
}
