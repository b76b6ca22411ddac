//! Connection state machine.

use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a connection.
///
/// ```text
///            connect()            open event
/// Closed ───────────────▶ Connecting ──────────▶ Open
///   ▲  ▲                     │                    │
///   │  └── error + close ────┘                    │ close event
///   │                                             ▼
///   └──── timer (abnormal close only) ◀──────── Closed
///
/// Open ── close() ──▶ Closing ──▶ Closed (no reconnect)
/// ```
///
/// - **Connecting**: a dial is in flight. Further `connect()` calls are
///   ignored until it resolves.
/// - **Open**: frames flow both ways. The only state in which `send` writes.
/// - **Closing**: a deliberate close is being written.
/// - **Closed**: no socket. A reconnect may be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    #[default]
    Closed,
}

impl ConnectionState {
    /// Returns `true` if frames may be written.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns `true` while a socket exists or is being dialed.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Open)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionStatus
// ---------------------------------------------------------------------------

/// A snapshot of the connection, returned by
/// [`ConnectionHandle::status`](crate::ConnectionHandle::status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// URL of the current (or last) connection.
    pub endpoint: String,
    /// Reconnect attempts made since the last successful open.
    pub attempt: u32,
    /// Delay the next scheduled reconnect would wait.
    pub delay: Duration,
    /// Whether a reconnect timer is outstanding.
    pub reconnect_pending: bool,
    /// Whether automatic reconnection is paused.
    pub reconnect_paused: bool,
    /// Whether attachment metadata is waiting for its bytes.
    pub attachment_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_closed() {
        assert_eq!(ConnectionState::default(), ConnectionState::Closed);
    }

    #[test]
    fn test_only_open_is_open() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(!ConnectionState::Closing.is_open());
        assert!(!ConnectionState::Closed.is_open());
    }

    #[test]
    fn test_is_active() {
        assert!(ConnectionState::Connecting.is_active());
        assert!(ConnectionState::Open.is_active());
        assert!(!ConnectionState::Closing.is_active());
        assert!(!ConnectionState::Closed.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "Connecting");
        assert_eq!(ConnectionState::Closed.to_string(), "Closed");
    }
}
