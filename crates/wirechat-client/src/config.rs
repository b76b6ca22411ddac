//! Client configuration.

use wirechat_transport::{DEFAULT_LOCAL_PORT, Endpoint, PageLocation};

use crate::ReconnectConfig;

/// Configuration for one connection.
///
/// The endpoint is derived, not configured: see [`ClientConfig::endpoint`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The page the client is served from.
    pub page: PageLocation,

    /// Port dialed when the page is on a loopback host.
    pub local_port: u16,

    /// Host dialed when the page is not on a loopback host.
    pub remote_host: String,

    /// Backoff settings.
    pub reconnect: ReconnectConfig,

    /// Whether chat messages sent while disconnected go out over HTTP.
    pub http_fallback: bool,
}

impl ClientConfig {
    /// The socket URL for this configuration.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::select(&self.page, self.local_port, &self.remote_host)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            page: PageLocation::default(),
            local_port: DEFAULT_LOCAL_PORT,
            remote_host: "localhost".to_string(),
            reconnect: ReconnectConfig::default(),
            http_fallback: true,
        }
    }
}
