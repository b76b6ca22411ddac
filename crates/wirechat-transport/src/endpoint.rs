//! Endpoint selection: which URL the client dials.
//!
//! A chat client served from a developer machine talks to a server on a fixed
//! local port over plain `ws://`. Served from anywhere else, it talks to a
//! configured remote host (typically behind a tunnel or reverse proxy, so no
//! explicit port), and mirrors the page's own scheme: an `https` page must use
//! `wss`, an `http` page uses `ws`.
//!
//! ```text
//! page host            page scheme   endpoint
//! ─────────────────    ───────────   ─────────────────────────
//! localhost / 127.*    any           ws://localhost:<port>
//! chat.example.com     https         wss://<remote_host>
//! chat.example.com     http          ws://<remote_host>
//! ```

use std::fmt;

/// Port used when the page is served from a loopback host.
pub const DEFAULT_LOCAL_PORT: u16 = 9667;

/// Hosts treated as "local development".
const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

/// Scheme of the page that embeds the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageScheme {
    /// Plain HTTP.
    #[default]
    Http,
    /// HTTP over TLS.
    Https,
}

impl PageScheme {
    fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

/// Where the client "lives": the scheme, host and optional port of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    /// Page scheme, mirrored into the socket scheme for remote hosts.
    pub scheme: PageScheme,
    /// Page host name.
    pub host: String,
    /// Page port, if not the scheme default.
    pub port: Option<u16>,
}

impl PageLocation {
    /// Builds a location from its parts.
    pub fn new(scheme: PageScheme, host: impl Into<String>) -> Self {
        Self {
            scheme,
            host: host.into(),
            port: None,
        }
    }

    /// Returns `true` when the host is one of the loopback names.
    pub fn is_loopback(&self) -> bool {
        LOOPBACK_HOSTS.contains(&self.host.as_str())
    }

    /// The page origin, e.g. `https://chat.example.com`.
    pub fn origin(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{port}", self.scheme.as_str(), self.host),
            None => format!("{}://{}", self.scheme.as_str(), self.host),
        }
    }
}

impl Default for PageLocation {
    fn default() -> Self {
        Self::new(PageScheme::Http, "localhost")
    }
}

/// A resolved socket endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
}

impl Endpoint {
    /// Picks the endpoint for a page location.
    ///
    /// Deterministic: the same inputs always produce the same URL.
    pub fn select(page: &PageLocation, local_port: u16, remote_host: &str) -> Self {
        let url = if page.is_loopback() {
            format!("ws://localhost:{local_port}")
        } else {
            let scheme = match page.scheme {
                PageScheme::Https => "wss",
                PageScheme::Http => "ws",
            };
            format!("{scheme}://{remote_host}")
        };
        Self { url }
    }

    /// The URL to dial.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns `true` for `wss://` endpoints.
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_loopback_uses_local_port_and_plain_scheme() {
        for host in ["localhost", "127.0.0.1", "0.0.0.0"] {
            let page = PageLocation::new(PageScheme::Https, host);
            let endpoint = Endpoint::select(&page, 9667, "chat.example.com");
            assert_eq!(endpoint.url(), "ws://localhost:9667");
            assert!(!endpoint.is_secure());
        }
    }

    #[test]
    fn test_select_remote_https_uses_wss_without_port() {
        let page = PageLocation::new(PageScheme::Https, "app.example.com");
        let endpoint = Endpoint::select(&page, 9667, "chat.example.com");
        assert_eq!(endpoint.url(), "wss://chat.example.com");
        assert!(endpoint.is_secure());
    }

    #[test]
    fn test_select_remote_http_uses_ws() {
        let page = PageLocation::new(PageScheme::Http, "app.example.com");
        let endpoint = Endpoint::select(&page, 9667, "chat.example.com");
        assert_eq!(endpoint.to_string(), "ws://chat.example.com");
    }

    #[test]
    fn test_origin_includes_port_only_when_set() {
        let mut page = PageLocation::new(PageScheme::Https, "app.example.com");
        assert_eq!(page.origin(), "https://app.example.com");
        page.port = Some(8443);
        assert_eq!(page.origin(), "https://app.example.com:8443");
    }

    #[test]
    fn test_default_location_is_loopback() {
        assert!(PageLocation::default().is_loopback());
    }
}
