//! `WirechatClient` builder.
//!
//! This is the entry point for running a chat client. It ties together all
//! the layers: transport → protocol → client.

use std::sync::Arc;

use wirechat_client::{
    ClientConfig, ConnectionHandle, ConnectionManager, ConnectionStatus, EventHandler,
    FallbackSender, HttpFallback, ReconnectConfig,
};
use wirechat_protocol::{LogicalMessage, MessageCodec, SchemaRegistry, SchemaSource};
use wirechat_transport::{Connector, PageLocation, WebSocketConnector};

use crate::WirechatError;

/// Builder for configuring and starting a client.
///
/// # Example
///
/// ```rust,no_run
/// use wirechat::prelude::*;
///
/// # async fn run() -> Result<(), WirechatError> {
/// let (events_tx, mut events) = tokio::sync::mpsc::unbounded_channel();
/// let client = WirechatClient::builder()
///     .page(PageLocation::new(PageScheme::Https, "chat.example.com"))
///     .remote_host("ws.example.com")
///     .start(events_tx)
///     .await?;
///
/// client.send(LogicalMessage::text("hello").in_group("lobby"));
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    config: ClientConfig,
    schema: SchemaSource,
    fallback: Option<Arc<dyn FallbackSender>>,
}

impl ClientBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            schema: SchemaSource::Embedded,
            fallback: None,
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the page the client is served from.
    pub fn page(mut self, page: PageLocation) -> Self {
        self.config.page = page;
        self
    }

    /// Sets the port dialed from loopback pages.
    pub fn local_port(mut self, port: u16) -> Self {
        self.config.local_port = port;
        self
    }

    /// Sets the host dialed from every other page.
    pub fn remote_host(mut self, host: &str) -> Self {
        self.config.remote_host = host.to_string();
        self
    }

    /// Sets the backoff settings.
    pub fn reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Sets where the protocol schema is loaded from.
    pub fn schema(mut self, source: SchemaSource) -> Self {
        self.schema = source;
        self
    }

    /// Enables or disables the HTTP fallback for chat sent while offline.
    pub fn http_fallback(mut self, enabled: bool) -> Self {
        self.config.http_fallback = enabled;
        self
    }

    /// Uses a custom fallback instead of the HTTP one.
    pub fn fallback(mut self, fallback: Arc<dyn FallbackSender>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Loads the schema, starts the connection actor over WebSocket and
    /// installs `handler`.
    pub async fn start(self, handler: impl EventHandler) -> Result<WirechatClient, WirechatError> {
        self.start_with(WebSocketConnector, handler).await
    }

    /// Same as [`start`](Self::start) over any connector.
    ///
    /// A schema that fails to load is not an error: the client runs with
    /// JSON only.
    pub async fn start_with<C: Connector>(
        self,
        connector: C,
        handler: impl EventHandler,
    ) -> Result<WirechatClient, WirechatError> {
        let registry = Arc::new(SchemaRegistry::new());
        if !registry.load(self.schema).await {
            tracing::warn!("binary encoding disabled");
        }
        let codec = MessageCodec::new(Arc::clone(&registry));

        let fallback = match (self.fallback, self.config.http_fallback) {
            (Some(custom), _) => Some(custom),
            (None, true) => {
                let http: Arc<dyn FallbackSender> =
                    Arc::new(HttpFallback::new(&self.config.page.origin()));
                Some(http)
            }
            (None, false) => None,
        };

        let mut manager = ConnectionManager::new(connector, self.config, codec.clone());
        if let Some(fallback) = fallback {
            manager = manager.with_fallback(fallback);
        }
        let handle = manager.spawn();
        handle.init(handler).await?;

        Ok(WirechatClient { handle, codec })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running client.
///
/// Thin wrapper over a [`ConnectionHandle`]; cheap to clone.
#[derive(Debug, Clone)]
pub struct WirechatClient {
    handle: ConnectionHandle,
    codec: MessageCodec,
}

impl WirechatClient {
    /// Creates a new builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Sends a message. See [`ConnectionHandle::send`].
    pub fn send(&self, message: LogicalMessage) {
        self.handle.send(message);
    }

    /// Dials unless already connecting.
    pub fn connect(&self) -> Result<(), WirechatError> {
        Ok(self.handle.connect()?)
    }

    /// Closes deliberately; no reconnect follows.
    pub async fn close(&self) -> Result<(), WirechatError> {
        Ok(self.handle.close().await?)
    }

    pub fn pause_reconnect(&self) -> Result<(), WirechatError> {
        Ok(self.handle.pause_reconnect()?)
    }

    pub fn resume_reconnect(&self) -> Result<(), WirechatError> {
        Ok(self.handle.resume_reconnect()?)
    }

    pub async fn status(&self) -> Result<ConnectionStatus, WirechatError> {
        Ok(self.handle.status().await?)
    }

    /// Closes and stops the connection actor.
    pub fn shutdown(&self) -> Result<(), WirechatError> {
        Ok(self.handle.shutdown()?)
    }

    /// Whether binary encoding is available.
    pub fn binary_enabled(&self) -> bool {
        self.codec.registry().is_available()
    }

    /// The codec this client encodes with.
    pub fn codec(&self) -> &MessageCodec {
        &self.codec
    }

    /// The underlying connection handle.
    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }
}
