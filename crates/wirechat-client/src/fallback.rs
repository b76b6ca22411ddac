//! Out-of-band delivery for chat messages sent while disconnected.
//!
//! When `send` is called and the socket is not open, a chat message (text,
//! voice, or an image that refers to a URL rather than carrying bytes) gets
//! one delivery attempt over a request/response channel instead of being
//! dropped. This path is best effort:
//!
//! - one attempt per message, no retry;
//! - no acknowledgment or ordering relative to messages that later go out
//!   over the socket;
//! - failures are logged and reported through
//!   [`EventHandler::on_delivery_failure`](crate::EventHandler::on_delivery_failure).

use futures_util::future::BoxFuture;
use wirechat_protocol::JsonEnvelope;

use crate::ClientError;

/// Path the HTTP fallback posts to, relative to the page origin.
pub const SEND_MESSAGE_PATH: &str = "/api/sendMessage";

/// Delivers one message outside the socket.
///
/// Object-safe so the actor can hold an `Arc<dyn FallbackSender>` without
/// another type parameter; the returned future is boxed for the same reason.
pub trait FallbackSender: Send + Sync + 'static {
    fn deliver(&self, envelope: JsonEnvelope) -> BoxFuture<'static, Result<(), ClientError>>;
}

/// Posts the JSON envelope to `<origin>/api/sendMessage`.
#[derive(Debug, Clone)]
pub struct HttpFallback {
    client: reqwest::Client,
    url: String,
}

impl HttpFallback {
    /// A fallback posting to `origin` (e.g. `https://chat.example.com`).
    pub fn new(origin: &str) -> Self {
        Self::with_client(reqwest::Client::new(), origin)
    }

    /// Same as [`new`](Self::new) with a preconfigured client.
    pub fn with_client(client: reqwest::Client, origin: &str) -> Self {
        Self {
            client,
            url: format!("{}{SEND_MESSAGE_PATH}", origin.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl FallbackSender for HttpFallback {
    fn deliver(&self, envelope: JsonEnvelope) -> BoxFuture<'static, Result<(), ClientError>> {
        let client = self.client.clone();
        let url = self.url.clone();

        Box::pin(async move {
            let response = client
                .post(&url)
                .json(&envelope)
                .send()
                .await?
                .error_for_status()?;
            let reply: serde_json::Value = response
                .json()
                .await
                .map_err(|e| ClientError::FallbackReply(e.to_string()))?;
            tracing::info!(%url, %reply, "message delivered over HTTP fallback");
            Ok(())
        })
    }
}
