//! The callback contract between the connection and the UI.
//!
//! The connection actor calls an [`EventHandler`] from its own task, one
//! call at a time and in the order events happened. Handlers must not block:
//! while a callback runs, no frame is read and no command is processed.
//!
//! Two ways to consume events:
//!
//! - implement [`EventHandler`] directly, or
//! - pass an `mpsc::UnboundedSender<ClientEvent>` and read [`ClientEvent`]s
//!   from the other end.

use tokio::sync::mpsc;
use wirechat_protocol::LogicalMessage;
use wirechat_transport::CloseFrame;

use crate::ClientError;

/// Receives connection events.
pub trait EventHandler: Send + 'static {
    /// The connection opened. Called exactly once per successful open.
    fn on_connect(&mut self);

    /// A complete message arrived.
    fn on_message(&mut self, message: LogicalMessage);

    /// The connection closed, deliberately or not.
    fn on_close(&mut self, close: CloseFrame);

    /// A message sent through the out-of-band fallback was not delivered.
    fn on_delivery_failure(&mut self, message: LogicalMessage, error: &ClientError) {
        let _ = (message, error);
    }
}

/// One connection event, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Message(LogicalMessage),
    Closed(CloseFrame),
    DeliveryFailed {
        message: LogicalMessage,
        error: String,
    },
}

impl EventHandler for mpsc::UnboundedSender<ClientEvent> {
    fn on_connect(&mut self) {
        let _ = self.send(ClientEvent::Connected);
    }

    fn on_message(&mut self, message: LogicalMessage) {
        let _ = self.send(ClientEvent::Message(message));
    }

    fn on_close(&mut self, close: CloseFrame) {
        let _ = self.send(ClientEvent::Closed(close));
    }

    fn on_delivery_failure(&mut self, message: LogicalMessage, error: &ClientError) {
        let _ = self.send(ClientEvent::DeliveryFailed {
            message,
            error: error.to_string(),
        });
    }
}
