//! WebSocket connector implementation using `tokio-tungstenite`.

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::protocol::CloseFrame as WsCloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::{CloseFrame, Connector, Frame, FrameSink, FrameSource, TransportError};

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// A [`Connector`] that dials `ws://` (and, with the `tls` feature, `wss://`)
/// endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Sink = WebSocketSink;
    type Source = WebSocketSource;

    async fn connect(&self, url: &str) -> Result<(Self::Sink, Self::Source), TransportError> {
        let (ws, response) = tokio_tungstenite::connect_async(url).await.map_err(|e| {
            TransportError::ConnectFailed {
                url: url.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e),
            }
        })?;
        tracing::debug!(url, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = ws.split();
        Ok((WebSocketSink { inner: sink }, WebSocketSource { inner: stream }))
    }
}

/// Write half of a WebSocket connection.
pub struct WebSocketSink {
    inner: SplitSink<WsStream, Message>,
}

impl FrameSink for WebSocketSink {
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes),
            Frame::Close(close) => Message::Close(close.map(to_ws_close)),
        };
        self.inner.send(msg).await.map_err(send_error)
    }

    async fn close(&mut self, frame: CloseFrame) -> Result<(), TransportError> {
        self.inner
            .send(Message::Close(Some(to_ws_close(frame))))
            .await
            .map_err(send_error)
    }
}

/// Read half of a WebSocket connection.
pub struct WebSocketSource {
    inner: SplitStream<WsStream>,
}

impl FrameSource for WebSocketSource {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(Ok(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Some(Ok(Frame::Binary(Bytes::from(data))));
                }
                Some(Ok(Message::Close(close))) => {
                    return Some(Ok(Frame::Close(close.map(from_ws_close))));
                }
                Some(Ok(_)) => continue, // skip ping/pong/raw frames
                Some(Err(e)) => {
                    return Some(Err(TransportError::ReceiveFailed(std::io::Error::new(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    ))));
                }
                None => return None,
            }
        }
    }
}

fn send_error(e: WsError) -> TransportError {
    match e {
        WsError::ConnectionClosed | WsError::AlreadyClosed => {
            TransportError::ConnectionClosed(e.to_string())
        }
        other => TransportError::SendFailed(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            other,
        )),
    }
}

fn to_ws_close(frame: CloseFrame) -> WsCloseFrame {
    WsCloseFrame {
        code: CloseCode::from(frame.code),
        reason: frame.reason.into(),
    }
}

fn from_ws_close(frame: WsCloseFrame) -> CloseFrame {
    CloseFrame {
        code: u16::from(frame.code),
        reason: frame.reason.as_str().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_frame_conversion_preserves_code_and_reason() {
        let ws = to_ws_close(CloseFrame {
            code: 4001,
            reason: "kicked".into(),
        });
        let back = from_ws_close(ws);
        assert_eq!(back.code, 4001);
        assert_eq!(back.reason, "kicked");
    }

    #[test]
    fn test_close_frame_conversion_normal_code() {
        let ws = to_ws_close(CloseFrame::normal("bye"));
        assert_eq!(ws.code, CloseCode::Normal);
    }

    #[test]
    fn test_send_on_closed_socket_maps_to_connection_closed() {
        assert!(matches!(
            send_error(WsError::AlreadyClosed),
            TransportError::ConnectionClosed(_)
        ));
        assert!(matches!(
            send_error(WsError::Io(std::io::ErrorKind::BrokenPipe.into())),
            TransportError::SendFailed(_)
        ));
    }
}
