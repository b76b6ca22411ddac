//! Connection actor: an isolated Tokio task that owns one chat connection.
//!
//! The actor owns the socket's write half, the state machine, the reconnect
//! policy and timer, and the attachment slot. Nothing else touches them. The
//! outside world talks to it through a [`ConnectionHandle`]; helper tasks
//! (one per dial) talk to it through an internal event channel.
//!
//! ```text
//!  ConnectionHandle ──Command──▶ ┌────────────────────┐ ──callbacks──▶ EventHandler
//!                                │  ConnectionManager │
//!  io task (dial + read) ─Event─▶└────────────────────┘ ──frames────▶ FrameSink
//! ```
//!
//! Everything the actor does happens on its own task, so callbacks are never
//! invoked concurrently and frames are handled in the order they were read.
//!
//! # Generations
//!
//! Every dial gets a fresh generation number. Events carry the generation of
//! the socket that produced them; anything from an older socket (replaced by
//! `init` or a second `connect`) is ignored.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use wirechat_protocol::{
    AttachmentFramer, Inbound, JsonEnvelope, LogicalMessage, MessageCodec, ProtocolError,
};
use wirechat_transport::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CloseFrame, Connector, Frame, FrameSink, FrameSource,
    TransportError,
};

use crate::{
    ClientConfig, ClientError, ConnectionState, ConnectionStatus, EventHandler, FallbackSender,
    ReconnectPolicy,
};

/// Reason sent with deliberate closes.
const MANUAL_CLOSE_REASON: &str = "manual close";

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Commands sent to the actor through its handle.
///
/// The `oneshot::Sender` in some variants is a "reply channel": the caller
/// waits on it until the actor has finished the operation.
enum Command {
    Init {
        handler: Box<dyn EventHandler>,
        reply: oneshot::Sender<()>,
    },
    Connect,
    Send(LogicalMessage),
    Close {
        reply: oneshot::Sender<()>,
    },
    PauseReconnect,
    ResumeReconnect,
    Status {
        reply: oneshot::Sender<ConnectionStatus>,
    },
    Shutdown,
}

/// Reports from io tasks and fallback deliveries.
enum Event<S> {
    Opened { generation: u64, sink: S },
    Frame { generation: u64, frame: Frame },
    Error { generation: u64, error: TransportError },
    Closed { generation: u64, close: CloseFrame },
    FallbackFailed {
        message: LogicalMessage,
        error: ClientError,
    },
}

// ---------------------------------------------------------------------------
// ConnectionHandle
// ---------------------------------------------------------------------------

/// Handle to a running connection actor.
///
/// This is cheap to clone: it's just an `mpsc::UnboundedSender` wrapper.
/// The actor stops when [`shutdown`](Self::shutdown) is called or every
/// handle is dropped.
#[derive(Clone)]
pub struct ConnectionHandle {
    sender: mpsc::UnboundedSender<Command>,
}

impl ConnectionHandle {
    /// Installs `handler`, resets the reconnect policy, closes any existing
    /// socket with code 1000 and dials.
    ///
    /// Returns once the dial has started, not when it has finished: watch
    /// [`EventHandler::on_connect`] for that.
    pub async fn init(&self, handler: impl EventHandler) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(Command::Init {
            handler: Box::new(handler),
            reply: reply_tx,
        })?;
        reply_rx.await.map_err(|_| ClientError::Unavailable)
    }

    /// Dials unless a dial is already in flight.
    pub fn connect(&self) -> Result<(), ClientError> {
        self.command(Command::Connect)
    }

    /// Sends a message (fire-and-forget).
    ///
    /// Never fails from the caller's point of view. A message that can't be
    /// written is logged and dropped, or handed to the HTTP fallback when
    /// one is configured and the message qualifies.
    pub fn send(&self, message: LogicalMessage) {
        if self.command(Command::Send(message)).is_err() {
            tracing::warn!("send dropped: connection manager is not running");
        }
    }

    /// Closes the connection deliberately and pauses reconnection.
    ///
    /// Idempotent. Returns once the close frame has been written.
    pub async fn close(&self) -> Result<(), ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(Command::Close { reply: reply_tx })?;
        reply_rx.await.map_err(|_| ClientError::Unavailable)
    }

    /// Cancels any pending reconnect and stops scheduling new ones.
    pub fn pause_reconnect(&self) -> Result<(), ClientError> {
        self.command(Command::PauseReconnect)
    }

    /// Allows reconnection again and schedules a retry if the connection is
    /// down.
    pub fn resume_reconnect(&self) -> Result<(), ClientError> {
        self.command(Command::ResumeReconnect)
    }

    /// A snapshot of the connection.
    pub async fn status(&self) -> Result<ConnectionStatus, ClientError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(Command::Status { reply: reply_tx })?;
        reply_rx.await.map_err(|_| ClientError::Unavailable)
    }

    /// Closes the connection and stops the actor.
    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.command(Command::Shutdown)
    }

    /// Returns `true` while the actor is running.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    fn command(&self, command: Command) -> Result<(), ClientError> {
        self.sender
            .send(command)
            .map_err(|_| ClientError::Unavailable)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("running", &self.is_running())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ConnectionManager
// ---------------------------------------------------------------------------

/// The connection actor.
///
/// Build it with [`new`](Self::new), optionally add a fallback, then
/// [`spawn`](Self::spawn) it onto the current Tokio runtime.
pub struct ConnectionManager<C: Connector> {
    connector: Arc<C>,
    config: ClientConfig,
    codec: MessageCodec,
    fallback: Option<Arc<dyn FallbackSender>>,

    handler: Option<Box<dyn EventHandler>>,
    state: ConnectionState,
    endpoint: String,
    policy: ReconnectPolicy,
    /// Deadline of the single reconnect timer, if one is pending.
    reconnect_at: Option<Instant>,
    framer: AttachmentFramer,

    generation: u64,
    sink: Option<C::Sink>,
    io_task: Option<JoinHandle<()>>,

    events: mpsc::UnboundedReceiver<Event<C::Sink>>,
    event_tx: mpsc::UnboundedSender<Event<C::Sink>>,
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, config: ClientConfig, codec: MessageCodec) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        let endpoint = config.endpoint().url().to_string();

        Self {
            connector: Arc::new(connector),
            config,
            codec,
            fallback: None,
            handler: None,
            state: ConnectionState::Closed,
            endpoint,
            policy,
            reconnect_at: None,
            framer: AttachmentFramer::new(),
            generation: 0,
            sink: None,
            io_task: None,
            events,
            event_tx,
        }
    }

    /// Routes eligible messages through `fallback` while disconnected.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackSender>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Starts the actor and returns its handle.
    pub fn spawn(self) -> ConnectionHandle {
        let (sender, commands) = mpsc::unbounded_channel();
        tokio::spawn(self.run(commands));
        ConnectionHandle { sender }
    }

    /// Runs the actor loop until shutdown or until every handle is gone.
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(endpoint = %self.endpoint, "connection actor started");

        loop {
            tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },
                Some(event) = self.events.recv() => self.handle_event(event),
                () = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    tracing::debug!(attempt = self.policy.attempt(), "reconnect timer fired");
                    self.connect();
                }
            }
        }

        self.close().await;
        tracing::info!(endpoint = %self.endpoint, "connection actor stopped");
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Init { handler, reply } => {
                self.handler = Some(handler);
                self.policy.reset();
                self.reconnect_at = None;
                self.drop_socket().await;
                self.connect();
                let _ = reply.send(());
            }
            Command::Connect => {
                if self.state.is_open() {
                    self.drop_socket().await;
                }
                self.connect();
            }
            Command::Send(message) => self.send(message).await,
            Command::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            Command::PauseReconnect => {
                self.policy.pause();
                if self.reconnect_at.take().is_some() {
                    tracing::debug!("pending reconnect cancelled");
                }
                tracing::info!("reconnect paused");
            }
            Command::ResumeReconnect => {
                self.policy.resume();
                tracing::info!("reconnect resumed");
                if self.state == ConnectionState::Closed && self.handler.is_some() {
                    self.schedule_reconnect();
                }
            }
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    // -- Lifecycle -----------------------------------------------------------

    fn connect(&mut self) {
        if self.state == ConnectionState::Connecting {
            tracing::debug!("connect ignored: already connecting");
            return;
        }
        // A manual connect supersedes any pending retry.
        self.reconnect_at = None;
        self.abort_io();
        self.sink = None;

        self.endpoint = self.config.endpoint().url().to_string();
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        tracing::info!(
            url = %self.endpoint,
            attempt = self.policy.attempt(),
            max_attempts = self.policy.config().max_attempts,
            "connecting"
        );

        let task = run_io(
            Arc::clone(&self.connector),
            self.endpoint.clone(),
            self.generation,
            self.event_tx.clone(),
        );
        self.io_task = Some(tokio::spawn(task));
    }

    /// Deliberate close: no reconnect, `on_close` with code 1000.
    async fn close(&mut self) {
        self.policy.pause();
        self.reconnect_at = None;

        let was_active = self.state.is_active();
        self.state = ConnectionState::Closing;
        self.drop_socket().await;
        self.state = ConnectionState::Closed;

        if was_active {
            tracing::info!(url = %self.endpoint, "connection closed manually");
            self.emit(|h| h.on_close(CloseFrame::normal(MANUAL_CLOSE_REASON)));
        }
    }

    /// Closes and forgets the current socket without notifying the handler.
    async fn drop_socket(&mut self) {
        // Bumping the generation makes any in-flight event stale.
        self.generation += 1;
        self.abort_io();
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close(CloseFrame::normal(MANUAL_CLOSE_REASON)).await {
                tracing::debug!(error = %e, "close frame not delivered");
            }
        }
        self.state = ConnectionState::Closed;
    }

    fn abort_io(&mut self) {
        if let Some(task) = self.io_task.take() {
            task.abort();
        }
    }

    fn schedule_reconnect(&mut self) {
        if self.policy.is_paused() {
            tracing::debug!("reconnect not scheduled: paused");
            return;
        }
        match self.policy.next_delay() {
            Some(delay) => {
                self.reconnect_at = Some(Instant::now() + delay);
                tracing::info!(
                    attempt = self.policy.attempt(),
                    delay_ms = delay.as_millis() as u64,
                    "reconnect scheduled"
                );
            }
            None => tracing::warn!(
                attempts = self.policy.attempt(),
                "reconnect attempts exhausted"
            ),
        }
    }

    // -- Events --------------------------------------------------------------

    fn handle_event(&mut self, event: Event<C::Sink>) {
        match event {
            Event::Opened { generation, sink } => {
                if generation != self.generation {
                    return;
                }
                self.sink = Some(sink);
                self.state = ConnectionState::Open;
                self.policy.on_open();
                self.framer.clear();
                tracing::info!(url = %self.endpoint, "connection open");
                self.emit(|h| h.on_connect());
            }
            Event::Frame { generation, frame } => {
                if generation != self.generation {
                    return;
                }
                if !self.state.is_open() {
                    tracing::warn!(
                        state = %self.state,
                        kind = frame.kind(),
                        "frame dropped: connection not open"
                    );
                    return;
                }
                self.dispatch(frame);
            }
            Event::Error { generation, error } => {
                if generation == self.generation {
                    tracing::warn!(url = %self.endpoint, %error, "transport error");
                }
            }
            Event::Closed { generation, close } => {
                if generation != self.generation {
                    return;
                }
                self.state = ConnectionState::Closed;
                self.sink = None;
                self.io_task = None;
                tracing::info!(
                    url = %self.endpoint,
                    code = close.code,
                    reason = %close.reason,
                    "connection closed"
                );

                let abnormal = !close.is_normal();
                self.emit(|h| h.on_close(close));
                if abnormal {
                    self.schedule_reconnect();
                }
            }
            Event::FallbackFailed { message, error } => {
                self.emit(|h| h.on_delivery_failure(message, &error));
            }
        }
    }

    fn dispatch(&mut self, frame: Frame) {
        match frame {
            Frame::Binary(bytes) => self.dispatch_binary(bytes),
            Frame::Text(text) => match self.codec.parse_text(&text) {
                Ok(Inbound::AttachmentMetadata(metadata)) => {
                    tracing::debug!(id = ?metadata.id, "attachment metadata received");
                    if let Some(lost) = self.framer.receive_metadata(metadata) {
                        tracing::warn!(
                            lost_id = ?lost.id,
                            "attachment metadata replaced before its payload arrived"
                        );
                    }
                }
                Ok(Inbound::Message(message)) => self.emit(|h| h.on_message(message)),
                Err(ProtocolError::UnknownType(kind)) => {
                    tracing::debug!(%kind, "ignoring message of unknown type");
                }
                Err(e) => {
                    tracing::warn!(error = %e, len = text.len(), "dropping malformed text frame");
                }
            },
            // Close frames are turned into `Event::Closed` by the io task.
            Frame::Close(_) => {}
        }
    }

    fn dispatch_binary(&mut self, bytes: Bytes) {
        if self.framer.is_pending() {
            if let Some(message) = self.framer.receive_binary(bytes) {
                tracing::debug!(id = ?message.id, "attachment received");
                self.emit(|h| h.on_message(message));
            }
            return;
        }
        if let Some(message) = self.codec.decode(&bytes) {
            self.emit(|h| h.on_message(message));
        }
    }

    // -- Outbound ------------------------------------------------------------

    async fn send(&mut self, message: LogicalMessage) {
        if !self.state.is_open() {
            self.send_offline(message);
            return;
        }
        let Some(sink) = self.sink.as_mut() else {
            tracing::warn!("send rejected: no socket");
            return;
        };

        if message.is_outbound_attachment() {
            let Some(bytes) = message.attachment().map(|a| a.bytes.clone()) else {
                return;
            };
            let (metadata, payload) = match self.framer.start_outbound(&message, bytes) {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "attachment not sent");
                    return;
                }
            };
            // Back to back: nothing else can be written in between because
            // only this task owns the sink.
            let len = payload.len();
            let result = match sink.send(metadata).await {
                Ok(()) => sink.send(payload).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => tracing::debug!(len, "attachment sent"),
                Err(e) => tracing::warn!(error = %e, "attachment write failed"),
            }
            return;
        }

        let frame = match self.codec.encode_frame(&message) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(kind = %message.kind, error = %e, "message not sent");
                return;
            }
        };
        let kind = frame.kind();
        let len = frame.len();
        match sink.send(frame).await {
            Ok(()) => tracing::debug!(frame = kind, len, msg_kind = %message.kind, "message sent"),
            Err(e) => tracing::warn!(error = %e, "write failed"),
        }
    }

    fn send_offline(&mut self, message: LogicalMessage) {
        // Chat with nothing to stream: attachment bytes only travel over the socket.
        let eligible = message.kind.is_chat() && !message.is_outbound_attachment();
        let fallback = match (&self.fallback, eligible) {
            (Some(fallback), true) => Arc::clone(fallback),
            _ => {
                tracing::warn!(
                    state = %self.state,
                    kind = %message.kind,
                    "send rejected: connection not open"
                );
                return;
            }
        };

        tracing::info!(kind = %message.kind, "connection not open, delivering over fallback");
        let envelope = JsonEnvelope::from_logical(&message);
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            if let Err(error) = fallback.deliver(envelope).await {
                tracing::warn!(%error, "fallback delivery failed");
                let _ = events.send(Event::FallbackFailed { message, error });
            }
        });
    }

    // -- Helpers -------------------------------------------------------------

    fn emit(&mut self, f: impl FnOnce(&mut dyn EventHandler)) {
        if let Some(handler) = self.handler.as_deref_mut() {
            f(handler);
        }
    }

    fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            endpoint: self.endpoint.clone(),
            attempt: self.policy.attempt(),
            delay: self.policy.delay(),
            reconnect_pending: self.reconnect_at.is_some(),
            reconnect_paused: self.policy.is_paused(),
            attachment_pending: self.framer.is_pending(),
        }
    }
}

/// Dials, then forwards every frame until the connection ends.
///
/// Always finishes with exactly one `Closed` event: the peer's close code,
/// 1005 for a close frame without one, or 1006 when the stream just stopped
/// (or never opened).
async fn run_io<C: Connector>(
    connector: Arc<C>,
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<Event<C::Sink>>,
) {
    let abnormal = || CloseFrame {
        code: CLOSE_ABNORMAL,
        reason: String::new(),
    };

    let (sink, mut source) = match connector.connect(&url).await {
        Ok(halves) => halves,
        Err(error) => {
            let _ = events.send(Event::Error { generation, error });
            let _ = events.send(Event::Closed {
                generation,
                close: abnormal(),
            });
            return;
        }
    };
    if events.send(Event::Opened { generation, sink }).is_err() {
        return;
    }

    let close = loop {
        match source.next_frame().await {
            Some(Ok(Frame::Close(close))) => {
                break close.unwrap_or(CloseFrame {
                    code: CLOSE_NO_STATUS,
                    reason: String::new(),
                });
            }
            Some(Ok(frame)) => {
                if events.send(Event::Frame { generation, frame }).is_err() {
                    return;
                }
            }
            Some(Err(error)) => {
                let _ = events.send(Event::Error { generation, error });
                break abnormal();
            }
            None => break abnormal(),
        }
    };
    let _ = events.send(Event::Closed { generation, close });
}

/// Sleeps until `deadline`, or forever when there is none.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
