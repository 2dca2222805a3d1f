//! Websocket session manager.
//!
//! Owns at most one live connection. `connect` performs the signed upgrade
//! and starts two background tasks: the receive loop (frame routing) and the
//! keepalive pinger. `disconnect` stops both, closes the socket, and fails
//! every request still waiting for an acknowledgement. There is no automatic
//! reconnect; a dropped connection stays dropped until the caller
//! disconnects and connects again.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use clover_core::{
    ChatMessage, CloverError, HeaderSigner, Headers, ListenerId, OutboundRequest, ServerAck,
    Subscriptions,
};

use crate::config::SessionConfig;
use crate::correlator::Correlator;
use crate::dispatcher::receive_loop;
use crate::keepalive::ping_loop;
use crate::writer::FrameWriter;

/// How long teardown waits for the close frame to flush.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnecting => write!(f, "disconnecting"),
        }
    }
}

/// One live socket plus the tasks serving it.
struct Connection {
    writer: FrameWriter,
    teardown: CancellationToken,
    correlator: Arc<Correlator>,
    receiver: JoinHandle<()>,
    pinger: JoinHandle<()>,
}

impl Connection {
    async fn shutdown(mut self) {
        self.teardown.cancel();
        self.receiver.abort();
        self.pinger.abort();
        let _ = (&mut self.receiver).await;
        let _ = (&mut self.pinger).await;

        match time::timeout(CLOSE_GRACE, self.writer.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!(error = %e, "socket already gone at close"),
            Err(_) => tracing::debug!("close frame not flushed in time"),
        }

        let failed = self.correlator.close();
        if failed > 0 {
            tracing::debug!(failed, "failed outstanding requests on disconnect");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.teardown.cancel();
        self.receiver.abort();
        self.pinger.abort();
        self.correlator.close();
    }
}

/// Persistent websocket session.
///
/// Share it across tasks behind an `Arc`; every method takes `&self`.
pub struct SessionManager {
    signer: Arc<HeaderSigner>,
    config: SessionConfig,
    subscriptions: Subscriptions<ChatMessage>,
    connection: AsyncMutex<Option<Connection>>,
    state: Mutex<SessionState>,
    next_seq: AtomicI64,
}

impl SessionManager {
    pub fn new(signer: Arc<HeaderSigner>, config: SessionConfig) -> Self {
        Self {
            signer,
            config,
            subscriptions: Subscriptions::new(),
            connection: AsyncMutex::new(None),
            state: Mutex::new(SessionState::Disconnected),
            next_seq: AtomicI64::new(1),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// `true` while connected and the receive loop is still reading.
    pub async fn is_alive(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|c| !c.receiver.is_finished())
    }

    /// A fresh sequence id from the session's own counter.
    ///
    /// Caller-chosen ids work too, but must not collide with these.
    pub fn next_seq_id(&self) -> i64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Receive every broadcast chat message from now on.
    /// Listeners survive reconnects.
    pub fn subscribe(&self) -> (ListenerId, mpsc::UnboundedReceiver<ChatMessage>) {
        self.subscriptions.subscribe()
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    pub fn subscriptions(&self) -> &Subscriptions<ChatMessage> {
        &self.subscriptions
    }

    /// Open the socket for `session_token` and start the background tasks.
    ///
    /// Fails with `AlreadyConnected` if a connection exists; on a failed
    /// handshake nothing is left running.
    pub async fn connect(&self, session_token: &str) -> Result<(), CloverError> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() {
            return Err(CloverError::AlreadyConnected);
        }

        self.set_state(SessionState::Connecting);
        match self.open(session_token).await {
            Ok(conn) => {
                *slot = Some(conn);
                self.set_state(SessionState::Connected);
                tracing::info!(host = %self.config.ws_base, "websocket connected");
                Ok(())
            }
            Err(e) => {
                self.set_state(SessionState::Disconnected);
                tracing::warn!(error = %e, "websocket connect failed");
                Err(e)
            }
        }
    }

    async fn open(&self, session_token: &str) -> Result<Connection, CloverError> {
        let endpoint = self.config.endpoint(session_token);
        let headers = self
            .signer
            .build_headers(&endpoint, &[], &Headers::new())
            .await?;

        let mut request = format!("{}{}", self.config.ws_base, endpoint)
            .into_client_request()
            .map_err(|e| CloverError::Connection(format!("invalid websocket url: {e}")))?;
        for (name, value) in &headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CloverError::Connection(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| CloverError::Connection(format!("invalid value for header {name}: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| CloverError::Connection(format!("websocket upgrade failed: {e}")))?;

        let (sink, stream) = stream.split();
        let teardown = CancellationToken::new();
        let writer = FrameWriter::new(sink, teardown.clone());
        let correlator = Arc::new(Correlator::new());

        let receiver = tokio::spawn(receive_loop(
            stream,
            Arc::clone(&correlator),
            self.subscriptions.clone(),
        ));
        let pinger = tokio::spawn(ping_loop(writer.clone(), self.config.ping_interval));

        Ok(Connection {
            writer,
            teardown,
            correlator,
            receiver,
            pinger,
        })
    }

    /// Stop the background tasks, close the socket and fail outstanding
    /// requests with `ConnectionClosed`.
    ///
    /// Idempotent, and safe after the socket has already dropped.
    pub async fn disconnect(&self) {
        let mut slot = self.connection.lock().await;
        let Some(conn) = slot.take() else {
            self.set_state(SessionState::Disconnected);
            return;
        };

        self.set_state(SessionState::Disconnecting);
        conn.shutdown().await;
        self.set_state(SessionState::Disconnected);
        tracing::info!("websocket disconnected");
    }

    /// Write `request` to the socket.
    ///
    /// With `wait_response == false` this returns `Ok(None)` once the frame
    /// is written. Otherwise `seq_id` is required, the waiter is registered
    /// before the write, and the call suspends until the matching ack, the
    /// configured timeout, or teardown. Teardown also abandons a write that
    /// is stuck behind a peer that stopped reading.
    pub async fn send_request(
        &self,
        request: OutboundRequest,
        wait_response: bool,
        seq_id: Option<i64>,
    ) -> Result<Option<ServerAck>, CloverError> {
        let wait_for = match (wait_response, seq_id) {
            (true, None) => {
                return Err(CloverError::Usage(
                    "can't wait for a response without a sequence id".into(),
                ))
            }
            (true, Some(id)) => Some(id),
            (false, _) => None,
        };
        let text = request.to_text()?;

        let (writer, correlator) = {
            let slot = self.connection.lock().await;
            let conn = slot.as_ref().ok_or(CloverError::NotConnected)?;
            (conn.writer.clone(), Arc::clone(&conn.correlator))
        };

        let pending = wait_for.map(|id| correlator.register(id)).transpose()?;

        tracing::debug!(t = request.t, seq_id = wait_for, bytes = text.len(), "outgoing frame");
        writer.send_text(text).await?;

        match pending {
            None => Ok(None),
            Some(pending) => pending.wait(self.config.request_timeout).await.map(Some),
        }
    }

    /// Fire-and-forget send.
    pub async fn send(&self, request: OutboundRequest) -> Result<(), CloverError> {
        self.send_request(request, false, None).await.map(|_| ())
    }

    /// Send and wait for the ack correlated by `seq_id`.
    pub async fn request(
        &self,
        request: OutboundRequest,
        seq_id: i64,
    ) -> Result<ServerAck, CloverError> {
        self.send_request(request, true, Some(seq_id))
            .await?
            .ok_or(CloverError::ConnectionClosed)
    }
}
