//! A multiplexed connection to one backend target.
//!
//! A channel connects lazily on its first call and reconnects lazily after
//! the connection drops. Its [`ConnectivityState`] can be read at any time
//! without side effects. `close()` moves it to `Shutdown`, which is terminal:
//! every later call fails with `UNAVAILABLE`, and the owning handle must be
//! replaced.
//!
//! Calls on one connection are correlated by request id, so any number may
//! be in flight and they may complete in any order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use crate::config::{ClientConfig, Endpoint};
use crate::credentials::ChannelCredentials;
use crate::metadata::Metadata;
use crate::protocol::{Message, Request, RequestId};
use crate::status::Status;
use crate::transport::{BoxedStream, FrameCodec};

/// Observable lifecycle state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityState {
    Idle,
    Connecting,
    Ready,
    TransientFailure,
    Shutdown,
}

impl std::fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectivityState::Idle => "IDLE",
            ConnectivityState::Connecting => "CONNECTING",
            ConnectivityState::Ready => "READY",
            ConnectivityState::TransientFailure => "TRANSIENT_FAILURE",
            ConnectivityState::Shutdown => "SHUTDOWN",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelOptions {
    pub connect_timeout: Duration,
    /// Deadline applied to every call
    pub call_timeout: Duration,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ChannelOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            call_timeout: config.call_timeout(),
        }
    }
}

type CallResult = Result<Value, Status>;
type PendingCalls = Arc<Mutex<HashMap<RequestId, oneshot::Sender<CallResult>>>>;
type FrameSink = SplitSink<Framed<BoxedStream, FrameCodec>, Message>;

/// One established connection and its response reader.
struct Connection {
    generation: u64,
    sink: Mutex<FrameSink>,
    pending: PendingCalls,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn shut_down(&self, reason: &str) {
        self.closed.store(true, Ordering::Release);
        fail_pending(&self.pending, reason);
    }
}

/// State shared between a channel and its connections' readers.
///
/// `generation` names the most recent connection attempt. A connection only
/// moves the channel state while it is still that attempt.
struct Shared {
    state: watch::Sender<ConnectivityState>,
    generation: AtomicU64,
}

impl Shared {
    fn transition_from(&self, generation: u64, next: ConnectivityState) {
        self.state.send_if_modified(|current| {
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            advance(current, next)
        });
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Client side of a connection to one backend target.
pub struct Channel {
    target: Endpoint,
    credentials: ChannelCredentials,
    options: ChannelOptions,
    shared: Arc<Shared>,
    connection: Arc<Mutex<Option<Arc<Connection>>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("target", &self.target)
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Create an idle channel. No I/O happens until the first call.
    #[must_use]
    pub fn new(target: Endpoint, credentials: ChannelCredentials, options: ChannelOptions) -> Self {
        let (state, _) = watch::channel(ConnectivityState::Idle);
        Self {
            target,
            credentials,
            options,
            shared: Arc::new(Shared {
                state,
                generation: AtomicU64::new(0),
            }),
            connection: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn target(&self) -> &Endpoint {
        &self.target
    }

    #[must_use]
    pub fn credentials(&self) -> ChannelCredentials {
        self.credentials
    }

    /// Current state. Reading it never starts a connection attempt.
    #[must_use]
    pub fn state(&self) -> ConnectivityState {
        *self.shared.state.borrow()
    }

    /// Receiver notified on every state transition.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<ConnectivityState> {
        self.shared.state.subscribe()
    }

    /// Move to `next` unless the channel is already shut down.
    pub(crate) fn transition(&self, next: ConnectivityState) {
        self.shared
            .state
            .send_if_modified(|current| advance(current, next));
    }

    /// Shut the channel down. In-flight calls fail with `UNAVAILABLE`.
    pub fn close(&self) {
        self.shared.state.send_replace(ConnectivityState::Shutdown);
        // A connect in progress re-checks the state once it has a connection.
        if let Ok(mut slot) = self.connection.try_lock() {
            if let Some(conn) = slot.take() {
                conn.shut_down("channel shut down");
            }
        } else if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let connection = Arc::clone(&self.connection);
            handle.spawn(async move {
                if let Some(conn) = connection.lock().await.take() {
                    conn.shut_down("channel shut down");
                }
            });
        }
        debug!(target = %self.target, "channel shut down");
    }

    /// Issue one unary call and wait for its single completion.
    ///
    /// # Errors
    ///
    /// Returns the backend's status for failed calls, `UNAVAILABLE` for
    /// connection problems, and `DEADLINE_EXCEEDED` when the call deadline passes.
    pub async fn unary(
        &self,
        method: &str,
        params: Value,
        metadata: Metadata,
    ) -> Result<Value, Status> {
        let conn = self.ready_connection().await?;

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = Request::new(method, Some(params), id.clone()).with_metadata(metadata);

        let (tx, rx) = oneshot::channel();
        conn.pending.lock().await.insert(id.clone(), tx);
        // The reader may have drained the table just before the insert.
        if conn.is_closed() {
            conn.pending.lock().await.remove(&id);
            return Err(Status::unavailable("connection closed"));
        }

        trace!(%id, method, "sending request");
        let sent = {
            let mut sink = conn.sink.lock().await;
            sink.send(Message::Request(request)).await
        };
        if let Err(e) = sent {
            conn.pending.lock().await.remove(&id);
            conn.closed.store(true, Ordering::Release);
            self.shared
                .transition_from(conn.generation, ConnectivityState::Idle);
            return Err(Status::unavailable(format!("failed to send request: {e}")));
        }

        match tokio::time::timeout(self.options.call_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Status::unavailable("connection closed before response")),
            Err(_) => {
                conn.pending.lock().await.remove(&id);
                Err(Status::deadline_exceeded(format!(
                    "no response within {}ms",
                    self.options.call_timeout.as_millis()
                )))
            }
        }
    }

    async fn ready_connection(&self) -> Result<Arc<Connection>, Status> {
        let mut slot = self.connection.lock().await;

        if self.state() == ConnectivityState::Shutdown {
            if let Some(conn) = slot.take() {
                conn.shut_down("channel shut down");
            }
            return Err(Status::unavailable("channel has been shut down"));
        }

        if let Some(conn) = slot.as_ref()
            && !conn.is_closed()
        {
            return Ok(Arc::clone(conn));
        }

        self.transition(ConnectivityState::Connecting);
        debug!(target = %self.target, "connecting");

        match self.establish().await {
            Ok(conn) => {
                if self.state() == ConnectivityState::Shutdown {
                    return Err(Status::unavailable("channel has been shut down"));
                }
                let conn = Arc::new(conn);
                *slot = Some(Arc::clone(&conn));
                self.transition(ConnectivityState::Ready);
                Ok(conn)
            }
            Err(status) => {
                *slot = None;
                self.transition(ConnectivityState::TransientFailure);
                warn!(target = %self.target, "connection failed: {}", status.details());
                Err(status)
            }
        }
    }

    async fn establish(&self) -> Result<Connection, Status> {
        let addr = (self.target.host(), self.target.port());
        let tcp = tokio::time::timeout(self.options.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Status::unavailable(format!("connect to {} timed out", self.target)))?
            .map_err(|e| Status::unavailable(format!("connect to {}: {e}", self.target)))?;
        tcp.set_nodelay(true)
            .map_err(|e| Status::unavailable(format!("socket setup failed: {e}")))?;

        let stream = self.credentials.secure(tcp, &self.target).await?;
        let (sink, stream) = Framed::new(stream, FrameCodec::new()).split();

        let pending: PendingCalls = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;

        let reader = tokio::spawn(read_responses(
            stream,
            Arc::clone(&pending),
            Arc::clone(&closed),
            Arc::clone(&self.shared),
            generation,
        ));

        Ok(Connection {
            generation,
            sink: Mutex::new(sink),
            pending,
            closed,
            reader,
        })
    }
}

/// Apply `next` unless the channel is shut down. Returns whether it changed.
fn advance(current: &mut ConnectivityState, next: ConnectivityState) -> bool {
    if *current == ConnectivityState::Shutdown || *current == next {
        return false;
    }
    *current = next;
    true
}

fn fail_pending(pending: &PendingCalls, reason: &str) {
    let pending = Arc::clone(pending);
    let reason = reason.to_string();
    // Draining needs the async lock; hand it to the runtime when contended.
    if let Ok(mut calls) = pending.try_lock() {
        for (_, tx) in calls.drain() {
            let _ = tx.send(Err(Status::unavailable(reason.clone())));
        }
    } else if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(async move {
            for (_, tx) in pending.lock().await.drain() {
                let _ = tx.send(Err(Status::unavailable(reason.clone())));
            }
        });
    }
}

async fn read_responses(
    mut stream: futures_util::stream::SplitStream<Framed<BoxedStream, FrameCodec>>,
    pending: PendingCalls,
    closed: Arc<AtomicBool>,
    shared: Arc<Shared>,
    generation: u64,
) {
    let reason = loop {
        match stream.next().await {
            Some(Ok(Message::Response(resp))) => {
                let Some(tx) = pending.lock().await.remove(&resp.id) else {
                    trace!(id = %resp.id, "response for unknown or abandoned call");
                    continue;
                };
                let result = match resp.error {
                    Some(error) => Err(Status::from(error)),
                    None => Ok(resp.result.unwrap_or(Value::Null)),
                };
                let _ = tx.send(result);
            }
            Some(Ok(Message::Request(req))) => {
                warn!(method = %req.method, "ignoring server-initiated request");
            }
            Some(Err(e)) => break format!("connection error: {e}"),
            None => break "connection closed by server".to_string(),
        }
    };

    debug!("{reason}");
    closed.store(true, Ordering::Release);
    shared.transition_from(generation, ConnectivityState::Idle);

    for (_, tx) in pending.lock().await.drain() {
        let _ = tx.send(Err(Status::unavailable(reason.clone())));
    }
}
