//! Resilient connection facade

use super::state::ConnectionState;
use super::transport::Transport;
use crate::metrics::{counters, histograms, labels};
use crate::protocol::{DocumentFactory, JsonDocumentFactory, Reply, Request};
use crate::session::{Session, SessionFactory};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use tracing::Instrument;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

static DEFAULT_DOCUMENTS: JsonDocumentFactory = JsonDocumentFactory;

/// Exclusive access to a connection's raw transport.
///
/// Holding it blocks every other operation on the connection.
pub type SessionStream<'a> = MappedMutexGuard<'a, Transport>;

/// Caller-visible handle over one pooled session at a time.
///
/// All traffic goes through a single lock around the held session, so
/// concurrent callers sharing the handle (usually through an `Arc`) never
/// interleave bytes on the wire or read each other's replies.
///
/// When a request fails with a transport error, the session is marked
/// invalid, released, and a fresh one is acquired before the error is
/// returned. The handle stays `Opened`; only the failed request is lost, and
/// retrying it on the same handle runs against the new session.
///
/// Call [`dispose`](Self::dispose) to give the session back in bounded time.
/// Dropping an undisposed handle inside a tokio runtime releases the session
/// on a spawned task; outside a runtime the session is leaked and logged.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> docwire::Result<()> {
/// use docwire::protocol::{InsertMessage, QueryMessage, ReplyMessage};
/// use docwire::{Connection, SessionPool};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let pool = Arc::new(SessionPool::from_connection_string("docdb://localhost/app")?);
/// let conn = Connection::new(pool);
/// conn.open().await?;
///
/// conn.send(&InsertMessage::new("events", [json!({ "kind": "login" })])?).await?;
///
/// let query = QueryMessage::new("events", json!({ "kind": "login" }))?;
/// let reply: ReplyMessage = match conn.send_and_receive(&query).await {
///     // Session already replaced; one retry on the same handle
///     Err(e) if e.is_transport_failure() => conn.send_and_receive(&query).await?,
///     other => other?,
/// };
/// # let _ = reply;
/// conn.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct Connection<F: SessionFactory> {
    id: u64,
    factory: Arc<F>,
    session: Mutex<Option<Session>>,
    open: AtomicBool,
    disposed: AtomicBool,
    documents: Option<Arc<dyn DocumentFactory>>,
}

impl<F: SessionFactory> Connection<F> {
    /// Create an unopened connection drawing sessions from `factory`
    pub fn new(factory: Arc<F>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            factory,
            session: Mutex::new(None),
            open: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            documents: None,
        }
    }

    /// Build reply documents with `documents` instead of the JSON default
    pub fn with_documents(mut self, documents: Arc<dyn DocumentFactory>) -> Self {
        self.documents = Some(documents);
        self
    }

    /// Process-unique connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Factory this connection draws sessions from
    pub fn factory(&self) -> &Arc<F> {
        &self.factory
    }

    /// Password-free description of the server
    pub fn connection_descriptor(&self) -> &str {
        self.factory.connection_descriptor()
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_open(self.open.load(Ordering::SeqCst))
    }

    /// Whether [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Acquire a session.
    ///
    /// Fails with [`Error::AlreadyOpen`] if a session is already held (the
    /// held session is kept), and with [`Error::Disposed`] after disposal.
    pub async fn open(&self) -> Result<()> {
        async {
            let mut slot = self.session.lock().await;

            // Checked under the lock so a concurrent dispose is never missed
            if self.is_disposed() {
                return Err(Error::Disposed {
                    connection_id: self.id,
                });
            }
            if slot.is_some() {
                return Err(Error::AlreadyOpen {
                    connection_id: self.id,
                    descriptor: self.connection_descriptor().to_string(),
                });
            }

            let session = self.factory.acquire().await?;
            tracing::info!(session_id = session.id(), "connection opened");
            *slot = Some(session);
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }
        .instrument(self.span("open"))
        .await
    }

    /// Release the held session, if any. Idempotent.
    pub async fn close(&self) {
        async {
            let mut slot = self.session.lock().await;
            let Some(session) = slot.take() else {
                return;
            };
            self.open.store(false, Ordering::SeqCst);

            let session_id = session.id();
            self.release_session(session).await;
            tracing::info!(session_id, "connection closed");
        }
        .instrument(self.span("close"))
        .await
    }

    /// Close the connection and refuse any later `open`. Runs once.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.close().await;
    }

    /// Write `request` and read its reply.
    ///
    /// Fails with [`Error::ConnectionClosed`] before any I/O when no session
    /// is held. A transport failure replaces the session and is then
    /// returned unchanged; if the replacement cannot be acquired, the
    /// establishment error is returned instead and the connection is left
    /// closed.
    pub async fn send_and_receive<Q, R>(&self, request: &Q) -> Result<R>
    where
        Q: Request,
        R: Reply,
    {
        let mut slot = self.session.lock().await;
        let session = self.usable_session(&mut slot).await?;
        let session_id = session.id();
        let request_id = request.request_id();
        let started = Instant::now();

        session.begin_exchange();
        let result = async {
            request.write_to(session.stream()).await?;
            R::read_from(session.stream(), request_id, self.documents()).await
        }
        .instrument(tracing::debug_span!(
            "send_and_receive",
            connection_id = self.id,
            session_id,
            request_id
        ))
        .await;
        session.end_exchange();

        match result {
            Ok(reply) => {
                histograms::round_trip_duration(started.elapsed().as_millis() as u64);
                counters::request_completed(labels::KIND_TWO_WAY, labels::STATUS_OK);
                Ok(reply)
            }
            Err(err) => Err(self
                .handle_failure(
                    &mut slot,
                    err,
                    labels::OPERATION_SEND_AND_RECEIVE,
                    labels::KIND_TWO_WAY,
                )
                .await),
        }
    }

    /// Write a request that has no reply.
    ///
    /// Same precondition and failure handling as
    /// [`send_and_receive`](Self::send_and_receive). Write failures are
    /// acted on here rather than surfacing on some later two-way call.
    pub async fn send<Q: Request>(&self, request: &Q) -> Result<()> {
        let mut slot = self.session.lock().await;
        let session = self.usable_session(&mut slot).await?;
        let session_id = session.id();
        let request_id = request.request_id();

        session.begin_exchange();
        let result = request
            .write_to(session.stream())
            .instrument(tracing::debug_span!(
                "send",
                connection_id = self.id,
                session_id,
                request_id
            ))
            .await;
        session.end_exchange();

        match result {
            Ok(()) => {
                counters::request_completed(labels::KIND_ONE_WAY, labels::STATUS_OK);
                Ok(())
            }
            Err(err) => Err(self
                .handle_failure(&mut slot, err, labels::OPERATION_SEND, labels::KIND_ONE_WAY)
                .await),
        }
    }

    /// Id of the held session, if any
    pub async fn session_id(&self) -> Option<u64> {
        self.session.lock().await.as_ref().map(Session::id)
    }

    /// Whether the held session has been authenticated
    pub async fn is_authenticated(&self) -> Result<bool> {
        let slot = self.session.lock().await;
        slot.as_ref()
            .map(Session::is_authenticated)
            .ok_or_else(|| self.closed_error())
    }

    /// Record a successful auth handshake on the held session.
    ///
    /// The flag belongs to the session: after a replacement the connection
    /// reports unauthenticated until this is called again.
    pub async fn mark_authenticated(&self) -> Result<()> {
        let mut slot = self.session.lock().await;
        let session = slot.as_mut().ok_or_else(|| self.closed_error())?;
        session.mark_authenticated();
        tracing::debug!(connection_id = self.id, session_id = session.id(), "session authenticated");
        Ok(())
    }

    /// Raw transport of the held session, for collaborators such as an auth
    /// handshake that speak outside the request/reply messages.
    ///
    /// The guard holds the connection lock; drop it before sending requests
    /// through this connection.
    pub async fn stream(&self) -> Result<SessionStream<'_>> {
        let slot = self.session.lock().await;
        MutexGuard::try_map(slot, |slot| slot.as_mut().map(Session::stream))
            .map_err(|_| self.closed_error())
    }

    /// Held session, replaced first if its previous exchange was interrupted
    async fn usable_session<'a>(&self, slot: &'a mut Option<Session>) -> Result<&'a mut Session> {
        let interrupted = match slot.as_ref() {
            None => return Err(self.closed_error()),
            Some(session) => !session.is_valid(),
        };

        if interrupted {
            tracing::warn!(
                connection_id = self.id,
                "previous exchange was interrupted, replacing session"
            );
            self.replace_session(slot).await?;
        }

        slot.as_mut().ok_or_else(|| self.closed_error())
    }

    /// Count the failure and replace the session if the transport broke.
    ///
    /// Returns the error the caller should see.
    async fn handle_failure(
        &self,
        slot: &mut Option<Session>,
        err: Error,
        operation: &'static str,
        kind: &'static str,
    ) -> Error {
        counters::request_completed(kind, err.category());
        if !err.is_transport_failure() {
            return err;
        }

        counters::transport_failure(operation);
        tracing::warn!(
            connection_id = self.id,
            operation,
            error = %err,
            "transport failure, replacing session"
        );

        match self.replace_session(slot).await {
            Ok(()) => err,
            Err(establish) => establish,
        }
    }

    /// Invalidate, release and re-acquire the held session
    async fn replace_session(&self, slot: &mut Option<Session>) -> Result<()> {
        let Some(mut failed) = slot.take() else {
            return Ok(());
        };
        // Closed while no session is held, also if this future is dropped below
        self.open.store(false, Ordering::SeqCst);

        failed.mark_invalid();
        let failed_id = failed.id();
        self.release_session(failed).await;

        match self.factory.acquire().await {
            Ok(fresh) => {
                tracing::debug!(
                    connection_id = self.id,
                    failed_session_id = failed_id,
                    session_id = fresh.id(),
                    "session replaced"
                );
                *slot = Some(fresh);
                self.open.store(true, Ordering::SeqCst);
                counters::connection_replaced();
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = self.id,
                    error = %e,
                    "could not acquire replacement session, connection closed"
                );
                Err(e)
            }
        }
    }

    /// Hand `session` back to the factory.
    ///
    /// The release runs on its own task, so it completes even when the
    /// calling future is dropped.
    async fn release_session(&self, session: Session) {
        let factory = Arc::clone(&self.factory);
        let release = tokio::spawn(async move { factory.release(session).await });
        if let Err(e) = release.await {
            tracing::warn!(connection_id = self.id, error = %e, "session release task failed");
        }
    }

    fn documents(&self) -> &dyn DocumentFactory {
        match &self.documents {
            Some(documents) => documents.as_ref(),
            None => &DEFAULT_DOCUMENTS,
        }
    }

    fn closed_error(&self) -> Error {
        Error::ConnectionClosed {
            connection_id: self.id,
            descriptor: self.connection_descriptor().to_string(),
        }
    }

    fn span(&self, operation: &'static str) -> tracing::Span {
        tracing::info_span!(
            "connection",
            operation,
            connection_id = self.id,
            descriptor = %self.connection_descriptor()
        )
    }
}

impl<F: SessionFactory> Drop for Connection<F> {
    fn drop(&mut self) {
        self.disposed.store(true, Ordering::SeqCst);
        let Some(session) = self.session.get_mut().take() else {
            return;
        };
        let session_id = session.id();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::debug!(
                    connection_id = self.id,
                    session_id,
                    "connection dropped without dispose, releasing session in background"
                );
                let factory = Arc::clone(&self.factory);
                handle.spawn(async move {
                    factory.release(session).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    connection_id = self.id,
                    session_id,
                    "connection dropped outside a runtime, session leaked"
                );
            }
        }
    }
}

impl<F: SessionFactory> std::fmt::Debug for Connection<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("descriptor", &self.connection_descriptor())
            .field("state", &self.state())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
