//! Session pool over TCP and Unix sockets

use super::connection_string::{ConnectionInfo, TransportType};
use super::{PoolConfig, Session, SessionFactory};
use crate::connection::Transport;
use crate::metrics::{counters, histograms, labels};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, Semaphore};
use tracing::Instrument;

/// Point-in-time pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Sessions waiting for reuse
    pub idle: usize,
    /// Sessions currently handed out
    pub in_use: usize,
    /// Configured maximum live sessions
    pub max_size: usize,
}

/// Pool of sessions to one server.
///
/// Live sessions are bounded by a semaphore of `max_size` permits: a permit
/// is taken on `acquire` and given back on `release`. Idle sessions are
/// reused most-recent first.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> docwire::Result<()> {
/// use docwire::{Connection, SessionPool};
/// use std::sync::Arc;
///
/// let pool = Arc::new(SessionPool::from_connection_string(
///     "docdb://app@db.internal:27017/orders?max_pool_size=4",
/// )?);
///
/// let conn = Connection::new(Arc::clone(&pool));
/// conn.open().await?;
/// println!("{:?}", pool.status().await);
/// # Ok(())
/// # }
/// ```
pub struct SessionPool {
    info: ConnectionInfo,
    descriptor: String,
    config: PoolConfig,
    idle: Mutex<Vec<Session>>,
    permits: Semaphore,
    closed: AtomicBool,
}

impl SessionPool {
    /// Create a pool; no session is dialed until the first `acquire`
    pub fn new(info: ConnectionInfo, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            descriptor: info.descriptor(),
            permits: Semaphore::new(config.max_size),
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            info,
            config,
        })
    }

    /// Create a pool from a connection string, reading pool settings from
    /// its query parameters
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let info = ConnectionInfo::parse(connection_string)?;
        let config = PoolConfig::from_connection_info(&info)?;
        Self::new(info, config)
    }

    /// Pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Parsed connection info
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Current occupancy
    pub async fn status(&self) -> PoolStatus {
        let idle = self.idle.lock().await.len();
        PoolStatus {
            idle,
            in_use: self
                .config
                .max_size
                .saturating_sub(self.permits.available_permits()),
            max_size: self.config.max_size,
        }
    }

    /// Shut down idle sessions and refuse further acquires.
    ///
    /// Sessions still handed out are shut down when they are released.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();

        let drained: Vec<Session> = self.idle.lock().await.drain(..).collect();
        tracing::info!(
            descriptor = %self.descriptor,
            idle = drained.len(),
            "closing session pool"
        );
        for session in drained {
            discard(session, "pool closed").await;
        }
    }

    /// Most recent idle session that is still usable
    async fn take_idle(&self) -> Option<Session> {
        let mut stale = Vec::new();
        let found = {
            let mut idle = self.idle.lock().await;
            let mut found = None;
            while let Some(session) = idle.pop() {
                if session.is_valid() && session.idle_for() < self.config.idle_timeout {
                    found = Some(session);
                    break;
                }
                stale.push(session);
            }
            found
        };

        for session in stale {
            discard(session, "idle timeout").await;
        }
        found
    }

    /// Open a new transport to the server
    async fn dial(&self) -> Result<Session> {
        let connect = async {
            match self.info.transport {
                TransportType::Tcp => {
                    let host = self.info.host.as_deref().ok_or_else(|| {
                        Error::Config("TCP connection requires a host".into())
                    })?;
                    Transport::connect_tcp(host, self.info.port).await
                }
                TransportType::Unix => {
                    let path = self.info.unix_socket.as_deref().ok_or_else(|| {
                        Error::Config("Unix connection requires a socket path".into())
                    })?;
                    Transport::connect_unix(path).await
                }
            }
        };

        let transport = tokio::time::timeout(self.config.connect_timeout, connect)
            .await
            .map_err(|_| {
                Error::Establish(format!(
                    "timed out after {:?} connecting to {}",
                    self.config.connect_timeout, self.descriptor
                ))
            })?
            .map_err(|e| match e {
                Error::Config(_) => e,
                other => Error::Establish(format!(
                    "failed to connect to {}: {}",
                    self.descriptor, other
                )),
            })?;

        let session = Session::new(transport);
        tracing::debug!(session_id = session.id(), "dialed new session");
        Ok(session)
    }
}

impl SessionFactory for SessionPool {
    async fn acquire(&self) -> Result<Session> {
        async {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Establish(format!(
                    "session pool for {} is closed",
                    self.descriptor
                )));
            }

            let started = Instant::now();
            let permit = tokio::time::timeout(self.config.acquire_timeout, self.permits.acquire())
                .await
                .map_err(|_| {
                    Error::Establish(format!(
                        "timed out after {:?} waiting for a session to {}",
                        self.config.acquire_timeout, self.descriptor
                    ))
                })?
                .map_err(|_| {
                    Error::Establish(format!("session pool for {} is closed", self.descriptor))
                })?;

            // On failure the permit drops here and the slot is freed again
            let (mut session, reused) = match self.take_idle().await {
                Some(session) => (session, true),
                None => (self.dial().await?, false),
            };
            permit.forget();
            session.touch();

            counters::session_acquired(reused);
            histograms::acquire_duration(started.elapsed().as_millis() as u64);
            tracing::debug!(session_id = session.id(), reused, "session acquired");
            Ok(session)
        }
        .instrument(tracing::debug_span!("acquire", descriptor = %self.descriptor))
        .await
    }

    async fn release(&self, mut session: Session) {
        let _slot = SlotReturn(&self.permits);
        let session_id = session.id();

        if !session.is_valid() {
            discard(session, "invalid").await;
        } else if self.closed.load(Ordering::SeqCst) {
            discard(session, "pool closed").await;
        } else {
            session.touch();
            let overflow = {
                let mut idle = self.idle.lock().await;
                if idle.len() < self.config.max_idle {
                    idle.push(session);
                    None
                } else {
                    Some(session)
                }
            };
            match overflow {
                Some(session) => discard(session, "idle list full").await,
                None => {
                    counters::session_released(labels::OUTCOME_POOLED);
                    tracing::debug!(session_id, "session returned to pool");
                }
            }
        }
    }

    fn connection_descriptor(&self) -> &str {
        &self.descriptor
    }
}

/// Gives one slot back to the pool when dropped, including when a release
/// future is dropped part-way
struct SlotReturn<'a>(&'a Semaphore);

impl Drop for SlotReturn<'_> {
    fn drop(&mut self) {
        self.0.add_permits(1);
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("descriptor", &self.descriptor)
            .field("max_size", &self.config.max_size)
            .field("available", &self.permits.available_permits())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

/// Shut a session down; errors are logged and swallowed
async fn discard(session: Session, reason: &'static str) {
    let session_id = session.id();
    if let Err(e) = session.shutdown().await {
        tracing::debug!(session_id, error = %e, "error shutting down session");
    }
    counters::session_released(labels::OUTCOME_DISCARDED);
    tracing::debug!(session_id, reason, "session discarded");
}
