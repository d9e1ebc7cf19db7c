//! Physical sessions and where they come from
//!
//! This module handles:
//! * The [`Session`] wrapper around one live transport
//! * The [`SessionFactory`] contract a connection draws sessions from
//! * [`SessionPool`], the stock factory over TCP and Unix sockets
//! * Connection string parsing and pool configuration

mod config;
mod connection_string;
mod factory;
mod pool;

pub use config::PoolConfig;
pub use connection_string::{ConnectionInfo, TransportType};
pub use factory::SessionFactory;
pub use pool::{PoolStatus, SessionPool};

use crate::connection::Transport;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// One live physical connection to the server.
///
/// Sessions start valid and unauthenticated. Both flags only ever move one
/// way: `mark_authenticated` sets the first, `mark_invalid` clears the
/// second, and an invalid session is never handed out for traffic again.
pub struct Session {
    id: u64,
    transport: Transport,
    authenticated: bool,
    valid: bool,
    exchange_pending: bool,
    last_used: Instant,
}

impl Session {
    /// Wrap a connected transport
    pub fn new(transport: Transport) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            transport,
            authenticated: false,
            valid: true,
            exchange_pending: false,
            last_used: Instant::now(),
        }
    }

    /// Process-unique session id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Raw byte stream
    pub fn stream(&mut self) -> &mut Transport {
        &mut self.transport
    }

    /// Whether an auth handshake has completed on this session
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Record a successful auth handshake
    pub fn mark_authenticated(&mut self) {
        self.authenticated = true;
    }

    /// Whether the session may still carry traffic
    ///
    /// A session whose last request/reply exchange never finished (the
    /// caller's future was dropped mid-frame) is no longer aligned on a frame
    /// boundary and reports itself invalid.
    pub fn is_valid(&self) -> bool {
        self.valid && !self.exchange_pending
    }

    /// Permanently retire this session
    pub fn mark_invalid(&mut self) {
        self.valid = false;
    }

    pub(crate) fn begin_exchange(&mut self) {
        self.exchange_pending = true;
    }

    pub(crate) fn end_exchange(&mut self) {
        self.exchange_pending = false;
    }

    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub(crate) fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }

    /// Shut down the transport
    pub async fn shutdown(mut self) -> Result<()> {
        self.transport.shutdown().await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("transport", &self.transport)
            .field("authenticated", &self.authenticated)
            .field("valid", &self.valid)
            .finish()
    }
}
