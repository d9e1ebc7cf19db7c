//! Session factory contract

use super::Session;
use crate::Result;
use std::future::Future;

/// Source of sessions for a [`Connection`](crate::Connection).
///
/// Every method may be called concurrently from many connections sharing
/// the same factory.
pub trait SessionFactory: Send + Sync + 'static {
    /// Hand out a usable session.
    ///
    /// Fails with [`Error::Establish`](crate::Error::Establish) when no
    /// session can be produced (unreachable server, pool exhausted).
    fn acquire(&self) -> impl Future<Output = Result<Session>> + Send;

    /// Take a session back.
    ///
    /// Valid sessions may be kept for reuse; invalid ones must be discarded.
    /// Never fails: problems during cleanup are logged and swallowed.
    fn release(&self, session: Session) -> impl Future<Output = ()> + Send;

    /// Password-free description of the server, for diagnostics
    fn connection_descriptor(&self) -> &str;
}
