//! Connection management
//!
//! This module handles:
//! * Transport abstraction (TCP vs Unix socket vs caller-supplied stream)
//! * The resilient connection facade and its open/closed lifecycle
//! * Session replacement after transport failures

mod conn;
mod state;
mod transport;

pub use conn::{Connection, SessionStream};
pub use state::ConnectionState;
pub use transport::{AsyncStream, Transport};
