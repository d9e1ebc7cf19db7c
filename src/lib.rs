//! docwire - resilient connection facade for document database wire clients
//!
//! A [`Connection`] hands callers one logical handle over a pool of physical
//! sessions. Traffic through the handle is serialized, and a session whose
//! transport fails is swapped for a fresh one before the failure is returned,
//! so the next call on the same handle runs against a healthy session.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> docwire::Result<()> {
//! use docwire::protocol::{QueryMessage, ReplyMessage};
//! use docwire::{Connection, SessionPool};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let pool = Arc::new(SessionPool::from_connection_string("docdb://localhost:27017/app")?);
//! let conn = Connection::new(pool);
//! conn.open().await?;
//!
//! let query = QueryMessage::new("users", json!({ "active": true }))?;
//! let reply: ReplyMessage = conn.send_and_receive(&query).await?;
//! println!("{} documents", reply.documents().len());
//!
//! conn.dispose().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod session;

pub use connection::{Connection, ConnectionState};
pub use error::{Error, Result};
pub use session::{
    ConnectionInfo, PoolConfig, PoolStatus, Session, SessionFactory, SessionPool,
};
