//! Connection facade over a real TCP session pool
//!
//! Run with: cargo test --test pool_integration

mod common;

use common::{init_tracing, serve};
use docwire::protocol::{QueryMessage, ReplyMessage};
use docwire::{Connection, ConnectionInfo, ConnectionState, PoolConfig, SessionPool};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Echo server on a random local port; each accepted socket serves at most
/// `max_requests` requests before the server hangs up
async fn start_server(max_requests: Option<usize>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream, max_requests));
        }
    });
    port
}

fn pool(port: u16, config: PoolConfig) -> Arc<SessionPool> {
    let info = ConnectionInfo::parse(&format!("docdb://app@127.0.0.1:{}/test", port)).unwrap();
    Arc::new(SessionPool::new(info, config).unwrap())
}

#[tokio::test]
async fn test_query_through_pool() {
    init_tracing();
    let port = start_server(None).await;
    let pool = Arc::new(
        SessionPool::from_connection_string(&format!("docdb://app@127.0.0.1:{}/test", port))
            .unwrap(),
    );
    let conn = Connection::new(Arc::clone(&pool));
    conn.open().await.unwrap();

    let query = QueryMessage::new("users", json!({ "active": true })).unwrap();
    let reply: ReplyMessage = conn.send_and_receive(&query).await.unwrap();
    assert_eq!(reply.documents()[0]["query"]["active"], true);

    let status = pool.status().await;
    assert_eq!(status.in_use, 1);
    assert_eq!(status.idle, 0);

    conn.dispose().await;
    let status = pool.status().await;
    assert_eq!(status.in_use, 0);
    assert_eq!(status.idle, 1);
}

#[tokio::test]
async fn test_reopen_reuses_pooled_session() {
    let port = start_server(None).await;
    let pool = pool(port, PoolConfig::new());
    let conn = Connection::new(Arc::clone(&pool));

    conn.open().await.unwrap();
    let first = conn.session_id().await;
    conn.close().await;

    conn.open().await.unwrap();
    assert_eq!(conn.session_id().await, first);
}

#[tokio::test]
async fn test_server_hangup_is_survived_by_replacement() {
    init_tracing();
    // Every socket is good for exactly one request
    let port = start_server(Some(1)).await;
    let pool = pool(port, PoolConfig::new());
    let conn = Connection::new(Arc::clone(&pool));
    conn.open().await.unwrap();

    let first = QueryMessage::new("orders", json!({ "n": 1 })).unwrap();
    let _: ReplyMessage = conn.send_and_receive(&first).await.unwrap();
    let original = conn.session_id().await;

    let second = QueryMessage::new("orders", json!({ "n": 2 })).unwrap();
    let err = conn
        .send_and_receive::<_, ReplyMessage>(&second)
        .await
        .unwrap_err();
    assert!(err.is_transport_failure(), "unexpected error: {:?}", err);
    assert_eq!(conn.state(), ConnectionState::Opened);
    assert_ne!(conn.session_id().await, original);

    let third = QueryMessage::new("orders", json!({ "n": 3 })).unwrap();
    let reply: ReplyMessage = conn.send_and_receive(&third).await.unwrap();
    assert_eq!(reply.documents()[0]["query"]["n"], 3);

    // The broken session was discarded, not pooled
    let status = pool.status().await;
    assert_eq!(status.in_use, 1);
    assert_eq!(status.idle, 0);
}

#[tokio::test]
async fn test_handles_share_pool() {
    let port = start_server(None).await;
    let pool = pool(port, PoolConfig::new().max_size(4));

    let handles: Vec<_> = (0..4)
        .map(|_| Arc::new(Connection::new(Arc::clone(&pool))))
        .collect();
    for conn in &handles {
        conn.open().await.unwrap();
    }

    let requests = handles.iter().enumerate().map(|(n, conn)| async move {
        let query = QueryMessage::new("users", json!({ "n": n })).unwrap();
        let reply: ReplyMessage = conn.send_and_receive(&query).await.unwrap();
        reply.documents()[0]["query"]["n"].as_u64().unwrap() as usize
    });
    let answered = futures::future::join_all(requests).await;
    assert_eq!(answered, vec![0, 1, 2, 3]);

    assert_eq!(pool.status().await.in_use, 4);
    for conn in &handles {
        conn.dispose().await;
    }
    let status = pool.status().await;
    assert_eq!(status.in_use, 0);
    assert_eq!(status.idle, 4);
}

#[tokio::test]
async fn test_open_fails_when_pool_exhausted() {
    let port = start_server(None).await;
    let pool = pool(
        port,
        PoolConfig::new()
            .max_size(1)
            .acquire_timeout(Duration::from_millis(50)),
    );

    let holder = Connection::new(Arc::clone(&pool));
    holder.open().await.unwrap();

    let waiter = Connection::new(Arc::clone(&pool));
    let err = waiter.open().await.unwrap_err();
    assert!(matches!(err, docwire::Error::Establish(_)));
    assert_eq!(waiter.state(), ConnectionState::Closed);

    holder.close().await;
    waiter.open().await.unwrap();
    assert_eq!(waiter.state(), ConnectionState::Opened);
}

#[tokio::test]
async fn test_open_against_dead_server() {
    // Bind then drop to get a port nobody listens on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let pool = pool(port, PoolConfig::new());
    let conn = Connection::new(pool);

    let err = conn.open().await.unwrap_err();
    assert!(err.is_retriable());
    assert!(!err.is_transport_failure());
    assert_eq!(conn.state(), ConnectionState::Closed);
}
