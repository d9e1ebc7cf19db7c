//! Shared test peers and factories
#![allow(dead_code)]

use docwire::connection::Transport;
use docwire::protocol::constants::{op, HEADER_LEN};
use docwire::protocol::{decode_header, encode_reply};
use docwire::{Error, Result, Session, SessionFactory};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

/// Route logs to the test harness; `RUST_LOG=docwire=debug` to see them
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Serve requests until the peer goes away or `max_requests` are handled.
///
/// Queries are answered with one document `{"echo": <request_id>,
/// "collection": <name>, "query": <query document>}`; inserts get no reply.
pub async fn serve<S>(mut stream: S, max_requests: Option<usize>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut served = 0;
    loop {
        if max_requests.is_some_and(|max| served >= max) {
            return;
        }

        let mut raw = [0u8; HEADER_LEN];
        if stream.read_exact(&mut raw).await.is_err() {
            return;
        }
        let header = match decode_header(&raw) {
            Ok(header) => header,
            Err(_) => return,
        };
        let mut body = vec![0u8; header.body_len()];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }
        served += 1;

        if header.op_code != op::QUERY {
            continue;
        }

        let (collection, query) = parse_query(&body);
        let doc = json!({
            "echo": header.request_id,
            "collection": collection,
            "query": query,
        });
        let reply = encode_reply(
            0,
            header.request_id,
            0,
            0,
            0,
            &[serde_json::to_vec(&doc).unwrap()],
        )
        .unwrap();
        if stream.write_all(&reply).await.is_err() {
            return;
        }
    }
}

/// Collection name and query document of a query body
pub fn parse_query(body: &[u8]) -> (String, serde_json::Value) {
    let rest = &body[4..];
    let nul = rest.iter().position(|&b| b == 0).unwrap();
    let collection = String::from_utf8(rest[..nul].to_vec()).unwrap();
    // skip + limit + document length
    let doc = &rest[nul + 1 + 12..];
    (collection, serde_json::from_slice(doc).unwrap())
}

/// Spawn an in-memory peer and return the client side
pub fn spawn_peer(max_requests: Option<usize>) -> (Transport, JoinHandle<()>) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let handle = tokio::spawn(serve(server, max_requests));
    (Transport::from_stream(client), handle)
}

/// Factory over in-memory peers that records every call.
///
/// Transports queued with [`MockFactory::push`] are handed out first; after
/// that each acquire spawns a fresh echo peer.
#[derive(Default)]
pub struct MockFactory {
    acquires: AtomicUsize,
    releases: AtomicUsize,
    refuse: AtomicBool,
    stall_acquire: AtomicBool,
    release_delay_ms: AtomicU64,
    queued: Mutex<VecDeque<Transport>>,
    released: Mutex<Vec<(u64, bool)>>,
    peers: Mutex<Vec<JoinHandle<()>>>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out `transport` on a later acquire
    pub fn push(&self, transport: Transport) {
        self.queued.lock().unwrap().push_back(transport);
    }

    /// Make every later acquire fail
    pub fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make every later acquire hang forever
    pub fn stall_acquire(&self, stall: bool) {
        self.stall_acquire.store(stall, Ordering::SeqCst);
    }

    /// Delay every later release; the release is only counted once the
    /// delay has passed
    pub fn delay_release(&self, delay: Duration) {
        self.release_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// `(session id, was valid)` for every release, in order
    pub fn released(&self) -> Vec<(u64, bool)> {
        self.released.lock().unwrap().clone()
    }

    /// Abort every spawned peer, dropping its end of the pipe
    pub async fn kill_peers(&self) {
        let peers: Vec<_> = self.peers.lock().unwrap().drain(..).collect();
        for peer in peers {
            peer.abort();
            let _ = peer.await;
        }
    }
}

impl SessionFactory for MockFactory {
    async fn acquire(&self) -> Result<Session> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Establish("mock factory refused".into()));
        }
        if self.stall_acquire.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        if let Some(transport) = self.queued.lock().unwrap().pop_front() {
            return Ok(Session::new(transport));
        }

        let (transport, peer) = spawn_peer(None);
        self.peers.lock().unwrap().push(peer);
        Ok(Session::new(transport))
    }

    async fn release(&self, session: Session) {
        let delay = self.release_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.released
            .lock()
            .unwrap()
            .push((session.id(), session.is_valid()));
    }

    fn connection_descriptor(&self) -> &str {
        "docdb://test@mock:27017/test"
    }
}
