//! Protocol message types

use super::constants::{op, reply_flags, HEADER_LEN};
use super::decode::{decode_header, decode_reply};
use super::document::{Document, DocumentFactory};
use super::encode::{encode_insert, encode_query};
use crate::connection::Transport;
use crate::{Error, Result};
use bytes::BytesMut;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicI32, Ordering};

static NEXT_REQUEST_ID: AtomicI32 = AtomicI32::new(1);

/// Allocate a process-wide request id
pub fn next_request_id() -> i32 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// A message that knows how to write itself onto a transport
pub trait Request: Send + Sync {
    /// Id a reply to this request must carry in `response_to`
    fn request_id(&self) -> i32;

    /// Write the complete message and flush
    fn write_to(&self, transport: &mut Transport) -> impl Future<Output = Result<()>> + Send;
}

/// A message that knows how to read itself off a transport
pub trait Reply: Sized + Send {
    /// Read one reply to `request_id`, building documents with `documents`
    fn read_from(
        transport: &mut Transport,
        request_id: i32,
        documents: &dyn DocumentFactory,
    ) -> impl Future<Output = Result<Self>> + Send;
}

/// Frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total frame length, header included
    pub length: i32,
    /// Sender-assigned id
    pub request_id: i32,
    /// Id of the request this frame answers (0 for requests)
    pub response_to: i32,
    /// Operation code
    pub op_code: i32,
}

impl MessageHeader {
    /// Length of the body following the header, zero if `length` does
    /// not even cover the header
    pub fn body_len(&self) -> usize {
        usize::try_from(self.length)
            .unwrap_or(0)
            .saturating_sub(HEADER_LEN)
    }
}

/// Two-way query against a collection
#[derive(Debug, Clone)]
pub struct QueryMessage {
    request_id: i32,
    collection: String,
    flags: i32,
    skip: i32,
    limit: i32,
    query: Vec<u8>,
}

impl QueryMessage {
    /// Create a query with a fresh request id
    pub fn new(collection: impl Into<String>, query: impl Serialize) -> Result<Self> {
        Ok(Self {
            request_id: next_request_id(),
            collection: collection.into(),
            flags: 0,
            skip: 0,
            limit: 0,
            query: serde_json::to_vec(&query)?,
        })
    }

    /// Skip the first `skip` matching documents
    pub fn skip(mut self, skip: i32) -> Self {
        self.skip = skip;
        self
    }

    /// Return at most `limit` documents (0 = server default)
    pub fn limit(mut self, limit: i32) -> Self {
        self.limit = limit;
        self
    }

    /// Set raw query flags
    pub fn flags(mut self, flags: i32) -> Self {
        self.flags = flags;
        self
    }

    /// Target collection
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Encode the complete frame
    pub fn to_bytes(&self) -> Result<BytesMut> {
        encode_query(
            self.request_id,
            self.flags,
            &self.collection,
            self.skip,
            self.limit,
            &self.query,
        )
        .map_err(encoding_error)
    }
}

impl Request for QueryMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }

    async fn write_to(&self, transport: &mut Transport) -> Result<()> {
        let frame = self.to_bytes()?;
        transport.write_all(&frame).await?;
        transport.flush().await
    }
}

/// One-way insert of documents into a collection
#[derive(Debug, Clone)]
pub struct InsertMessage {
    request_id: i32,
    collection: String,
    flags: i32,
    documents: Vec<Vec<u8>>,
}

impl InsertMessage {
    /// Create an insert with a fresh request id
    pub fn new<I, D>(collection: impl Into<String>, documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = D>,
        D: Serialize,
    {
        let documents = documents
            .into_iter()
            .map(|doc| serde_json::to_vec(&doc))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if documents.is_empty() {
            return Err(Error::Protocol(
                "insert requires at least one document".into(),
            ));
        }

        Ok(Self {
            request_id: next_request_id(),
            collection: collection.into(),
            flags: 0,
            documents,
        })
    }

    /// Keep inserting after an individual document fails
    pub fn continue_on_error(mut self) -> Self {
        self.flags |= super::constants::insert_flags::CONTINUE_ON_ERROR;
        self
    }

    /// Number of documents carried
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the insert carries no documents
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Encode the complete frame
    pub fn to_bytes(&self) -> Result<BytesMut> {
        encode_insert(self.request_id, self.flags, &self.collection, &self.documents)
            .map_err(encoding_error)
    }
}

impl Request for InsertMessage {
    fn request_id(&self) -> i32 {
        self.request_id
    }

    async fn write_to(&self, transport: &mut Transport) -> Result<()> {
        let frame = self.to_bytes()?;
        transport.write_all(&frame).await?;
        transport.flush().await
    }
}

/// Reply to a two-way request
#[derive(Debug, Clone)]
pub struct ReplyMessage {
    pub(super) header: MessageHeader,
    pub(super) flags: i32,
    pub(super) cursor_id: i64,
    pub(super) starting_from: i32,
    pub(super) documents: Vec<Document>,
}

impl ReplyMessage {
    /// Frame header
    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    /// Raw reply flags
    pub fn flags(&self) -> i32 {
        self.flags
    }

    /// Server cursor for fetching more results (0 when exhausted)
    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    /// Position of the first document in the cursor
    pub fn starting_from(&self) -> i32 {
        self.starting_from
    }

    /// Decoded documents
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Take the decoded documents
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    /// Whether the server flagged the query as failed
    pub fn is_query_failure(&self) -> bool {
        self.flags & reply_flags::QUERY_FAILURE != 0
    }

    /// Whether the server could not find the requested cursor
    pub fn is_cursor_not_found(&self) -> bool {
        self.flags & reply_flags::CURSOR_NOT_FOUND != 0
    }

    /// Turn a failure reply into `Error::Server`
    pub fn into_result(self) -> Result<Self> {
        if !self.is_query_failure() {
            return Ok(self);
        }

        let first = self.documents.first();
        let message = first
            .and_then(|doc| doc.get("$err"))
            .and_then(|err| err.as_str())
            .unwrap_or("query failed")
            .to_string();
        let code = first
            .and_then(|doc| doc.get("code"))
            .and_then(|code| code.as_i64())
            .unwrap_or(0) as i32;

        Err(Error::Server { code, message })
    }

    /// Deserialize every document into `T`
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.documents
            .iter()
            .map(|doc| T::deserialize(doc).map_err(Error::from))
            .collect()
    }
}

impl Reply for ReplyMessage {
    async fn read_from(
        transport: &mut Transport,
        request_id: i32,
        documents: &dyn DocumentFactory,
    ) -> Result<Self> {
        let mut raw_header = [0u8; HEADER_LEN];
        transport.read_exact(&mut raw_header).await?;
        let header = decode_header(&raw_header)?;

        let mut body = vec![0u8; header.body_len()];
        transport.read_exact(&mut body).await?;

        if header.op_code == op::REPLY && header.response_to != request_id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "reply answers request {}, expected {}",
                    header.response_to, request_id
                ),
            )
            .into());
        }

        decode_reply(header, &body, documents)
    }
}

/// Encoding failures are caught before any byte is written, so they are
/// reported as protocol errors rather than transport failures.
fn encoding_error(err: io::Error) -> Error {
    Error::Protocol(err.to_string())
}
