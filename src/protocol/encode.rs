//! Protocol message encoding

use super::constants::{op, HEADER_LEN, MAX_MESSAGE_LENGTH};
use bytes::{BufMut, BytesMut};
use std::io;

/// Encode a query frame
pub fn encode_query(
    request_id: i32,
    flags: i32,
    collection: &str,
    skip: i32,
    limit: i32,
    query: &[u8],
) -> io::Result<BytesMut> {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + collection.len() + query.len() + 17);
    begin_frame(&mut buf, request_id, 0, op::QUERY);

    buf.put_i32_le(flags);
    put_cstring(&mut buf, collection)?;
    buf.put_i32_le(skip);
    buf.put_i32_le(limit);
    put_document(&mut buf, query)?;

    finish_frame(buf)
}

/// Encode an insert frame
pub fn encode_insert(
    request_id: i32,
    flags: i32,
    collection: &str,
    documents: &[Vec<u8>],
) -> io::Result<BytesMut> {
    if documents.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "insert requires at least one document",
        ));
    }

    let payload: usize = documents.iter().map(|d| d.len() + 4).sum();
    let mut buf = BytesMut::with_capacity(HEADER_LEN + collection.len() + payload + 5);
    begin_frame(&mut buf, request_id, 0, op::INSERT);

    buf.put_i32_le(flags);
    put_cstring(&mut buf, collection)?;
    for document in documents {
        put_document(&mut buf, document)?;
    }

    finish_frame(buf)
}

/// Encode a reply frame
///
/// Clients never send replies; this is for servers, proxies and test peers
/// speaking the same protocol.
pub fn encode_reply(
    request_id: i32,
    response_to: i32,
    flags: i32,
    cursor_id: i64,
    starting_from: i32,
    documents: &[Vec<u8>],
) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();
    begin_frame(&mut buf, request_id, response_to, op::REPLY);

    buf.put_i32_le(flags);
    buf.put_i64_le(cursor_id);
    buf.put_i32_le(starting_from);
    buf.put_i32_le(documents.len() as i32);
    for document in documents {
        put_document(&mut buf, document)?;
    }

    finish_frame(buf)
}

fn begin_frame(buf: &mut BytesMut, request_id: i32, response_to: i32, op_code: i32) {
    // Length is filled in by finish_frame
    buf.put_i32_le(0);
    buf.put_i32_le(request_id);
    buf.put_i32_le(response_to);
    buf.put_i32_le(op_code);
}

fn finish_frame(mut buf: BytesMut) -> io::Result<BytesMut> {
    let len = buf.len();
    if len > MAX_MESSAGE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "message length {} exceeds maximum allowed {}",
                len, MAX_MESSAGE_LENGTH
            ),
        ));
    }
    buf[0..4].copy_from_slice(&(len as i32).to_le_bytes());
    Ok(buf)
}

fn put_cstring(buf: &mut BytesMut, s: &str) -> io::Result<()> {
    if s.as_bytes().contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "collection name contains a NUL byte",
        ));
    }
    buf.put(s.as_bytes());
    buf.put_u8(0);
    Ok(())
}

fn put_document(buf: &mut BytesMut, document: &[u8]) -> io::Result<()> {
    if document.len() > MAX_MESSAGE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("document of {} bytes is too large", document.len()),
        ));
    }
    buf.put_i32_le(document.len() as i32);
    buf.put_slice(document);
    Ok(())
}
