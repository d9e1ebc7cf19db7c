//! Protocol message decoding

use super::constants::{op, HEADER_LEN, MAX_MESSAGE_LENGTH};
use super::document::DocumentFactory;
use super::message::{MessageHeader, ReplyMessage};
use crate::{Error, Result};
use bytes::Buf;
use std::io;

/// Decode and validate a frame header
///
/// Header problems mean the stream can no longer be trusted to be aligned on
/// a frame boundary, so they are reported as `InvalidData` I/O errors.
pub fn decode_header(data: &[u8; HEADER_LEN]) -> io::Result<MessageHeader> {
    let mut buf = &data[..];
    let length = buf.get_i32_le();
    let request_id = buf.get_i32_le();
    let response_to = buf.get_i32_le();
    let op_code = buf.get_i32_le();

    if length < HEADER_LEN as i32 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("message length {} is shorter than the header", length),
        ));
    }

    if length as usize > MAX_MESSAGE_LENGTH {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "message length {} exceeds maximum allowed {}",
                length, MAX_MESSAGE_LENGTH
            ),
        ));
    }

    Ok(MessageHeader {
        length,
        request_id,
        response_to,
        op_code,
    })
}

/// Decode the body of a reply frame
///
/// The whole frame has already been consumed from the stream, so malformed
/// bodies are protocol errors rather than transport failures.
pub fn decode_reply(
    header: MessageHeader,
    body: &[u8],
    documents: &dyn DocumentFactory,
) -> Result<ReplyMessage> {
    if header.op_code != op::REPLY {
        return Err(Error::Protocol(format!(
            "expected reply op code {}, got {}",
            op::REPLY,
            header.op_code
        )));
    }

    let mut buf = body;
    if buf.remaining() < 20 {
        return Err(Error::Protocol("reply body too short".into()));
    }

    let flags = buf.get_i32_le();
    let cursor_id = buf.get_i64_le();
    let starting_from = buf.get_i32_le();
    let number_returned = buf.get_i32_le();

    if number_returned < 0 {
        return Err(Error::Protocol(format!(
            "negative document count {}",
            number_returned
        )));
    }

    let mut docs = Vec::with_capacity((number_returned as usize).min(1024));
    for index in 0..number_returned {
        if buf.remaining() < 4 {
            return Err(Error::Protocol(format!(
                "document {} length missing",
                index
            )));
        }
        let len = buf.get_i32_le();
        if len < 0 || len as usize > buf.remaining() {
            return Err(Error::Protocol(format!(
                "document {} length {} out of bounds",
                index, len
            )));
        }
        let (raw, rest) = buf.split_at(len as usize);
        docs.push(documents.build(raw)?);
        buf = rest;
    }

    if buf.has_remaining() {
        return Err(Error::Protocol(format!(
            "{} trailing bytes after reply documents",
            buf.remaining()
        )));
    }

    Ok(ReplyMessage {
        header,
        flags,
        cursor_id,
        starting_from,
        documents: docs,
    })
}
