//! Default wire protocol
//!
//! Requests write themselves onto a [`Transport`](crate::connection::Transport)
//! and replies read themselves off it. The connection facade only relies on
//! the [`Request`] and [`Reply`] traits; the message types here are the
//! stock implementation:
//!
//! * 16-byte little-endian header (`length`, `request_id`, `response_to`, `op_code`)
//! * [`QueryMessage`] (two-way), [`InsertMessage`] (one-way), [`ReplyMessage`]
//! * length-prefixed JSON documents, built through a [`DocumentFactory`]

pub mod constants;
pub mod decode;
pub mod document;
pub mod encode;
pub mod message;

pub use decode::decode_header;
pub use document::{Document, DocumentFactory, JsonDocumentFactory};
pub use encode::encode_reply;
pub use message::{
    next_request_id, InsertMessage, MessageHeader, QueryMessage, Reply, ReplyMessage, Request,
};
