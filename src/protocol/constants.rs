//! Wire protocol constants

/// Header size in bytes (`length`, `request_id`, `response_to`, `op_code`)
pub const HEADER_LEN: usize = 16;

/// Maximum frame length (48 MiB), header included
pub const MAX_MESSAGE_LENGTH: usize = 48 * 1024 * 1024;

/// Operation codes
pub mod op {
    /// Reply to a two-way request
    pub const REPLY: i32 = 1;

    /// Insert documents (one-way)
    pub const INSERT: i32 = 2002;

    /// Query a collection (two-way)
    pub const QUERY: i32 = 2004;
}

/// Reply flag bits
pub mod reply_flags {
    /// Cursor id in the request was not found on the server
    pub const CURSOR_NOT_FOUND: i32 = 1;

    /// Query failed; the first document describes the error
    pub const QUERY_FAILURE: i32 = 1 << 1;
}

/// Insert flag bits
pub mod insert_flags {
    /// Keep inserting the remaining documents after one fails
    pub const CONTINUE_ON_ERROR: i32 = 1;
}
