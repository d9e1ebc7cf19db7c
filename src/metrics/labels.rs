//! Metric label keys and values

/// Request kind label key
pub const KIND: &str = "kind";

/// Outcome/status label key
pub const STATUS: &str = "status";

/// Operation label key
pub const OPERATION: &str = "operation";

/// Release outcome label key
pub const OUTCOME: &str = "outcome";

/// Request expecting a reply
pub const KIND_TWO_WAY: &str = "two_way";

/// Request with no reply
pub const KIND_ONE_WAY: &str = "one_way";

/// Operation: `send_and_receive`
pub const OPERATION_SEND_AND_RECEIVE: &str = "send_and_receive";

/// Operation: `send`
pub const OPERATION_SEND: &str = "send";

/// Session went back to the idle list
pub const OUTCOME_POOLED: &str = "pooled";

/// Session was shut down
pub const OUTCOME_DISCARDED: &str = "discarded";

/// Request succeeded
pub const STATUS_OK: &str = "ok";
