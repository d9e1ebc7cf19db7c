//! Metrics for connection and session lifecycle
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.
//!
//! * `counters` - lifecycle and request counts
//! * `histograms` - acquire and round-trip latency
//! * `labels` - label keys and values shared by both

pub mod counters;
pub mod histograms;
pub mod labels;
