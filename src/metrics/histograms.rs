//! Histogram metrics

use super::labels;

/// Time spent in a pool's `acquire`, including dialing a new transport
pub fn acquire_duration(duration_ms: u64) {
    metrics::histogram!("docwire_acquire_duration_ms").record(duration_ms as f64);
}

/// Time from writing a request to decoding its reply
pub fn round_trip_duration(duration_ms: u64) {
    metrics::histogram!(
        "docwire_round_trip_duration_ms",
        labels::KIND => labels::KIND_TWO_WAY
    )
    .record(duration_ms as f64);
}
