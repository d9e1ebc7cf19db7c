//! Counter metrics

use super::labels;

/// A session was handed out by a pool
pub fn session_acquired(reused: bool) {
    metrics::counter!("docwire_sessions_acquired_total", "reused" => reused.to_string())
        .increment(1);
}

/// A session was returned to a pool
pub fn session_released(outcome: &'static str) {
    metrics::counter!("docwire_sessions_released_total", labels::OUTCOME => outcome).increment(1);
}

/// A connection replaced its session after a transport failure
pub fn connection_replaced() {
    metrics::counter!("docwire_connection_replacements_total").increment(1);
}

/// A transport failure was observed during a request
pub fn transport_failure(operation: &'static str) {
    metrics::counter!("docwire_transport_failures_total", labels::OPERATION => operation)
        .increment(1);
}

/// A request completed, successfully or not
pub fn request_completed(kind: &'static str, status: &'static str) {
    metrics::counter!(
        "docwire_requests_total",
        labels::KIND => kind,
        labels::STATUS => status
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_without_recorder() {
        // No recorder installed: calls are no-ops and must not panic
        session_acquired(true);
        session_released(labels::OUTCOME_DISCARDED);
        connection_replaced();
        transport_failure(labels::OPERATION_SEND);
        request_completed(labels::KIND_ONE_WAY, labels::STATUS_OK);
    }
}
