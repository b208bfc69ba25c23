//! Metric helpers for `trackwire`.
//!
//! This module defines metric names and thin wrappers around the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking active device connections.
pub const CONNECTIONS_ACTIVE: &str = "trackwire_connections_active";
/// Name of the counter tracking decoded messages by outcome.
pub const MESSAGES_TOTAL: &str = "trackwire_messages_total";
/// Name of the counter tracking ingestion forwards by result.
pub const FORWARDS_TOTAL: &str = "trackwire_forwards_total";
/// Name of the counter tracking connection-level errors.
pub const ERRORS_TOTAL: &str = "trackwire_errors_total";
/// Name of the counter tracking panicking connection tasks.
pub const CONNECTION_PANICS: &str = "trackwire_connection_panics_total";

/// What happened to a decoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Routed (possibly to zero routes) and acknowledged if it carried a count.
    Processed,
    /// Dropped before routing: malformed frame or failed asset lookup.
    Skipped,
}

impl MessageOutcome {
    /// Label value used when recording this outcome.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MessageOutcome::Processed => "processed",
            MessageOutcome::Skipped => "skipped",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a decoded message.
pub fn inc_messages(outcome: MessageOutcome) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_TOTAL, "outcome" => outcome.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = outcome;
}

/// Record a forward to an ingestion endpoint.
pub fn inc_forwards(success: bool) {
    #[cfg(feature = "metrics")]
    counter!(FORWARDS_TOTAL, "result" => if success { "ok" } else { "error" }).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = success;
}

/// Record a connection-level error.
pub fn inc_errors() {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL).increment(1);
}

/// Record a connection task panic.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
