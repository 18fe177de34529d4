//! Prometheus metrics collection for oscard.
//!
//! Tracks session population, chat-room population and relay health. The
//! embedding server exposes [`gather_metrics`] on its own HTTP endpoint.

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

lazy_static! {
    /// Global Prometheus registry for all metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    // ========================================================================
    // Counters (monotonic increasing)
    // ========================================================================

    /// Total SNAC messages successfully enqueued to recipient mailboxes.
    pub static ref MESSAGES_RELAYED: IntCounter = IntCounter::new(
        "oscar_messages_relayed_total",
        "Messages enqueued to recipient mailboxes"
    ).unwrap();

    /// Sessions closed because their mailbox overflowed.
    pub static ref RELAY_QUEUE_FULL_CLOSES: IntCounter = IntCounter::new(
        "oscar_relay_queue_full_closes_total",
        "Sessions closed on mailbox overflow"
    ).unwrap();

    /// Sessions closed by the rate limiter's disconnect threshold.
    pub static ref RATE_LIMIT_DISCONNECTS: IntCounter = IntCounter::new(
        "oscar_rate_limit_disconnects_total",
        "Sessions closed for flooding"
    ).unwrap();

    // ========================================================================
    // Gauges (can increase/decrease)
    // ========================================================================

    /// Currently signed-on sessions.
    pub static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "oscar_active_sessions",
        "Currently signed-on sessions"
    ).unwrap();

    /// Chat rooms with at least one occupant.
    pub static ref ACTIVE_CHAT_ROOMS: IntGauge = IntGauge::new(
        "oscar_active_chat_rooms",
        "Occupied chat rooms"
    ).unwrap();
}

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    REGISTRY
        .register(Box::new(MESSAGES_RELAYED.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RELAY_QUEUE_FULL_CLOSES.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(RATE_LIMIT_DISCONNECTS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(ACTIVE_SESSIONS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(ACTIVE_CHAT_ROOMS.clone()))
        .unwrap();
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
