//! Prometheus metrics for the pairchat server
//!
//! Provides centralized metrics collection for monitoring:
//! - Live connections and message fan-out
//! - Unseen-counter (offline path) activity
//! - Persistence job lifecycle

use anyhow::Result;
use once_cell::sync::Lazy;
use prometheus::{
    opts, register_histogram, register_int_counter, register_int_gauge, Encoder, Histogram,
    IntCounter, IntGauge, TextEncoder,
};

// ============================================================================
// Connection Metrics
// ============================================================================

/// Currently registered live sessions
pub static ACTIVE_CONNECTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(opts!(
        "pairchat_active_connections",
        "Number of live sessions in the connection registry"
    ))
    .expect("Failed to register ACTIVE_CONNECTIONS metric")
});

/// Total websocket upgrades accepted
pub static CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_connections_total",
        "Total number of accepted websocket connections"
    ))
    .expect("Failed to register CONNECTIONS_TOTAL metric")
});

// ============================================================================
// Message Metrics
// ============================================================================

/// Total number of messages accepted by the router
pub static MESSAGES_SENT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_messages_sent_total",
        "Total number of messages sent"
    ))
    .expect("Failed to register MESSAGES_SENT_TOTAL metric")
});

/// Copies pushed to sockets in a conversation room
pub static LIVE_DELIVERIES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_live_deliveries_total",
        "Total number of message copies pushed to live sockets"
    ))
    .expect("Failed to register LIVE_DELIVERIES_TOTAL metric")
});

/// Messages that took the offline path (receiver not in the room)
pub static UNSEEN_INCREMENTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_unseen_increments_total",
        "Total number of unseen counter increments"
    ))
    .expect("Failed to register UNSEEN_INCREMENTS_TOTAL metric")
});

/// Time from receiving a send frame to finishing live fan-out
pub static SEND_FANOUT_SECONDS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "pairchat_send_fanout_seconds",
        "Latency of the synchronous part of the send path",
        vec![0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register SEND_FANOUT_SECONDS metric")
});

// ============================================================================
// Persistence Metrics
// ============================================================================

pub static PERSIST_JOBS_ENQUEUED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_persist_jobs_enqueued_total",
        "Persistence jobs enqueued (after deduplication)"
    ))
    .expect("Failed to register PERSIST_JOBS_ENQUEUED metric")
});

pub static PERSIST_JOBS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_persist_jobs_completed_total",
        "Persistence jobs that drained successfully"
    ))
    .expect("Failed to register PERSIST_JOBS_COMPLETED metric")
});

pub static PERSIST_JOBS_FAILED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_persist_jobs_failed_total",
        "Persistence job attempts that failed"
    ))
    .expect("Failed to register PERSIST_JOBS_FAILED metric")
});

pub static PERSIST_JOBS_DEAD_LETTERED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_persist_jobs_dead_lettered_total",
        "Persistence jobs moved to the dead letter list"
    ))
    .expect("Failed to register PERSIST_JOBS_DEAD_LETTERED metric")
});

pub static MESSAGES_PERSISTED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(opts!(
        "pairchat_messages_persisted_total",
        "Messages written to the durable store by drains"
    ))
    .expect("Failed to register MESSAGES_PERSISTED_TOTAL metric")
});

// ============================================================================
// Metrics Collection
// ============================================================================

/// Gather all registered metrics and encode as Prometheus text format
pub fn gather_metrics() -> Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode(&metric_families, &mut buffer)?;

    Ok(String::from_utf8(buffer)?)
}
