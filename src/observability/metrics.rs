//! Metrics collection and exposition.
//!
//! # Metrics
//! - `cancel_timers_armed_total` (counter): underlying timers armed, by provider
//! - `cancel_timers_fired_total` (counter): timers that reached their deadline
//! - `cancel_timers_released_total` (counter): timer handles released
//! - `cancel_timers_live` (gauge): armed timers not yet released
//! - `cancel_coalesced_hits_total` (counter): requests served from an existing bucket
//! - `cancel_buckets` (gauge): coalescing map size
//! - `cancel_pool_rearms_total` (counter): pooled slots rearmed
//! - `cancel_pool_fallbacks_total` (counter): pooled requests served unpooled, by reason
//! - `cancel_linked_releases_total` (counter): linked registrations released, by path
//! - `cancel_root_registrations` (gauge): callbacks attached to the soak root signal
//!
//! # Design Decisions
//! - Recording is a handful of atomic ops; no recorder installed means no-op
//! - Prometheus exposition is opt-in from the binary

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_timer_armed(provider: &'static str) {
    counter!("cancel_timers_armed_total", "provider" => provider).increment(1);
}

pub fn record_timer_fired(provider: &'static str) {
    counter!("cancel_timers_fired_total", "provider" => provider).increment(1);
}

pub fn record_timer_released(provider: &'static str) {
    counter!("cancel_timers_released_total", "provider" => provider).increment(1);
}

pub fn record_live_timers(provider: &'static str, live: usize) {
    gauge!("cancel_timers_live", "provider" => provider).set(live as f64);
}

pub fn record_coalesced_hit() {
    counter!("cancel_coalesced_hits_total").increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("cancel_buckets").set(count as f64);
}

pub fn record_pool_rearm() {
    counter!("cancel_pool_rearms_total").increment(1);
}

pub fn record_pool_fallback(reason: &'static str) {
    counter!("cancel_pool_fallbacks_total", "reason" => reason).increment(1);
}

pub fn record_linked_release(path: &'static str) {
    counter!("cancel_linked_releases_total", "path" => path).increment(1);
}

pub fn record_root_registrations(count: usize) {
    gauge!("cancel_root_registrations").set(count as f64);
}
