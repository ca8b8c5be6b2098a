// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the prioritization engine.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `query_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//! - `_bytes` suffix for sizes
//!
//! # Labels
//! - `priority`: critical, high, medium, low, background
//! - `reason`: pressure, tags, explicit
//! - `pass`: pressure, sweep

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

use crate::metadata::Priority;

/// Record a new registration
pub fn record_registration(priority: Priority) {
    counter!(
        "query_cache_registrations_total",
        "priority" => priority.as_str()
    )
    .increment(1);
}

/// Record a tier change (re-registration, explicit update or demotion)
pub fn record_priority_change(from: Priority, to: Priority) {
    counter!(
        "query_cache_priority_changes_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Record evictions
pub fn record_eviction(reason: &'static str, count: usize, bytes: usize) {
    counter!("query_cache_evictions_total", "reason" => reason).increment(count as u64);
    counter!("query_cache_evicted_bytes_total", "reason" => reason).increment(bytes as u64);
}

/// Record TTL expirations
pub fn record_expiration(count: usize, bytes: usize) {
    counter!("query_cache_expirations_total").increment(count as u64);
    counter!("query_cache_expired_bytes_total").increment(bytes as u64);
}

/// Record a removal the external cache refused
pub fn record_removal_failure() {
    counter!("query_cache_removal_failures_total").increment(1);
}

/// Record a maintenance pass skipped because the previous one was still running
pub fn record_skipped_pass(pass: &'static str) {
    counter!("query_cache_skipped_passes_total", "pass" => pass).increment(1);
}

/// Record a maintenance tick that failed or panicked
pub fn record_tick_failure(pass: &'static str) {
    counter!("query_cache_tick_failures_total", "pass" => pass).increment(1);
}

/// Record maintenance pass duration
pub fn record_pass_duration(pass: &'static str, duration: Duration) {
    histogram!("query_cache_pass_seconds", "pass" => pass).record(duration.as_secs_f64());
}

/// Set tracked bytes
pub fn set_tracked_bytes(bytes: usize) {
    gauge!("query_cache_tracked_bytes").set(bytes as f64);
}

/// Set tracked entry count
pub fn set_tracked_entries(count: usize) {
    gauge!("query_cache_tracked_entries").set(count as f64);
}

/// Set memory pressure ratio (0.0 - 1.0+)
pub fn set_memory_pressure(pressure: f64) {
    gauge!("query_cache_memory_pressure").set(pressure);
}

/// Set pressure level (0 = Normal, 1 = Soft, 2 = Critical)
pub fn set_pressure_level(level: u8) {
    gauge!("query_cache_pressure_level").set(level as f64);
}

/// A timing guard that records pass duration on drop
pub struct PassTimer {
    pass: &'static str,
    start: Instant,
}

impl PassTimer {
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            start: Instant::now(),
        }
    }
}

impl Drop for PassTimer {
    fn drop(&mut self) {
        record_pass_duration(self.pass, self.start.elapsed());
    }
}
