//! Metrics collection for Warden operations
//!
//! Provides structured metrics using the `metrics` crate facade; the host
//! process chooses the exporter (Prometheus or otherwise).

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initialize all metric descriptions
pub fn init_metrics_descriptions() {
    // Key set provider metrics
    describe_counter!(
        "warden_keyset_cache_hits_total",
        "Total number of key set requests served from the cached handle"
    );
    describe_counter!(
        "warden_keyset_cache_misses_total",
        "Total number of key set requests that required a fetch"
    );
    describe_counter!(
        "warden_keyset_refresh_total",
        "Total number of key set fetch attempts"
    );
    describe_counter!(
        "warden_keyset_refresh_errors_total",
        "Total number of failed key set fetch attempts"
    );
    describe_counter!(
        "warden_keyset_stale_served_total",
        "Total number of key set requests served a stale handle after a failed refresh"
    );
    describe_histogram!(
        "warden_keyset_fetch_duration_seconds",
        "Duration of key set fetches in seconds"
    );

    // Token verification metrics
    describe_counter!(
        "warden_verifications_total",
        "Total number of token verifications by result"
    );
    describe_counter!(
        "warden_verification_retries_total",
        "Total number of verification attempts retried after a transient failure"
    );
    describe_histogram!(
        "warden_verification_duration_seconds",
        "Duration of token verifications in seconds"
    );

    // Metadata cache metrics
    describe_counter!(
        "warden_metadata_cache_hits_total",
        "Total number of metadata cache hits"
    );
    describe_counter!(
        "warden_metadata_cache_misses_total",
        "Total number of metadata cache misses"
    );
    describe_counter!(
        "warden_metadata_cache_invalidations_total",
        "Total number of metadata cache invalidations"
    );
    describe_gauge!(
        "warden_metadata_cache_entries",
        "Current number of entries in the metadata cache"
    );
}

/// Record a key set request served from the cached handle
pub fn record_keyset_cache_hit() {
    counter!("warden_keyset_cache_hits_total").increment(1);
}

/// Record a key set request that required a fetch
pub fn record_keyset_cache_miss() {
    counter!("warden_keyset_cache_misses_total").increment(1);
}

/// Record a key set fetch attempt
pub fn record_keyset_refresh(duration_seconds: f64, success: bool) {
    counter!("warden_keyset_refresh_total").increment(1);

    if !success {
        counter!("warden_keyset_refresh_errors_total").increment(1);
    }

    histogram!("warden_keyset_fetch_duration_seconds").record(duration_seconds);
}

/// Record a stale key set handle served after a failed refresh
pub fn record_keyset_stale_served() {
    counter!("warden_keyset_stale_served_total").increment(1);
}

/// Record the outcome of a token verification
pub fn record_verification(result: &'static str, duration_seconds: f64) {
    counter!("warden_verifications_total", "result" => result).increment(1);
    histogram!("warden_verification_duration_seconds").record(duration_seconds);
}

/// Record a verification attempt retried after a transient failure
pub fn record_verification_retry() {
    counter!("warden_verification_retries_total").increment(1);
}

/// Record a metadata cache hit
pub fn record_metadata_cache_hit() {
    counter!("warden_metadata_cache_hits_total").increment(1);
}

/// Record a metadata cache miss
pub fn record_metadata_cache_miss() {
    counter!("warden_metadata_cache_misses_total").increment(1);
}

/// Record a metadata cache invalidation
pub fn record_metadata_cache_invalidation() {
    counter!("warden_metadata_cache_invalidations_total").increment(1);
}

/// Update the metadata cache entry gauge
pub fn set_metadata_cache_entries(count: u64) {
    gauge!("warden_metadata_cache_entries").set(count as f64);
}
