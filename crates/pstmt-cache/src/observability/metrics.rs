//! Cache metrics emitted through the `metrics` facade.
//!
//! No recorder is installed here; the embedding application owns the
//! exporter. Every series is labelled with the cache name.

use metrics::{counter, describe_counter, describe_gauge, gauge};

const METRIC_CACHE_HITS: &str = "pstmt_cache_hits_total";
const METRIC_CACHE_MISSES: &str = "pstmt_cache_misses_total";
const METRIC_COMPILE_ERRORS: &str = "pstmt_cache_compile_errors_total";
const METRIC_DIRECT_FALLBACKS: &str = "pstmt_cache_direct_fallbacks_total";
const METRIC_CACHE_ENTRIES: &str = "pstmt_cache_entries";

/// Register metric descriptions with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(METRIC_CACHE_HITS, "Lookups answered by a cached handle");
    describe_counter!(METRIC_CACHE_MISSES, "Lookups that compiled query text");
    describe_counter!(METRIC_COMPILE_ERRORS, "Failed query text compilations");
    describe_counter!(
        METRIC_DIRECT_FALLBACKS,
        "Single-row calls executed uncached after a compile error"
    );
    describe_gauge!(METRIC_CACHE_ENTRIES, "Compiled handles currently cached");
}

pub fn record_cache_hit(cache: &str) {
    counter!(METRIC_CACHE_HITS, "cache" => cache.to_owned()).increment(1);
}

pub fn record_cache_miss(cache: &str) {
    counter!(METRIC_CACHE_MISSES, "cache" => cache.to_owned()).increment(1);
}

pub fn record_compile_error(cache: &str) {
    counter!(METRIC_COMPILE_ERRORS, "cache" => cache.to_owned()).increment(1);
}

pub fn record_direct_fallback(cache: &str) {
    counter!(METRIC_DIRECT_FALLBACKS, "cache" => cache.to_owned()).increment(1);
}

#[allow(clippy::cast_precision_loss)]
pub fn set_cache_entries(cache: &str, entries: usize) {
    gauge!(METRIC_CACHE_ENTRIES, "cache" => cache.to_owned()).set(entries as f64);
}
