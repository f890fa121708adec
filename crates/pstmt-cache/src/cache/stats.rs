//! Hit/miss accounting for the handle caches

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the map, including ones resolved after
    /// waiting for a concurrent compilation of the same text.
    pub hits: u64,
    /// Lookups that had to compile.
    pub misses: u64,
    /// Successful compilations.
    pub compilations: u64,
    pub compile_errors: u64,
    /// Single-row calls served by the uncached backend after a compile error.
    pub direct_fallbacks: u64,
    /// Cached handles at snapshot time.
    pub entries: u64,
}

impl CacheStats {
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Counters are updated after the map guard is released, so a snapshot may
/// briefly lag the map under concurrent access.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    compilations: AtomicU64,
    compile_errors: AtomicU64,
    direct_fallbacks: AtomicU64,
    entries: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn compiled(&self, entries: usize) {
        self.compilations.fetch_add(1, Ordering::Relaxed);
        self.entries.store(entries as u64, Ordering::Relaxed);
    }

    pub(crate) fn compile_error(&self) {
        self.compile_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn direct_fallback(&self) {
        self.direct_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn cleared(&self) {
        self.entries.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            compile_errors: self.compile_errors.load(Ordering::Relaxed),
            direct_fallbacks: self.direct_fallbacks.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
        }
    }
}
