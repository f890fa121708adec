//! Lookup/insert core shared by both cache variants.
//!
//! # Locking
//!
//! The map sits behind a `tokio::sync::RwLock`. Hits take only the read
//! guard, so lookups of already-compiled text never block each other. A miss
//! takes the write guard, re-checks the map and compiles while still holding
//! the guard. Releasing it around the compile would let two callers compile
//! the same text and orphan one of the handles.
//!
//! The cost is that one slow first compilation also delays first
//! compilations of other texts until it completes.
//!
//! # Close
//!
//! [`CacheCore::close`] empties the map and then closes the backend. Calls
//! racing with close are memory-safe but may recompile against a closed
//! backend and fail there; callers should not close a cache that is still
//! in use.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::stats::{CacheStats, StatsRecorder};
use crate::backend::{Backend, CompiledHandle, OutcomeOf, RowOf, RowsOf};
use crate::config::CacheConfig;
use crate::context::Context;
use crate::value::Value;

const REDACTED: &str = "<redacted>";

pub(crate) struct CacheCore<B: Backend> {
    backend: B,
    handles: RwLock<HashMap<String, Arc<B::Handle>>>,
    stats: StatsRecorder,
    config: CacheConfig,
}

impl<B: Backend> fmt::Debug for CacheCore<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheCore")
            .field("name", &self.config.name)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl<B: Backend> CacheCore<B> {
    pub(crate) fn new(backend: B, config: CacheConfig) -> Self {
        Self {
            backend,
            handles: RwLock::new(HashMap::new()),
            stats: StatsRecorder::default(),
            config,
        }
    }

    pub(crate) const fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) const fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn loggable<'a>(&self, query: &'a str) -> &'a str {
        if self.config.log_queries {
            query
        } else {
            REDACTED
        }
    }

    /// Return the compiled handle for `query`, compiling it on first use.
    ///
    /// A failed compilation leaves the map untouched, so the next call for
    /// the same text compiles again.
    pub(crate) async fn resolve(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<B::Handle>, B::Error> {
        let cached = self.handles.read().await.get(query).cloned();
        if let Some(handle) = cached {
            self.record_hit(query);
            return Ok(handle);
        }

        let mut handles = self.handles.write().await;

        // Another caller may have compiled it while we waited for the guard.
        if let Some(handle) = handles.get(query) {
            let handle = Arc::clone(handle);
            drop(handles);
            self.record_hit(query);
            return Ok(handle);
        }

        self.stats.miss();
        #[cfg(feature = "metrics")]
        crate::observability::metrics::record_cache_miss(&self.config.name);

        match self.backend.compile(ctx, query).await {
            Ok(handle) => {
                let handle = Arc::new(handle);
                handles.insert(query.to_owned(), Arc::clone(&handle));
                let entries = handles.len();
                drop(handles);

                self.stats.compiled(entries);
                #[cfg(feature = "metrics")]
                crate::observability::metrics::set_cache_entries(&self.config.name, entries);
                tracing::debug!(
                    cache.name = %self.config.name,
                    cache.result = "compiled",
                    cache.query = self.loggable(query),
                    cache.entries = entries,
                );
                Ok(handle)
            }
            Err(err) => {
                drop(handles);

                self.stats.compile_error();
                #[cfg(feature = "metrics")]
                crate::observability::metrics::record_compile_error(&self.config.name);
                tracing::warn!(
                    cache.name = %self.config.name,
                    cache.result = "compile_error",
                    cache.query = self.loggable(query),
                    error = %err,
                );
                Err(err)
            }
        }
    }

    fn record_hit(&self, query: &str) {
        self.stats.hit();
        #[cfg(feature = "metrics")]
        crate::observability::metrics::record_cache_hit(&self.config.name);
        tracing::debug!(
            cache.name = %self.config.name,
            cache.result = "hit",
            cache.query = self.loggable(query),
        );
    }

    /// Compile every configured prewarm text in order.
    pub(crate) async fn warm_up(&self, ctx: &Context) -> Result<usize, B::Error> {
        for query in &self.config.prewarm {
            self.resolve(ctx, query).await?;
        }
        tracing::debug!(
            cache.name = %self.config.name,
            cache.prewarmed = self.config.prewarm.len(),
        );
        Ok(self.config.prewarm.len())
    }

    pub(crate) async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    pub(crate) async fn contains(&self, query: &str) -> bool {
        self.handles.read().await.contains_key(query)
    }

    pub(crate) async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<RowsOf<B>, B::Error> {
        let handle = self.resolve(ctx, query).await?;
        handle.query(ctx, args).await
    }

    /// Single-row execution has no error channel of its own. When compilation
    /// fails the text is handed to the backend directly, so the error shows up
    /// when the caller extracts the row.
    pub(crate) async fn query_row_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> RowOf<B> {
        match self.resolve(ctx, query).await {
            Ok(handle) => handle.query_row(ctx, args).await,
            Err(err) => {
                self.stats.direct_fallback();
                #[cfg(feature = "metrics")]
                crate::observability::metrics::record_direct_fallback(&self.config.name);
                tracing::debug!(
                    cache.name = %self.config.name,
                    cache.result = "direct_fallback",
                    cache.query = self.loggable(query),
                    error = %err,
                );
                self.backend.query_row_direct(ctx, query, args).await
            }
        }
    }

    pub(crate) async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<OutcomeOf<B>, B::Error> {
        let handle = self.resolve(ctx, query).await?;
        handle.exec(ctx, args).await
    }

    /// Discard every cached handle, then close the backend.
    ///
    /// Handles are not released one by one; closing the backend invalidates
    /// everything compiled from it. The map is cleared even when the backend
    /// close fails.
    pub(crate) async fn close(&self) -> Result<(), B::Error> {
        let discarded = {
            let mut handles = self.handles.write().await;
            std::mem::take(&mut *handles).len()
        };
        self.stats.cleared();
        #[cfg(feature = "metrics")]
        crate::observability::metrics::set_cache_entries(&self.config.name, 0);

        tracing::debug!(
            cache.name = %self.config.name,
            cache.discarded = discarded,
            "closing statement cache"
        );

        self.backend.close().await.inspect_err(|err| {
            tracing::warn!(cache.name = %self.config.name, error = %err, "backend close failed");
        })
    }
}
