//! Handle cache over a plain execution backend

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::shared::CacheCore;
use super::stats::CacheStats;
use crate::backend::{Backend, OutcomeOf, Queryer, RowOf, RowsOf};
use crate::config::CacheConfig;
use crate::context::Context;
use crate::value::Value;

/// Caches one compiled handle per distinct query text.
///
/// Query text is the key verbatim: `"SELECT 1"` and `"select 1"` are two
/// entries. Entries are never evicted or replaced; they live until
/// [`close`](Self::close).
///
/// Operations the cache does not mediate (transactions, session settings)
/// go through [`direct`](Self::direct).
pub struct HandleCache<B: Backend> {
    core: CacheCore<B>,
}

impl<B: Backend> fmt::Debug for HandleCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCache")
            .field("core", &self.core)
            .finish()
    }
}

impl<B: Backend> HandleCache<B> {
    /// Wrap an already-open backend.
    ///
    /// Accepts the result of opening the backend so that an open failure is
    /// passed straight back to the caller, unchanged.
    pub fn new<E>(backend: Result<B, E>) -> Result<Self, E> {
        Self::with_config(backend, CacheConfig::default())
    }

    pub fn with_config<E>(backend: Result<B, E>, config: CacheConfig) -> Result<Self, E> {
        let backend = backend?;
        Ok(Self {
            core: CacheCore::new(backend, config),
        })
    }

    pub async fn prepare_context(
        &self,
        ctx: &Context,
        query: &str,
    ) -> Result<Arc<B::Handle>, B::Error> {
        self.core.resolve(ctx, query).await
    }

    pub async fn prepare(&self, query: &str) -> Result<Arc<B::Handle>, B::Error> {
        self.prepare_context(&Context::background(), query).await
    }

    /// Compile every query text in [`CacheConfig::prewarm`].
    pub async fn warm_up(&self, ctx: &Context) -> Result<usize, B::Error> {
        self.core.warm_up(ctx).await
    }

    pub async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<RowsOf<B>, B::Error> {
        self.core.query_context(ctx, query, args).await
    }

    pub async fn query(&self, query: &str, args: &[Value]) -> Result<RowsOf<B>, B::Error> {
        self.query_context(&Context::background(), query, args)
            .await
    }

    /// Execute a single-row query.
    ///
    /// Never fails directly: compile and execution errors are reported when
    /// the returned row is consumed.
    pub async fn query_row_context(&self, ctx: &Context, query: &str, args: &[Value]) -> RowOf<B> {
        self.core.query_row_context(ctx, query, args).await
    }

    pub async fn query_row(&self, query: &str, args: &[Value]) -> RowOf<B> {
        self.query_row_context(&Context::background(), query, args)
            .await
    }

    pub async fn exec_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<OutcomeOf<B>, B::Error> {
        self.core.exec_context(ctx, query, args).await
    }

    pub async fn exec(&self, query: &str, args: &[Value]) -> Result<OutcomeOf<B>, B::Error> {
        self.exec_context(&Context::background(), query, args)
            .await
    }

    /// Drop all cached handles and close the backend.
    pub async fn close(&self) -> Result<(), B::Error> {
        self.core.close().await
    }

    /// The wrapped backend, for operations the cache does not intercept.
    pub const fn direct(&self) -> &B {
        self.core.backend()
    }

    pub async fn len(&self) -> usize {
        self.core.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.core.len().await == 0
    }

    pub async fn contains(&self, query: &str) -> bool {
        self.core.contains(query).await
    }

    pub fn stats(&self) -> CacheStats {
        self.core.stats()
    }

    pub fn name(&self) -> &str {
        &self.core.config().name
    }

    pub const fn config(&self) -> &CacheConfig {
        self.core.config()
    }
}

#[async_trait]
impl<B: Backend> Queryer<B> for HandleCache<B> {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<RowsOf<B>, B::Error> {
        self.core.query_context(ctx, query, args).await
    }

    async fn query_row_context(&self, ctx: &Context, query: &str, args: &[Value]) -> RowOf<B> {
        self.core.query_row_context(ctx, query, args).await
    }
}
