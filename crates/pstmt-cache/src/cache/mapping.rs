//! Handle cache over a backend that decodes rows into caller types

use std::fmt;
use std::ops::Deref;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::HandleCache;
use crate::backend::{MappingBackend, Queryer, RowOf, RowsOf};
use crate::config::CacheConfig;
use crate::context::Context;
use crate::value::Value;

/// Run `query` on `source` and decode every row into `T`.
///
/// `source` may be a cache, in which case the query runs on a cached handle.
pub async fn select<B, T, Q>(
    source: &Q,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> Result<Vec<T>, B::Error>
where
    B: MappingBackend,
    T: DeserializeOwned,
    Q: Queryer<B> + ?Sized,
{
    let rows = source.query_context(ctx, query, args).await?;
    B::decode_all(rows)
}

/// Run `query` on `source` and decode its single row into `T`.
pub async fn get<B, T, Q>(
    source: &Q,
    ctx: &Context,
    query: &str,
    args: &[Value],
) -> Result<T, B::Error>
where
    B: MappingBackend,
    T: DeserializeOwned,
    Q: Queryer<B> + ?Sized,
{
    let row = source.query_row_context(ctx, query, args).await;
    B::decode_one(row)
}

/// [`HandleCache`] variant with structured decoding.
///
/// `select` and `get` hand the cache itself to the backend's decoder as the
/// execution source, so decoding reuses the same compiled handles. Every
/// other operation is the wrapped [`HandleCache`]'s, reached through `Deref`.
pub struct MappingHandleCache<B: MappingBackend> {
    inner: HandleCache<B>,
}

impl<B: MappingBackend> fmt::Debug for MappingHandleCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingHandleCache")
            .field("inner", &self.inner)
            .finish()
    }
}

impl<B: MappingBackend> MappingHandleCache<B> {
    pub fn new<E>(backend: Result<B, E>) -> Result<Self, E> {
        Self::with_config(backend, CacheConfig::default())
    }

    pub fn with_config<E>(backend: Result<B, E>, config: CacheConfig) -> Result<Self, E> {
        Ok(Self {
            inner: HandleCache::with_config(backend, config)?,
        })
    }

    pub async fn select_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<Vec<T>, B::Error> {
        select::<B, T, Self>(self, ctx, query, args).await
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        query: &str,
        args: &[Value],
    ) -> Result<Vec<T>, B::Error> {
        self.select_context(&Context::background(), query, args)
            .await
    }

    pub async fn get_context<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<T, B::Error> {
        get::<B, T, Self>(self, ctx, query, args).await
    }

    pub async fn get<T: DeserializeOwned>(&self, query: &str, args: &[Value]) -> Result<T, B::Error> {
        self.get_context(&Context::background(), query, args)
            .await
    }

    pub const fn as_handle_cache(&self) -> &HandleCache<B> {
        &self.inner
    }
}

impl<B: MappingBackend> Deref for MappingHandleCache<B> {
    type Target = HandleCache<B>;

    fn deref(&self) -> &HandleCache<B> {
        &self.inner
    }
}

#[async_trait]
impl<B: MappingBackend> Queryer<B> for MappingHandleCache<B> {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<RowsOf<B>, B::Error> {
        self.inner.query_context(ctx, query, args).await
    }

    async fn query_row_context(&self, ctx: &Context, query: &str, args: &[Value]) -> RowOf<B> {
        self.inner.query_row_context(ctx, query, args).await
    }
}
