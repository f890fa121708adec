//! Capability traits the caches require from a query-execution backend.
//!
//! A backend is a connection or pool handle that compiles query text into
//! reusable handles. The caches own the backend, compile through it on first
//! use of each query text and delegate every execution to the compiled handle.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::value::Value;

/// A compiled (prepared) statement produced by [`Backend::compile`].
#[async_trait]
pub trait CompiledHandle: Send + Sync {
    /// Multi-row cursor type.
    type Rows: Send;
    /// Single-row result. Carries its own error, surfaced on consumption.
    type Row: Send;
    /// Outcome of a modifying statement.
    type Outcome: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn query(&self, ctx: &Context, args: &[Value]) -> Result<Self::Rows, Self::Error>;

    async fn query_row(&self, ctx: &Context, args: &[Value]) -> Self::Row;

    async fn exec(&self, ctx: &Context, args: &[Value]) -> Result<Self::Outcome, Self::Error>;
}

/// The uncached execution backend.
///
/// Implementations must be safe for concurrent use by many callers; the
/// caches do not serialize access to the backend beyond compilation.
#[async_trait]
pub trait Backend: Send + Sync {
    type Handle: CompiledHandle<Error = Self::Error>;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Compile query text into a reusable handle.
    async fn compile(&self, ctx: &Context, query: &str) -> Result<Self::Handle, Self::Error>;

    /// Execute query text directly, without a cached handle.
    ///
    /// Used as the fallback for single-row execution when compilation fails,
    /// so that the failure is reported through the returned row object.
    async fn query_row_direct(&self, ctx: &Context, query: &str, args: &[Value]) -> RowOf<Self>;

    /// Close the backend. Every handle compiled from it becomes unusable.
    async fn close(&self) -> Result<(), Self::Error>;
}

/// Backend that can decode rows into caller-supplied types.
pub trait MappingBackend: Backend {
    fn decode_all<T: DeserializeOwned>(rows: RowsOf<Self>) -> Result<Vec<T>, Self::Error>;

    fn decode_one<T: DeserializeOwned>(row: RowOf<Self>) -> Result<T, Self::Error>;
}

/// A query-execution source: anything that can run a query for a backend.
///
/// Both caches implement it, which lets [`crate::select`] and [`crate::get`]
/// decode through cached handles.
#[async_trait]
pub trait Queryer<B: Backend + ?Sized>: Send + Sync {
    async fn query_context(
        &self,
        ctx: &Context,
        query: &str,
        args: &[Value],
    ) -> Result<RowsOf<B>, B::Error>;

    async fn query_row_context(&self, ctx: &Context, query: &str, args: &[Value]) -> RowOf<B>;
}

pub type RowsOf<B> = <<B as Backend>::Handle as CompiledHandle>::Rows;
pub type RowOf<B> = <<B as Backend>::Handle as CompiledHandle>::Row;
pub type OutcomeOf<B> = <<B as Backend>::Handle as CompiledHandle>::Outcome;
