//! Concurrency-safe cache of compiled statement handles.
//!
//! Sits in front of a query-execution backend and compiles (prepares) each
//! distinct query text at most once, even when many tasks hit the same text
//! for the first time concurrently. Execution results are passed through
//! unchanged, so the cache is a drop-in substitute for the uncached backend.
//!
//! # Variants
//!
//! - [`HandleCache`] - wraps any [`Backend`]
//! - [`MappingHandleCache`] - wraps a [`MappingBackend`] and adds
//!   [`select`](MappingHandleCache::select) / [`get`](MappingHandleCache::get)
//!   decoding into caller-supplied types
//!
//! # Example
//!
//! ```rust,ignore
//! use pstmt_cache::{HandleCache, Value};
//! use pstmt_cache::memory::MemoryBackend;
//!
//! let cache = HandleCache::new(Ok::<_, std::convert::Infallible>(MemoryBackend::new()))?;
//! cache.exec("CREATE TABLE t(id)", &[]).await?;
//! cache.exec("INSERT INTO t(id) VALUES(?)", &[Value::from(1)]).await?;
//! let rows = cache.query("SELECT id FROM t ORDER BY id", &[]).await?;
//! ```

pub mod backend;
pub mod cache;
pub mod config;
mod context;
mod deferred;
mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod observability;
mod value;

pub use backend::{Backend, CompiledHandle, MappingBackend, OutcomeOf, Queryer, RowOf, RowsOf};
pub use cache::{CacheStats, HandleCache, MappingHandleCache, get, select};
pub use config::{CacheConfig, Config, ConfigBuilder, TelemetryConfig};
pub use context::Context;
pub use deferred::Deferred;
pub use error::{Error, Result};
pub use value::Value;
