//! Compiled-handle caches
//!
//! Both variants share one lookup/insert core and differ only in the
//! backend capabilities they expose:
//!
//! - [`HandleCache`] - query, single-row query and modify pass-through
//! - [`MappingHandleCache`] - the same, plus decoding into caller types
//!
//! # Concurrency
//!
//! Lookups of already-compiled text take a shared read guard and run fully
//! in parallel. The first use of a text takes the exclusive guard for the
//! check-compile-insert sequence, which guarantees a single compilation per
//! text even when many tasks race on it.
//!
//! Closing a cache while other tasks still use it is not coordinated: those
//! tasks either finish on a valid map or recompile against the closed
//! backend and get the backend's error.

mod basic;
mod mapping;
mod shared;
mod stats;

#[cfg(test)]
mod tests;

pub use basic::HandleCache;
pub use mapping::{MappingHandleCache, get, select};
pub use stats::CacheStats;
