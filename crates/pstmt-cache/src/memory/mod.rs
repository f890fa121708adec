//! In-memory reference backend.
//!
//! A small table store that understands a handful of statement shapes (see
//! the grammar in `parser`). It implements [`Backend`] and [`MappingBackend`]
//! so the caches can be exercised without a database server, and records how
//! often each query text was compiled and with which arguments statements ran.
//!
//! Available to other crates with the `test-utils` feature.

mod engine;
mod error;
mod parser;
mod rows;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;

pub use error::MemoryError;
pub use rows::{ExecOutcome, MemoryRows, Record};

use self::engine::{Executed, Store};
use self::parser::Parsed;
use crate::backend::{Backend, CompiledHandle, MappingBackend};
use crate::context::Context;
use crate::deferred::Deferred;
use crate::value::Value;

/// Single-row result of the in-memory backend
pub type MemoryRow = Deferred<Record, MemoryError>;

/// A statement run against the backend, as recorded in the execution log.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub query: String,
    pub args: Vec<Value>,
    /// Whether it ran through a compiled handle or the direct path
    pub compiled: bool,
}

#[derive(Debug, Default)]
struct Engine {
    store: Store,
    closed: AtomicBool,
    next_handle_id: AtomicU64,
    compiles: Mutex<HashMap<String, usize>>,
    total_compiles: AtomicUsize,
    direct_executions: AtomicUsize,
    executions: Mutex<Vec<Execution>>,
    compile_delay: Mutex<Option<Duration>>,
    exec_delay: Mutex<Option<Duration>>,
    fail_next: AtomicUsize,
    fail_close: AtomicBool,
}

impl Engine {
    fn ensure_usable(&self, ctx: &Context) -> Result<(), MemoryError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(MemoryError::Closed);
        }
        if ctx.is_done() {
            return Err(MemoryError::Cancelled);
        }
        Ok(())
    }

    async fn pause_for_execution(&self) {
        let delay = *self.exec_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn run(
        &self,
        ctx: &Context,
        query: &str,
        parsed: &Parsed,
        args: &[Value],
        compiled: bool,
    ) -> Result<Executed, MemoryError> {
        self.ensure_usable(ctx)?;
        self.executions.lock().push(Execution {
            query: query.to_owned(),
            args: args.to_vec(),
            compiled,
        });
        self.store.execute(parsed, args)
    }
}

/// In-memory backend. Clones share the same tables and counters.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    engine: Arc<Engine>,
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("closed", &self.is_closed())
            .field("total_compiles", &self.total_compiles())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every compile, to widen race windows in tests.
    #[must_use]
    pub fn with_compile_delay(self, delay: Duration) -> Self {
        *self.engine.compile_delay.lock() = Some(delay);
        self
    }

    /// Sleep this long before every execution through a compiled handle.
    #[must_use]
    pub fn with_exec_delay(self, delay: Duration) -> Self {
        *self.engine.exec_delay.lock() = Some(delay);
        self
    }

    /// Make the next `close` fail with [`MemoryError::Unavailable`] and leave
    /// the backend open.
    pub fn fail_next_close(&self) {
        self.engine.fail_close.store(true, Ordering::Release);
    }

    /// Make the next `n` compilations fail with [`MemoryError::Unavailable`].
    pub fn fail_next_compiles(&self, n: usize) {
        self.engine.fail_next.store(n, Ordering::Release);
    }

    /// Number of compile calls received for exactly this text, failed ones
    /// included.
    pub fn compile_count(&self, query: &str) -> usize {
        self.engine.compiles.lock().get(query).copied().unwrap_or(0)
    }

    pub fn total_compiles(&self) -> usize {
        self.engine.total_compiles.load(Ordering::Acquire)
    }

    pub fn direct_executions(&self) -> usize {
        self.engine.direct_executions.load(Ordering::Acquire)
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.engine.executions.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.engine.closed.load(Ordering::Acquire)
    }

    fn take_injected_failure(&self) -> bool {
        self.engine
            .fail_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Compiled statement of the in-memory backend.
pub struct MemoryStatement {
    id: u64,
    query: String,
    parsed: Parsed,
    engine: Arc<Engine>,
}

impl fmt::Debug for MemoryStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStatement")
            .field("id", &self.id)
            .field("query", &self.query)
            .field("param_count", &self.parsed.param_count)
            .finish_non_exhaustive()
    }
}

impl MemoryStatement {
    /// Unique per compilation; two handles with the same id are the same
    /// compiled statement.
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn query_text(&self) -> &str {
        &self.query
    }

    pub const fn param_count(&self) -> usize {
        self.parsed.param_count
    }

    async fn run(&self, ctx: &Context, args: &[Value]) -> Result<Executed, MemoryError> {
        self.engine.pause_for_execution().await;
        self.engine.run(ctx, &self.query, &self.parsed, args, true)
    }
}

fn into_rows(executed: Executed) -> MemoryRows {
    match executed {
        Executed::Rows(rows) => rows,
        Executed::Modified(_) => MemoryRows::empty(),
    }
}

fn first_row(executed: Result<Executed, MemoryError>) -> MemoryRow {
    executed
        .map(into_rows)
        .and_then(|mut rows| rows.next().ok_or(MemoryError::NoRows))
        .into()
}

#[async_trait]
impl CompiledHandle for MemoryStatement {
    type Rows = MemoryRows;
    type Row = MemoryRow;
    type Outcome = ExecOutcome;
    type Error = MemoryError;

    async fn query(&self, ctx: &Context, args: &[Value]) -> Result<MemoryRows, MemoryError> {
        self.run(ctx, args).await.map(into_rows)
    }

    async fn query_row(&self, ctx: &Context, args: &[Value]) -> MemoryRow {
        first_row(self.run(ctx, args).await)
    }

    async fn exec(&self, ctx: &Context, args: &[Value]) -> Result<ExecOutcome, MemoryError> {
        match self.run(ctx, args).await? {
            Executed::Modified(outcome) => Ok(outcome),
            Executed::Rows(_) => Ok(ExecOutcome::default()),
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Handle = MemoryStatement;
    type Error = MemoryError;

    async fn compile(&self, ctx: &Context, query: &str) -> Result<MemoryStatement, MemoryError> {
        *self.engine.compiles.lock().entry(query.to_owned()).or_default() += 1;
        self.engine.total_compiles.fetch_add(1, Ordering::AcqRel);

        self.engine.ensure_usable(ctx)?;

        let delay = *self.engine.compile_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_injected_failure() {
            return Err(MemoryError::Unavailable);
        }

        let parsed = parser::parse(query)?;
        Ok(MemoryStatement {
            id: self.engine.next_handle_id.fetch_add(1, Ordering::AcqRel),
            query: query.to_owned(),
            parsed,
            engine: Arc::clone(&self.engine),
        })
    }

    async fn query_row_direct(&self, ctx: &Context, query: &str, args: &[Value]) -> MemoryRow {
        self.engine.direct_executions.fetch_add(1, Ordering::AcqRel);
        let executed = parser::parse(query)
            .and_then(|parsed| self.engine.run(ctx, query, &parsed, args, false));
        first_row(executed)
    }

    async fn close(&self) -> Result<(), MemoryError> {
        if self.engine.fail_close.swap(false, Ordering::AcqRel) {
            return Err(MemoryError::Unavailable);
        }
        self.engine.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn decode_error(err: &serde_json::Error) -> MemoryError {
    MemoryError::Decode(err.to_string())
}

/// Decode a record by column name. Single-column records also decode
/// directly into a scalar `T`.
fn decode_record<T: DeserializeOwned>(record: &Record) -> Result<T, MemoryError> {
    if let [only] = record.values() {
        let scalar = serde_json::to_value(only).map_err(|e| decode_error(&e))?;
        if let Ok(decoded) = serde_json::from_value(scalar) {
            return Ok(decoded);
        }
    }

    let object: serde_json::Map<String, serde_json::Value> = record
        .columns()
        .iter()
        .zip(record.values())
        .map(|(column, value)| Ok((column.clone(), serde_json::to_value(value)?)))
        .collect::<Result<_, serde_json::Error>>()
        .map_err(|e| decode_error(&e))?;

    serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| decode_error(&e))
}

impl MappingBackend for MemoryBackend {
    fn decode_all<T: DeserializeOwned>(rows: MemoryRows) -> Result<Vec<T>, MemoryError> {
        rows.map(|record| decode_record(&record)).collect()
    }

    fn decode_one<T: DeserializeOwned>(row: MemoryRow) -> Result<T, MemoryError> {
        decode_record(&row.extract()?)
    }
}
