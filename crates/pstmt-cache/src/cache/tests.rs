use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Deserialize;

use super::{CacheStats, HandleCache, MappingHandleCache, get, select};
use crate::backend::{Backend, CompiledHandle};
use crate::config::CacheConfig;
use crate::context::Context;
use crate::memory::{MemoryBackend, MemoryError};
use crate::value::Value;

const CREATE: &str = "CREATE TABLE t(id, name)";
const INSERT: &str = "INSERT INTO t(id, name) VALUES(?, ?)";
const SELECT_IDS: &str = "SELECT id FROM t ORDER BY id";

async fn cache_with_table(backend: MemoryBackend) -> HandleCache<MemoryBackend> {
    let cache = HandleCache::new(Ok::<_, MemoryError>(backend)).unwrap();
    cache.exec(CREATE, &[]).await.unwrap();
    cache
}

fn ids(rows: crate::memory::MemoryRows) -> Vec<Value> {
    rows.map(|r| r.into_values().remove(0)).collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_use_compiles_once() {
    let backend = MemoryBackend::new().with_compile_delay(Duration::from_millis(20));
    let cache = Arc::new(HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap());

    let tasks = (0..16).map(|_| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.prepare("SELECT 1").await.unwrap() })
    });
    let handles: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(backend.compile_count("SELECT 1"), 1);
    assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
    assert_eq!(cache.len().await, 1);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 15);
    assert_eq!(stats.compilations, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_inserts_then_query() {
    let backend = MemoryBackend::new().with_compile_delay(Duration::from_millis(5));
    let cache = Arc::new(cache_with_table(backend.clone()).await);

    let inserts = [(1, "a"), (2, "b")].map(|(id, name)| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.exec(INSERT, &[id.into(), name.into()]).await })
    });
    for outcome in join_all(inserts).await {
        assert_eq!(outcome.unwrap().unwrap().rows_affected, 1);
    }

    let rows = cache.query(SELECT_IDS, &[]).await.unwrap();
    assert_eq!(ids(rows), vec![Value::Int(1), Value::Int(2)]);
    assert_eq!(backend.compile_count(INSERT), 1);
}

#[tokio::test]
async fn test_many_distinct_texts_compile_once_each() {
    let backend = MemoryBackend::new();
    let cache = Arc::new(HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap());

    let texts: Vec<String> = (0..8).map(|i| format!("SELECT {i}")).collect();
    let calls = texts.iter().cycle().take(32).map(|text| {
        let cache = Arc::clone(&cache);
        async move { cache.query_row(text, &[]).await.extract().unwrap() }
    });
    join_all(calls).await;

    for text in &texts {
        assert_eq!(backend.compile_count(text), 1, "{text}");
    }
    assert_eq!(cache.len().await, 8);
}

#[tokio::test]
async fn test_query_row_syntax_error_is_deferred() {
    let backend = MemoryBackend::new();
    let cache = HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap();

    let row = cache.query_row("SELEKT 1", &[]).await;
    let err = row.extract().unwrap_err();
    assert!(err.is_syntax(), "{err}");

    assert!(!cache.contains("SELEKT 1").await);
    assert_eq!(backend.direct_executions(), 1);
    assert_eq!(cache.stats().direct_fallbacks, 1);
}

#[tokio::test]
async fn test_failed_compile_is_not_cached() {
    let backend = MemoryBackend::new();
    let cache = HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap();

    for _ in 0..2 {
        let err = cache.query("SELEKT 1", &[]).await.unwrap_err();
        assert!(err.is_syntax());
    }
    assert_eq!(backend.compile_count("SELEKT 1"), 2);
    assert!(cache.is_empty().await);
    assert_eq!(cache.stats().compile_errors, 2);
}

#[tokio::test]
async fn test_transient_compile_failure_recovers() {
    let backend = MemoryBackend::new();
    let cache = HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap();
    backend.fail_next_compiles(1);

    assert_eq!(
        cache.prepare("SELECT 1").await.unwrap_err(),
        MemoryError::Unavailable
    );
    let first = cache.prepare("SELECT 1").await.unwrap();
    let second = cache.prepare("SELECT 1").await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(backend.compile_count("SELECT 1"), 2);
}

#[tokio::test]
async fn test_close_discards_handles_and_closes_backend() {
    let backend = MemoryBackend::new();
    let cache = cache_with_table(backend.clone()).await;
    cache.exec(INSERT, &[1.into(), "a".into()]).await.unwrap();
    assert_eq!(cache.len().await, 2);

    cache.close().await.unwrap();
    assert!(cache.is_empty().await);
    assert!(backend.is_closed());
    assert_eq!(cache.stats().entries, 0);

    let err = cache.exec(INSERT, &[2.into(), "b".into()]).await.unwrap_err();
    assert_eq!(err, MemoryError::Closed);
    assert!(cache.is_empty().await);

    let row = cache.query_row(SELECT_IDS, &[]).await;
    assert!(row.extract().unwrap_err().is_closed());
}

#[tokio::test]
async fn test_close_twice() {
    let cache = HandleCache::new(Ok::<_, MemoryError>(MemoryBackend::new())).unwrap();
    cache.close().await.unwrap();
    assert!(cache.close().await.is_ok());
}

#[tokio::test]
async fn test_failed_backend_close_still_clears_map() {
    let backend = MemoryBackend::new();
    let cache = cache_with_table(backend.clone()).await;
    cache.prepare(SELECT_IDS).await.unwrap();
    assert_eq!(cache.len().await, 2);

    backend.fail_next_close();
    assert_eq!(cache.close().await.unwrap_err(), MemoryError::Unavailable);

    assert!(cache.is_empty().await);
    assert_eq!(cache.stats().entries, 0);
    assert!(!backend.is_closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hits_on_distinct_texts_run_in_parallel() {
    const TEXTS: usize = 8;
    let delay = Duration::from_millis(100);
    let backend = MemoryBackend::new().with_exec_delay(delay);
    let cache = Arc::new(HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap());

    let texts: Vec<String> = (0..TEXTS).map(|i| format!("SELECT {i}")).collect();
    for text in &texts {
        cache.prepare(text).await.unwrap();
    }

    let started = tokio::time::Instant::now();
    let calls = texts.iter().cloned().map(|text| {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.query_row(&text, &[]).await.extract() })
    });
    for row in join_all(calls).await {
        row.unwrap().unwrap();
    }
    let elapsed = started.elapsed();

    assert!(
        elapsed < delay * (TEXTS as u32) / 2,
        "hits serialized: {elapsed:?}"
    );
    assert_eq!(backend.total_compiles(), TEXTS);
    assert_eq!(cache.stats().hits, TEXTS as u64);
}

#[tokio::test]
async fn test_cached_results_match_uncached_backend() {
    let backend = MemoryBackend::new();
    let cache = cache_with_table(backend.clone()).await;
    for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
        cache.exec(INSERT, &[id.into(), name.into()]).await.unwrap();
    }
    let query = "SELECT name, id FROM t WHERE id = ? ORDER BY id";
    let ctx = Context::background();

    for id in [2, 9] {
        let args = [Value::Int(id)];
        let uncached = cache.direct().compile(&ctx, query).await.unwrap();

        for _ in 0..2 {
            let cached = cache.query(query, &args).await.unwrap();
            let direct = uncached.query(&ctx, &args).await.unwrap();
            assert_eq!(cached.columns(), direct.columns());
            assert_eq!(cached.into_value_rows(), direct.into_value_rows());

            let cached_row = cache.query_row(query, &args).await.extract();
            let direct_row = uncached.query_row(&ctx, &args).await.extract();
            assert_eq!(cached_row, direct_row);
        }
    }
}

#[tokio::test]
async fn test_construction_error_is_returned_unchanged() {
    let result = HandleCache::<MemoryBackend>::new(Err::<MemoryBackend, _>("dial failed"));
    assert_eq!(result.unwrap_err(), "dial failed");

    let result = MappingHandleCache::<MemoryBackend>::new(Err(MemoryError::Unavailable));
    assert_eq!(result.unwrap_err(), MemoryError::Unavailable);
}

#[tokio::test]
async fn test_arguments_are_passed_through() {
    let backend = MemoryBackend::new();
    let cache = cache_with_table(backend.clone()).await;
    let args = [Value::Int(7), Value::Text("it's".into())];

    cache.exec(INSERT, &args).await.unwrap();

    let last = backend.executions().pop().unwrap();
    assert_eq!(last.query, INSERT);
    assert_eq!(last.args, args);
    assert!(last.compiled);
}

#[tokio::test]
async fn test_context_is_forwarded() {
    let backend = MemoryBackend::new();
    let cache = cache_with_table(backend.clone()).await;
    cache.prepare(SELECT_IDS).await.unwrap();

    let ctx = Context::background();
    ctx.cancel();

    let err = cache.query_context(&ctx, SELECT_IDS, &[]).await.unwrap_err();
    assert!(err.is_cancelled());

    // Compilation sees the same context, and its failure is not cached.
    let err = cache.exec_context(&ctx, INSERT, &[1.into(), "a".into()]).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(!cache.contains(INSERT).await);
}

#[tokio::test]
async fn test_direct_bypasses_cache() {
    let backend = MemoryBackend::new();
    let cache = HandleCache::new(Ok::<_, MemoryError>(backend.clone())).unwrap();

    let ctx = Context::background();
    cache.direct().compile(&ctx, "SELECT 1").await.unwrap();
    cache.direct().compile(&ctx, "SELECT 1").await.unwrap();

    assert_eq!(backend.compile_count("SELECT 1"), 2);
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_warm_up_compiles_configured_texts() {
    let backend = MemoryBackend::new();
    let config = CacheConfig::new()
        .with_name("warm")
        .with_prewarm(["SELECT 1", "SELECT 2"]);
    let cache = HandleCache::with_config(Ok::<_, MemoryError>(backend.clone()), config).unwrap();

    assert_eq!(cache.warm_up(&Context::background()).await.unwrap(), 2);
    assert_eq!(cache.name(), "warm");
    assert!(cache.contains("SELECT 1").await);
    assert!(cache.contains("SELECT 2").await);

    cache.query_row("SELECT 2", &[]).await.extract().unwrap();
    assert_eq!(backend.compile_count("SELECT 2"), 1);
}

#[tokio::test]
async fn test_warm_up_stops_at_first_failure() {
    let config = CacheConfig::new().with_prewarm(["SELEKT", "SELECT 1"]);
    let cache =
        HandleCache::with_config(Ok::<_, MemoryError>(MemoryBackend::new()), config).unwrap();

    assert!(cache.warm_up(&Context::background()).await.unwrap_err().is_syntax());
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn test_stats_track_hits_and_misses() {
    let cache = HandleCache::new(Ok::<_, MemoryError>(MemoryBackend::new())).unwrap();
    assert_eq!(cache.stats(), CacheStats::default());

    for _ in 0..4 {
        cache.query("SELECT 1", &[]).await.unwrap();
    }
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.entries, 1);
    assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
}

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    id: i64,
    name: String,
}

async fn mapping_cache(backend: MemoryBackend) -> MappingHandleCache<MemoryBackend> {
    let cache = MappingHandleCache::new(Ok::<_, MemoryError>(backend)).unwrap();
    cache.exec(CREATE, &[]).await.unwrap();
    for (id, name) in [(2, "b"), (1, "a")] {
        cache.exec(INSERT, &[id.into(), name.into()]).await.unwrap();
    }
    cache
}

#[tokio::test]
async fn test_mapping_select_decodes_rows() {
    let backend = MemoryBackend::new();
    let cache = mapping_cache(backend.clone()).await;
    let query = "SELECT id, name FROM t ORDER BY id";

    let rows: Vec<Row> = cache.select(query, &[]).await.unwrap();
    assert_eq!(
        rows,
        vec![
            Row {
                id: 1,
                name: "a".into()
            },
            Row {
                id: 2,
                name: "b".into()
            },
        ]
    );

    let again: Vec<Row> = cache.select(query, &[]).await.unwrap();
    assert_eq!(again.len(), 2);
    assert_eq!(backend.compile_count(query), 1);
}

#[tokio::test]
async fn test_mapping_get_decodes_scalar() {
    let backend = MemoryBackend::new();
    let cache = mapping_cache(backend.clone()).await;

    let name: String = cache
        .get("SELECT name FROM t WHERE id = ?", &[2.into()])
        .await
        .unwrap();
    assert_eq!(name, "b");

    let missing: Result<String, _> = cache.get("SELECT name FROM t WHERE id = ?", &[9.into()]).await;
    assert!(missing.unwrap_err().is_no_rows());
}

#[tokio::test]
async fn test_mapping_get_reports_compile_error() {
    let cache = mapping_cache(MemoryBackend::new()).await;
    let result: Result<i64, _> = cache.get("SELEKT id FROM t", &[]).await;
    assert!(result.unwrap_err().is_syntax());
    assert_eq!(cache.stats().direct_fallbacks, 1);
}

#[tokio::test]
async fn test_mapping_cache_shares_handles_with_inner_cache() {
    let backend = MemoryBackend::new();
    let cache = mapping_cache(backend.clone()).await;
    let query = "SELECT id FROM t WHERE name = ?";

    let decoded: i64 = cache.get(query, &["a".into()]).await.unwrap();
    let row = cache.query_row(query, &["a".into()]).await.extract().unwrap();
    assert_eq!(row.into_values(), vec![Value::Int(decoded)]);

    assert!(cache.as_handle_cache().contains(query).await);
    assert_eq!(backend.compile_count(query), 1);

    cache.close().await.unwrap();
    assert!(cache.as_handle_cache().is_empty().await);
}

#[tokio::test]
async fn test_free_functions_accept_any_source() {
    let backend = MemoryBackend::new();
    let cache = mapping_cache(backend.clone()).await;
    let ctx = Context::background();

    let ids: Vec<i64> = select::<MemoryBackend, _, _>(&cache, &ctx, "SELECT id FROM t ORDER BY id", &[])
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 2]);

    let count: i64 = get::<MemoryBackend, _, _>(&cache, &ctx, "SELECT ?", &[Value::Int(42)])
        .await
        .unwrap();
    assert_eq!(count, 42);
    assert!(cache.contains("SELECT ?").await);
}

#[test]
fn test_cache_usable_from_blocking_runtime() {
    let cache = HandleCache::new(Ok::<_, MemoryError>(MemoryBackend::new())).unwrap();
    let value = tokio_test::block_on(async {
        cache.query_row("SELECT 5", &[]).await.extract().unwrap()
    });
    assert_eq!(value.into_values(), vec![Value::Int(5)]);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<parking_lot::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

fn run_with_logs(config: CacheConfig) -> Vec<String> {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let cache =
            HandleCache::with_config(Ok::<_, MemoryError>(MemoryBackend::new()), config).unwrap();
        tokio_test::block_on(async {
            cache.query("SELECT 42", &[]).await.unwrap();
            cache.query("SELECT 42", &[]).await.unwrap();
        });
    });
    logs.lines()
}

#[test]
fn test_resolve_events_logged_at_debug() {
    let lines = run_with_logs(CacheConfig::new());

    let compiled: Vec<_> = lines.iter().filter(|l| l.contains("\"compiled\"")).collect();
    let hits: Vec<_> = lines.iter().filter(|l| l.contains("\"hit\"")).collect();
    assert_eq!(compiled.len(), 1, "{lines:#?}");
    assert_eq!(hits.len(), 1, "{lines:#?}");
    assert!(compiled.iter().chain(&hits).all(|l| l.contains("DEBUG")));

    assert!(lines.iter().all(|l| !l.contains("SELECT 42")));
    assert!(hits[0].contains("<redacted>"));
}

#[test]
fn test_query_text_logged_when_enabled() {
    let lines = run_with_logs(CacheConfig::new().with_log_queries(true));
    assert!(lines.iter().any(|l| l.contains("\"hit\"") && l.contains("SELECT 42")));
}
