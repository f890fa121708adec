//! Single-row result whose error surfaces only on extraction.

/// Result object for single-row execution.
///
/// Single-row operations have no synchronous error channel: a failure to
/// compile or execute is carried inside the returned object and becomes
/// visible only when the caller calls [`extract`](Self::extract). The API is
/// intentionally asymmetric with the multi-row and modify operations, which
/// return `Result` directly.
#[derive(Debug, Clone)]
#[must_use = "a deferred result reports its error only when extracted"]
pub struct Deferred<T, E> {
    inner: Result<T, E>,
}

impl<T, E> Deferred<T, E> {
    pub const fn ready(value: T) -> Self {
        Self { inner: Ok(value) }
    }

    pub const fn failed(err: E) -> Self {
        Self { inner: Err(err) }
    }

    /// Whether extraction will succeed.
    pub const fn is_ready(&self) -> bool {
        self.inner.is_ok()
    }

    /// Consume the result, surfacing any deferred error.
    pub fn extract(self) -> Result<T, E> {
        self.inner
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Deferred<U, E> {
        Deferred {
            inner: self.inner.map(f),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, E>) -> Deferred<U, E> {
        Deferred {
            inner: self.inner.and_then(f),
        }
    }
}

impl<T, E> From<Result<T, E>> for Deferred<T, E> {
    fn from(inner: Result<T, E>) -> Self {
        Self { inner }
    }
}
