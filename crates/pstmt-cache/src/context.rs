//! Cancellation and deadline context threaded through every operation.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Cancellation/deadline carrier forwarded opaquely to the backend.
///
/// The caches never inspect a `Context`; aborting in-flight compilation or
/// execution is entirely the backend's responsibility.
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// Context that is never cancelled and has no deadline.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// Derive a context sharing this one's token, with a tighter deadline.
    #[must_use]
    pub fn child_with_deadline(&self, deadline: Instant) -> Self {
        let deadline = self.deadline.map_or(deadline, |d| d.min(deadline));
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True once the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.is_expired()
    }
}
