//! Serialized execution of state-mutating remote calls.
//!
//! Each [`CallSerializer::enqueue`] takes its place in a FIFO chain at call
//! time, waits for its predecessor to settle, runs (with a bounded retry), then
//! lets its successor start. No two queued operations from one serializer are
//! ever in flight at once.
//!
//! ```text
//! enqueue(O1) ──▶ [O1 attempt 1 ✗, attempt 2 ✓] ─┐
//! enqueue(O2) ─────────────── waits ─────────────┴─▶ [O2] ─┐
//! enqueue(O3) ─────────────────────────── waits ───────────┴─▶ [O3]
//! ```
//!
//! Entries run on spawned tasks so a caller dropping its future neither
//! cancels the operation nor breaks the chain for later entries.

#![allow(clippy::disallowed_types, reason = "Tail swap is synchronous")]

use std::{
    fmt,
    future::Future,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Default number of attempts per queued call (one retry).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Bounded retry policy for queued calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Run each call once and surface its first failure.
    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    /// Policy with `max_attempts` total attempts.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self { max_attempts: max_attempts.max(1) }
    }

    fn attempts(self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: DEFAULT_MAX_ATTEMPTS }
    }
}

/// A queued call that failed on every attempt.
///
/// Keeps the first failure alongside the last so the original cause is not
/// lost when the retry fails differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFailed<E> {
    attempts: u32,
    first: E,
    last: Option<E>,
}

impl<E> CallFailed<E> {
    /// Build a failure record. `last` is `None` when only one attempt ran.
    pub fn new(attempts: u32, first: E, last: Option<E>) -> Self {
        Self { attempts, first, last }
    }

    /// Number of attempts made.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Error from the first attempt.
    pub fn first(&self) -> &E {
        &self.first
    }

    /// Error from the final attempt.
    pub fn last(&self) -> &E {
        self.last.as_ref().unwrap_or(&self.first)
    }
}

impl<E: fmt::Display> fmt::Display for CallFailed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last {
            Some(last) => write!(
                f,
                "call failed after {} attempts: {last} (first failure: {})",
                self.attempts, self.first
            ),
            None => write!(f, "call failed after {} attempt: {}", self.attempts, self.first),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CallFailed<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.last())
    }
}

/// FIFO chain of state-mutating operations.
///
/// # Invariants
///
/// - Entries start in submission order
/// - An entry starts only after its predecessor settled (success, failure or
///   panic)
/// - The chain itself never fails; only an entry's own result can
pub struct CallSerializer {
    /// Settlement signal of the most recently accepted entry
    tail: Mutex<Option<oneshot::Receiver<()>>>,
    policy: RetryPolicy,
    submitted: AtomicU64,
}

impl CallSerializer {
    /// Create an empty serializer using `policy` for every entry.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { tail: Mutex::new(None), policy, submitted: AtomicU64::new(0) }
    }

    /// Queue `operation` behind every previously enqueued one.
    ///
    /// The queue position is taken when this method is called, not when the
    /// returned future is first polled. The operation is invoked again on
    /// failure, up to the policy's attempt limit.
    ///
    /// # Panics
    ///
    /// Must be called within a Tokio runtime. If `operation` panics, the panic
    /// is resumed in the awaiting caller after the chain has been released.
    pub fn enqueue<T, E, F, Fut>(
        &self,
        operation: F,
    ) -> impl Future<Output = Result<T, CallFailed<E>>> + Send + use<T, E, F, Fut>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (settled, settled_rx) = oneshot::channel();
        let previous = self.tail.lock().unwrap_or_else(PoisonError::into_inner).replace(settled_rx);
        let position = self.submitted.fetch_add(1, Ordering::Relaxed);
        let policy = self.policy;

        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                // Err means the predecessor's task ended without signalling
                // (panic); either way it has settled
                let _ = previous.await;
            }
            debug!(position, "queued call starting");
            let result = run_with_retry(policy, position, operation).await;
            let _ = settled.send(());
            result
        });

        async move {
            match task.await {
                Ok(result) => result,
                Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
            }
        }
    }
}

impl Default for CallSerializer {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

async fn run_with_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    position: u64,
    mut operation: F,
) -> Result<T, CallFailed<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.attempts();
    let mut first_failure = None;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(position, attempt, "queued call succeeded after retry");
                }
                return Ok(value);
            },
            Err(err) if attempt >= max_attempts => {
                warn!(position, attempt, error = %err, "queued call failed, giving up");
                return Err(match first_failure {
                    Some(first) => CallFailed::new(attempt, first, Some(err)),
                    None => CallFailed::new(attempt, err, None),
                });
            },
            Err(err) => {
                warn!(position, attempt, error = %err, "queued call failed, retrying");
                if first_failure.is_none() {
                    first_failure = Some(err);
                }
            },
        }
    }
}
