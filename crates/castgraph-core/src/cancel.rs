//! # Cancellation
//!
//! Cooperative cancellation for traversal queries.
//!
//! A `CancelToken` combines a shared flag, which another thread may set, with
//! an optional deadline. Traversals call `check` once per dequeued node and
//! abort with `CastError::Cancelled` as soon as either fires.

use crate::CastError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cancellation signal shared between a caller and a running traversal.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only fires when `cancel` is called.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that also fires once `timeout` has elapsed from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(timeout),
        }
    }

    /// Timeout helper taking milliseconds, as configured in query settings.
    #[must_use]
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self::with_timeout(Duration::from_millis(timeout_ms))
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested or the deadline passed.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
            || self
                .deadline
                .is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Return `Err(CastError::Cancelled)` if the token has fired.
    pub fn check(&self) -> Result<(), CastError> {
        if self.is_cancelled() {
            Err(CastError::Cancelled)
        } else {
            Ok(())
        }
    }
}
