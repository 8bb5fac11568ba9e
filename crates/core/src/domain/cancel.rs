use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared flag raised when the user asks the run to stop.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-repository time budget checked cooperatively by collectors
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn unbounded() -> Self {
        Self {
            started: Instant::now(),
            limit: None,
        }
    }

    pub fn after(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit: Some(limit),
        }
    }

    /// `None` or a zero duration means no limit.
    pub fn from_limit(limit: Option<Duration>) -> Self {
        match limit {
            Some(limit) if !limit.is_zero() => Self::after(limit),
            _ => Self::unbounded(),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.started.elapsed() >= limit)
    }

    pub fn check(&self) -> Result<(), DeadlineExceeded> {
        match self.limit {
            Some(limit) if self.started.elapsed() >= limit => Err(DeadlineExceeded { limit }),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("timed out after {}s", limit.as_secs())]
pub struct DeadlineExceeded {
    pub limit: Duration,
}
