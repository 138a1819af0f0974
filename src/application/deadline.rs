use crate::error::{CreditError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

/// Caller-supplied time budget for one externally triggered operation.
///
/// Waits (lock acquisition, store reads, scoring) are bounded with
/// [`Deadline::bound`]. Writes are never interrupted: [`Deadline::check`] runs
/// once before an operation starts committing, and the commit then runs to the
/// end so an expired budget cannot leave half-written state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn within(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
        }
    }

    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_expired() {
            Err(CreditError::Timeout)
        } else {
            Ok(())
        }
    }

    /// Awaits `fut`, giving up with `Timeout` once the deadline passes.
    pub async fn bound<F: Future>(&self, fut: F) -> Result<F::Output> {
        self.check()?;
        match self.at {
            None => Ok(fut.await),
            Some(at) => timeout_at(at, fut).await.map_err(|_| CreditError::Timeout),
        }
    }
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unbounded()
    }
}
