//! Per-call cancellation and deadlines.
//!
//! A [`CallContext`] travels with one call through every blocking step
//! (admission, guardrail processes, statement execution). Derived contexts
//! created with [`CallContext::with_timeout`] are cancelled when their parent
//! is, but cancelling or expiring a child never affects the parent. This lets
//! the pipeline bound statement execution while still using the caller's own
//! context to roll back.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Done {
    /// The cancellation signal fired.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context with no deadline that is only done when cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child context that expires after `timeout`, or at the
    /// parent's deadline if that is sooner.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child context that expires at `deadline`, or at the parent's
    /// deadline if that is sooner.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Fire the cancellation signal for this context and its children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the context has already finished, and why.
    pub fn status(&self) -> Option<Done> {
        if self.token.is_cancelled() {
            return Some(Done::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(Done::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.status().is_some()
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) {
        self.wait().await;
    }

    /// Like [`done`](Self::done), reporting which condition fired.
    pub async fn wait(&self) -> Done {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => Done::Cancelled,
                    _ = tokio::time::sleep_until(deadline) => Done::DeadlineExceeded,
                }
            }
            None => {
                self.token.cancelled().await;
                Done::Cancelled
            }
        }
    }

    /// Run `fut` unless the context finishes first.
    ///
    /// A context that is already done wins over a future that would complete
    /// immediately, so no new work starts on a finished context.
    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Done> {
        if let Some(done) = self.status() {
            return Err(done);
        }
        tokio::select! {
            biased;
            done = self.wait() => Err(done),
            out = fut => Ok(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_child_deadline_never_exceeds_parent() {
        let parent = CallContext::new().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(60));
        assert_eq!(child.deadline(), parent.deadline());
    }

    #[tokio::test]
    async fn test_parent_cancel_reaches_child() {
        let parent = CallContext::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        parent.cancel();
        assert_eq!(child.status(), Some(Done::Cancelled));
    }

    #[tokio::test]
    async fn test_child_cancel_does_not_reach_parent() {
        let parent = CallContext::new();
        let child = parent.with_timeout(Duration::from_secs(60));
        child.cancel();
        assert!(child.is_done());
        assert!(!parent.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_deadline() {
        let ctx = CallContext::new().with_timeout(Duration::from_millis(10));
        let result = ctx
            .run(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(result, Err(Done::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_run_refuses_finished_context() {
        let ctx = CallContext::new();
        ctx.cancel();
        let result = ctx.run(async { 42 }).await;
        assert_eq!(result, Err(Done::Cancelled));
    }

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = CallContext::new().with_timeout(Duration::from_secs(5));
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }
}
