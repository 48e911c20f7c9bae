//! Stage executor: fan-out, deadlines, retries, and fault isolation.
//!
//! Each enabled stage runs as its own tokio task under an independent
//! deadline. Deadline expiry yields `TimedOut` (distinct from `Failed`);
//! transient errors are retried with exponential backoff under the
//! [`RetryPolicy`], inside the stage's deadline; internal and not-found
//! errors are never retried. A panicking adapter becomes
//! `Failed(Internal, …)` — the executor itself never fails because one
//! adapter misbehaved. Dropping the `execute` future aborts every
//! in-flight stage task, so cancelling one orchestration run cannot leak
//! work or disturb other runs.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::config::ExecutorConfig;
use crate::models::{Document, StageName, StageResult};
use crate::stages::Stage;

/// Bounded retry with exponential backoff, applied only to transient
/// stage errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff before the attempt after `attempt`: base, 2×base, 4×base, …
    /// capped at 32×base.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }

    fn should_retry(&self, err: &crate::error::StageError, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.max_attempts
    }
}

pub struct StageExecutor {
    stage_deadline: Duration,
    summarizer_deadline: Duration,
    retry: RetryPolicy,
}

impl StageExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            stage_deadline: Duration::from_secs(config.stage_deadline_secs),
            summarizer_deadline: Duration::from_secs(config.summarizer_deadline_secs),
            retry: RetryPolicy::new(
                config.max_attempts,
                Duration::from_millis(config.retry_base_delay_ms),
            ),
        }
    }

    fn deadline_for(&self, stage: StageName) -> Duration {
        match stage {
            StageName::Summarizer => self.summarizer_deadline,
            _ => self.stage_deadline,
        }
    }

    /// Run every stage over the document and collect one terminal
    /// [`StageResult`] per stage. Never blocks past the longest stage
    /// deadline, and never returns an error.
    pub async fn execute(
        &self,
        document: &Document,
        stages: &[Arc<dyn Stage>],
    ) -> BTreeMap<StageName, StageResult> {
        let mut results = BTreeMap::new();
        let mut tasks: Vec<(StageName, StageTask)> = Vec::new();

        for stage in stages {
            let name = stage.name();
            if !stage.is_enabled() {
                results.insert(name, StageResult::Skipped);
                continue;
            }
            let stage = Arc::clone(stage);
            let document = document.clone();
            let deadline = self.deadline_for(name);
            let retry = self.retry.clone();
            let handle = tokio::spawn(async move {
                match tokio::time::timeout(deadline, run_attempts(stage, &document, &retry)).await
                {
                    Ok(result) => result,
                    Err(_) => StageResult::TimedOut,
                }
            });
            tasks.push((name, StageTask { handle }));
        }

        for (name, mut task) in tasks {
            let result = match (&mut task.handle).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => StageResult::Failed {
                    kind: crate::error::StageErrorKind::Internal,
                    message: format!("stage task panicked: {err}"),
                },
                Err(err) => StageResult::Failed {
                    kind: crate::error::StageErrorKind::Internal,
                    message: format!("stage task was cancelled: {err}"),
                },
            };
            results.insert(name, result);
        }
        results
    }
}

/// Aborts the stage task when the executor future is dropped mid-run.
struct StageTask {
    handle: JoinHandle<StageResult>,
}

impl Drop for StageTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The bounded retry loop for one stage. Runs entirely inside the stage
/// deadline; a panic in the adapter is caught here and classified as an
/// internal failure.
async fn run_attempts(
    stage: Arc<dyn Stage>,
    document: &Document,
    retry: &RetryPolicy,
) -> StageResult {
    let mut attempt = 1u32;
    loop {
        let outcome = AssertUnwindSafe(stage.run(document)).catch_unwind().await;
        match outcome {
            Ok(Ok(payload)) => return StageResult::Success(payload),
            Ok(Err(err)) if retry.should_retry(&err, attempt) => {
                eprintln!(
                    "Warning: stage {} attempt {} failed ({}), retrying",
                    stage.name(),
                    attempt,
                    err
                );
                tokio::time::sleep(retry.delay_after(attempt)).await;
                attempt += 1;
            }
            Ok(Err(err)) => return StageResult::failed(err),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "stage panicked".to_string());
                return StageResult::Failed {
                    kind: crate::error::StageErrorKind::Internal,
                    message,
                };
            }
        }
    }
}
