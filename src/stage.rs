//! Single-stage execution with retry and in-flight tracking.
//!
//! A [`StageRunner`] wraps exactly one kind of backend call. It retries
//! transient failures at a fixed backoff, lifts the settled outcome into a
//! [`PipelineError`], and keeps an in-flight count the UI reads to disable
//! duplicate submissions.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use studyflow_core::error::{PipelineError, Stage, StageError};

use crate::config::RetryConfig;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};

/// Retry budget for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.backoff(),
        }
    }
}

/// What happens when a call arrives while another is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Admit it; the pipeline decides which result is still wanted.
    Superseding,
    /// Reject it with a validation error.
    Exclusive,
}

/// Runs one stage's backend calls.
pub struct StageRunner {
    stage: Stage,
    admission: Admission,
    retry: RetryPolicy,
    in_flight: AtomicUsize,
    reporter: Arc<dyn ProgressReporter>,
}

/// Admission to a [`StageRunner`]; the in-flight count drops with it.
#[must_use]
pub struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StageRunner {
    pub fn new(stage: Stage, admission: Admission, retry: RetryPolicy) -> Self {
        Self {
            stage,
            admission,
            retry,
            in_flight: AtomicUsize::new(0),
            reporter: Arc::new(NoProgress),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Claim a slot, rejecting the call if the runner is exclusive and busy.
    pub fn admit(&self) -> Result<InFlight<'_>, PipelineError> {
        match self.admission {
            Admission::Superseding => {
                self.in_flight.fetch_add(1, Ordering::SeqCst);
            }
            Admission::Exclusive => {
                if self
                    .in_flight
                    .compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
                {
                    return Err(PipelineError::validation(
                        self.stage,
                        format!("{} already in progress", self.stage),
                    ));
                }
            }
        }
        Ok(InFlight(&self.in_flight))
    }

    /// Run `call` until it succeeds, fails permanently, or exhausts the
    /// retry budget.
    ///
    /// `still_wanted` is consulted before every retry; once it returns
    /// `false` the runner stops and reports the result as stale.
    pub async fn run<T, F, Fut>(
        &self,
        still_wanted: impl Fn() -> bool,
        call: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let permit = self.admit()?;
        self.run_admitted(permit, still_wanted, call).await
    }

    /// Like [`run`](Self::run), for a caller that already holds a permit.
    pub async fn run_admitted<T, F, Fut>(
        &self,
        _permit: InFlight<'_>,
        still_wanted: impl Fn() -> bool,
        mut call: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match call().await {
                Ok(value) => {
                    debug!(stage = %self.stage, attempt, "stage call succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt <= self.retry.max_retries => {
                    warn!(
                        stage = %self.stage,
                        attempt,
                        cause = %err.cause,
                        "transient stage failure, retrying"
                    );
                    self.reporter.report(&ProgressEvent::Retry {
                        stage: self.stage,
                        attempt,
                        cause: err.cause.clone(),
                    });
                    tokio::time::sleep(self.retry.backoff).await;
                    if !still_wanted() {
                        debug!(stage = %self.stage, "retry abandoned, operation superseded");
                        return Err(PipelineError::stale(self.stage));
                    }
                }
                Err(err) => {
                    warn!(stage = %self.stage, attempt, cause = %err.cause, "stage failed");
                    return Err(PipelineError::from_stage(err, attempt));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::testing::RecordingProgress;
    use parking_lot::Mutex;
    use studyflow_core::error::ErrorCategory;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let progress = Arc::new(RecordingProgress::default());
        let runner = StageRunner::new(Stage::Summarize, Admission::Superseding, policy(3))
            .with_reporter(progress.clone());
        let attempts = Mutex::new(0u32);

        let started = tokio::time::Instant::now();
        let out = runner
            .run(
                || true,
                || {
                    let n = {
                        let mut a = attempts.lock();
                        *a += 1;
                        *a
                    };
                    async move {
                        if n < 3 {
                            Err(StageError::transient(Stage::Summarize, "503"))
                        } else {
                            Ok(n)
                        }
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(out, 3);
        assert_eq!(progress.retries(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert!(!runner.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_escalates() {
        let runner = StageRunner::new(Stage::Upload, Admission::Superseding, policy(2));
        let err = runner
            .run(
                || true,
                || async { Err::<(), _>(StageError::transient(Stage::Upload, "reset")) },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::TransientNetwork {
                stage: Stage::Upload,
                cause: "reset".to_string(),
                attempts: 3,
            }
        );
    }

    #[tokio::test]
    async fn rejections_are_not_retried() {
        let runner = StageRunner::new(Stage::Upload, Admission::Superseding, policy(5));
        let calls = Mutex::new(0);
        let err = runner
            .run(
                || true,
                || {
                    *calls.lock() += 1;
                    async { Err::<(), _>(StageError::rejected(Stage::Upload, "pdf only")) }
                },
            )
            .await
            .unwrap_err();
        assert_eq!(*calls.lock(), 1);
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_retry_is_stale() {
        let runner = StageRunner::new(Stage::Summarize, Admission::Superseding, policy(3));
        let err = runner
            .run(
                || false,
                || async { Err::<(), _>(StageError::transient(Stage::Summarize, "503")) },
            )
            .await
            .unwrap_err();
        assert!(err.is_stale());
    }

    #[tokio::test]
    async fn exclusive_runner_rejects_duplicates() {
        let runner = Arc::new(StageRunner::new(
            Stage::GenerateArtifact,
            Admission::Exclusive,
            RetryPolicy::none(),
        ));
        let gate = Arc::new(tokio::sync::Notify::new());

        let first = {
            let runner = Arc::clone(&runner);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                runner
                    .run(
                        || true,
                        || {
                            let gate = Arc::clone(&gate);
                            async move {
                                gate.notified().await;
                                Ok::<_, StageError>(1)
                            }
                        },
                    )
                    .await
            })
        };

        while !runner.is_in_flight() {
            tokio::task::yield_now().await;
        }
        let dup = runner
            .run(|| true, || async { Ok::<_, StageError>(2) })
            .await
            .unwrap_err();
        assert_eq!(dup.category(), ErrorCategory::Validation);

        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), 1);
        assert!(!runner.is_in_flight());
    }
}
