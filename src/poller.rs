//! Bounded polling of server-side generation jobs.
//!
//! [`JobPoller::poll`] runs an explicit loop: wait one interval, check the
//! loop is still relevant, query the job status, check relevance again,
//! then act on the result. Relevance is decided by a [`PollScope`]:
//!
//! - the scope's [`CancellationToken`] has not been cancelled (pipeline reset,
//!   new pipeline on the same surface, logout);
//! - the scope's [`Authority`] is still the newest one handed out;
//! - the live [`IdentifierCell`] still holds the job's target id.
//!
//! A loop that finds itself irrelevant exits with
//! [`PipelineError::StaleOperationDiscarded`] and emits nothing else.
//! An in-flight status request is never aborted; its result is dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use studyflow_core::cell::{Authority, AuthorityClock, IdentifierCell};
use studyflow_core::error::{PipelineError, Stage, StageError};
use studyflow_core::models::{ArtifactKind, GenerationJob, JobStatus, SummaryId};

use crate::backend::Backend;
use crate::config::PollingConfig;
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};

/// Interval and bounds of a poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: Option<u32>,
    pub timeout: Duration,
}

impl From<&PollingConfig> for PollSettings {
    fn from(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts,
            timeout: config.timeout(),
        }
    }
}

/// Decides whether a poll loop is still allowed to act.
#[derive(Clone)]
pub struct PollScope {
    pub cell: Arc<IdentifierCell<SummaryId>>,
    pub clock: Arc<AuthorityClock>,
    pub authority: Authority,
    pub cancel: CancellationToken,
}

impl PollScope {
    pub fn is_superseded(&self, target_id: SummaryId) -> bool {
        self.cancel.is_cancelled()
            || !self.clock.is_current(self.authority)
            || !self.cell.holds(&target_id)
    }
}

/// Polls job status for one target until it reaches a terminal state.
pub struct JobPoller {
    backend: Arc<dyn Backend>,
    settings: PollSettings,
    reporter: Arc<dyn ProgressReporter>,
}

impl JobPoller {
    pub fn new(backend: Arc<dyn Backend>, settings: PollSettings) -> Self {
        Self {
            backend,
            settings,
            reporter: Arc::new(NoProgress),
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Poll until `done` (returns the finished job), `error`, timeout, a
    /// non-retryable status failure, or supersession.
    pub async fn poll(
        &self,
        target_id: SummaryId,
        kind: ArtifactKind,
        scope: &PollScope,
    ) -> Result<GenerationJob, PipelineError> {
        let started = Instant::now();
        let mut job = GenerationJob::new(target_id, kind);
        let mut attempts: u32 = 0;

        info!(
            summary_id = %target_id,
            interval_ms = self.settings.interval.as_millis() as u64,
            "polling job"
        );

        loop {
            tokio::select! {
                _ = scope.cancel.cancelled() => {
                    debug!(summary_id = %target_id, "poll loop cancelled");
                    return Err(PipelineError::stale(Stage::PollJob));
                }
                _ = tokio::time::sleep(self.settings.interval) => {}
            }

            if scope.is_superseded(target_id) {
                debug!(summary_id = %target_id, "poll loop superseded before tick");
                return Err(PipelineError::stale(Stage::PollJob));
            }

            attempts += 1;
            let result = self.backend.job_status(target_id).await;

            if scope.is_superseded(target_id) {
                debug!(summary_id = %target_id, attempts, "discarding status of superseded job");
                return Err(PipelineError::stale(Stage::PollJob));
            }

            match result {
                Ok(report) => {
                    job.apply(&report);
                    debug!(summary_id = %target_id, attempts, status = %job.status, "job status");
                    self.reporter.report(&ProgressEvent::PollTick {
                        target_id,
                        attempt: attempts,
                        status: Some(job.status),
                    });
                    match job.status {
                        JobStatus::Done => {
                            if job.result_url.is_none() {
                                return Err(StageError::malformed(
                                    Stage::PollJob,
                                    "job finished without a result url",
                                )
                                .into());
                            }
                            info!(summary_id = %target_id, attempts, "job finished");
                            return Ok(job);
                        }
                        JobStatus::Error => {
                            let detail = job
                                .error_detail
                                .clone()
                                .unwrap_or_else(|| "the backend reported an error".to_string());
                            warn!(summary_id = %target_id, detail = %detail, "job failed");
                            return Err(PipelineError::JobFailed { target_id, detail });
                        }
                        JobStatus::Queued | JobStatus::Processing => {}
                    }
                }
                Err(err) if err.is_retryable() => {
                    warn!(
                        summary_id = %target_id,
                        attempts,
                        cause = %err.cause,
                        "status check failed, will retry"
                    );
                    self.reporter.report(&ProgressEvent::PollTick {
                        target_id,
                        attempt: attempts,
                        status: None,
                    });
                }
                Err(err) => return Err(PipelineError::from_stage(err, attempts)),
            }

            let waited = started.elapsed();
            let out_of_attempts = self
                .settings
                .max_attempts
                .is_some_and(|max| attempts >= max);
            if out_of_attempts || waited >= self.settings.timeout {
                warn!(summary_id = %target_id, attempts, "job polling timed out");
                return Err(PipelineError::PollingTimeout {
                    target_id,
                    attempts,
                    waited_ms: waited.as_millis() as u64,
                });
            }
        }
    }
}
