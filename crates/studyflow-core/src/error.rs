//! Error taxonomy for pipeline stages and whole pipeline runs.
//!
//! A single network call fails with a [`StageError`]; the pipeline lifts it
//! into a [`PipelineError`] once retries are settled.
//!
//! | Category | Retried | User visible |
//! |----------|---------|--------------|
//! | `Validation` | no | yes, inline |
//! | `TransientNetwork` | yes, fixed backoff up to a bound | yes, after escalation |
//! | `MalformedResponse` | no | yes |
//! | `JobFailed` | no | yes, with backend detail |
//! | `PollingTimeout` | no | yes, generic message |
//! | `StaleOperationDiscarded` | no | never |

use std::fmt;

use crate::models::SummaryId;

/// One network-bound step of the generation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Upload,
    Summarize,
    ListSummaries,
    GenerateArtifact,
    PollJob,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Upload,
        Stage::Summarize,
        Stage::ListSummaries,
        Stage::GenerateArtifact,
        Stage::PollJob,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Upload => "upload",
            Stage::Summarize => "summarize",
            Stage::ListSummaries => "summary listing",
            Stage::GenerateArtifact => "artifact generation",
            Stage::PollJob => "job polling",
        })
    }
}

/// How a stage call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageErrorKind {
    /// Input refused by the client or the backend (4xx). Not retried.
    Rejected,
    /// Connectivity problem, timeout, or 5xx. Retried.
    Transient,
    /// A success status with a body that does not decode.
    Malformed,
}

/// Normalized failure of a single stage call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{stage} failed: {cause}")]
pub struct StageError {
    pub stage: Stage,
    pub kind: StageErrorKind,
    pub cause: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
}

impl StageError {
    pub fn new(stage: Stage, kind: StageErrorKind, cause: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            cause: cause.into(),
            status: None,
        }
    }

    pub fn rejected(stage: Stage, cause: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Rejected, cause)
    }

    pub fn transient(stage: Stage, cause: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Transient, cause)
    }

    pub fn malformed(stage: Stage, cause: impl Into<String>) -> Self {
        Self::new(stage, StageErrorKind::Malformed, cause)
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[inline]
    pub fn is_retryable(&self) -> bool {
        self.kind == StageErrorKind::Transient
    }
}

/// Coarse classification of a [`PipelineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    TransientNetwork,
    MalformedResponse,
    JobFailed,
    PollingTimeout,
    StaleOperationDiscarded,
}

/// Terminal failure of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} rejected: {message}")]
    Validation { stage: Stage, message: String },

    #[error("{stage} failed after {attempts} attempt(s): {cause}")]
    TransientNetwork {
        stage: Stage,
        cause: String,
        attempts: u32,
    },

    #[error("{stage} returned an unreadable response: {cause}")]
    MalformedResponse { stage: Stage, cause: String },

    #[error("job polling failed for summary {target_id}: {detail}")]
    JobFailed { target_id: SummaryId, detail: String },

    #[error("job polling gave up on summary {target_id} after {attempts} status checks ({waited_ms} ms)")]
    PollingTimeout {
        target_id: SummaryId,
        attempts: u32,
        waited_ms: u64,
    },

    #[error("stale {stage} result discarded")]
    StaleOperationDiscarded { stage: Stage },
}

impl PipelineError {
    pub fn validation(stage: Stage, message: impl Into<String>) -> Self {
        Self::Validation {
            stage,
            message: message.into(),
        }
    }

    pub fn stale(stage: Stage) -> Self {
        Self::StaleOperationDiscarded { stage }
    }

    /// Lift a settled stage failure, recording how many attempts were made.
    pub fn from_stage(err: StageError, attempts: u32) -> Self {
        match err.kind {
            StageErrorKind::Rejected => Self::Validation {
                stage: err.stage,
                message: err.cause,
            },
            StageErrorKind::Transient => Self::TransientNetwork {
                stage: err.stage,
                cause: err.cause,
                attempts,
            },
            StageErrorKind::Malformed => Self::MalformedResponse {
                stage: err.stage,
                cause: err.cause,
            },
        }
    }

    /// Stage the failure is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Validation { stage, .. }
            | Self::TransientNetwork { stage, .. }
            | Self::MalformedResponse { stage, .. }
            | Self::StaleOperationDiscarded { stage } => *stage,
            Self::JobFailed { .. } | Self::PollingTimeout { .. } => Stage::PollJob,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::TransientNetwork { .. } => ErrorCategory::TransientNetwork,
            Self::MalformedResponse { .. } => ErrorCategory::MalformedResponse,
            Self::JobFailed { .. } => ErrorCategory::JobFailed,
            Self::PollingTimeout { .. } => ErrorCategory::PollingTimeout,
            Self::StaleOperationDiscarded { .. } => ErrorCategory::StaleOperationDiscarded,
        }
    }

    #[inline]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleOperationDiscarded { .. })
    }

    /// Message to render for the user, or `None` for internal signals.
    pub fn user_message(&self) -> Option<String> {
        match self {
            Self::StaleOperationDiscarded { .. } => None,
            Self::PollingTimeout { .. } => Some(format!(
                "{} failed: the video is taking too long, please try again later",
                self.stage()
            )),
            other => Some(other.to_string()),
        }
    }
}

impl From<StageError> for PipelineError {
    fn from(err: StageError) -> Self {
        Self::from_stage(err, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(StageError::transient(Stage::Upload, "timeout").is_retryable());
        assert!(!StageError::rejected(Stage::Upload, "bad file").is_retryable());
        assert!(!StageError::malformed(Stage::Summarize, "eof").is_retryable());
    }

    #[test]
    fn stage_error_names_stage() {
        let err = StageError::transient(Stage::Summarize, "connection reset").with_status(503);
        assert_eq!(err.to_string(), "summarize failed: connection reset");
        assert_eq!(err.status, Some(503));
    }

    #[test]
    fn lifting_maps_kinds_to_categories() {
        let rejected = PipelineError::from(StageError::rejected(Stage::Upload, "pdf only"));
        assert_eq!(rejected.category(), ErrorCategory::Validation);
        assert_eq!(rejected.to_string(), "upload rejected: pdf only");

        let transient =
            PipelineError::from_stage(StageError::transient(Stage::Summarize, "503"), 4);
        assert_eq!(
            transient,
            PipelineError::TransientNetwork {
                stage: Stage::Summarize,
                cause: "503".to_string(),
                attempts: 4,
            }
        );

        let malformed =
            PipelineError::from(StageError::malformed(Stage::ListSummaries, "not json"));
        assert_eq!(malformed.category(), ErrorCategory::MalformedResponse);
        assert_eq!(malformed.stage(), Stage::ListSummaries);
    }

    #[test]
    fn stale_is_never_user_visible() {
        let stale = PipelineError::stale(Stage::PollJob);
        assert!(stale.is_stale());
        assert_eq!(stale.user_message(), None);

        let failed = PipelineError::JobFailed {
            target_id: SummaryId(3),
            detail: "ffmpeg crashed".to_string(),
        };
        assert_eq!(failed.stage(), Stage::PollJob);
        let msg = failed.user_message().unwrap();
        assert_eq!(msg, "job polling failed for summary 3: ffmpeg crashed");
    }

    #[test]
    fn timeout_message_names_stage() {
        let err = PipelineError::PollingTimeout {
            target_id: SummaryId(9),
            attempts: 200,
            waited_ms: 600_000,
        };
        assert!(err.user_message().unwrap().starts_with("job polling failed"));
    }
}
