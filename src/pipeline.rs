//! The generation pipeline state machine.
//!
//! One [`GenerationPipeline`] drives one UI surface:
//!
//! ```text
//! Idle → Uploading → Summarizing → Ready → GeneratingArtifact → Polling → Done
//!                                                    └──── (quiz, flashcards) ──→ Done
//! ```
//!
//! `Error` is reachable from every non-terminal state; [`reset`] returns to
//! `Idle`, and a new upload supersedes whatever was running.
//!
//! # Write authority
//!
//! Every user action that starts a flow (upload, generate, explicit
//! selection, reset) takes a fresh [`Authority`] from the pipeline's clock.
//! A continuation may change pipeline state or the selection only while its
//! authority is still current, and the check happens under the same lock as
//! the write. A slow response of an older flow therefore becomes a
//! [`PipelineError::StaleOperationDiscarded`] instead of clobbering a newer
//! result, regardless of the order in which responses arrive.
//!
//! [`reset`]: GenerationPipeline::reset

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use studyflow_core::cell::{Authority, AuthorityClock};
use studyflow_core::error::{PipelineError, Stage};
use studyflow_core::models::{
    ArtifactKind, ArtifactOptions, ArtifactOutcome, DocumentId, SourceDocument, SummaryId,
    SummaryRecord, SummaryStyle, UploadLimits,
};
use studyflow_core::selection::{
    FillPolicy, SelectionSource, SelectionState, SelectionSynchronizer, SummaryListing,
};

use crate::backend::{Backend, GenerateRequest, UploadReceipt};
use crate::config::Config;
use crate::poller::{JobPoller, PollScope, PollSettings};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::session::Session;
use crate::stage::{Admission, RetryPolicy, StageRunner};
use crate::studio::Surface;

/// Observable pipeline state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Uploading {
        document: String,
    },
    Summarizing {
        document_id: DocumentId,
    },
    Ready {
        summary_id: SummaryId,
    },
    GeneratingArtifact {
        target_id: SummaryId,
        kind: ArtifactKind,
    },
    Polling {
        target_id: SummaryId,
        kind: ArtifactKind,
    },
    Done {
        outcome: ArtifactOutcome,
    },
    Error {
        stage: Stage,
        message: String,
    },
}

impl PipelineState {
    /// Short machine-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading { .. } => "uploading",
            Self::Summarizing { .. } => "summarizing",
            Self::Ready { .. } => "ready",
            Self::GeneratingArtifact { .. } => "generating",
            Self::Polling { .. } => "polling",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// Upload and summarize run as one fused step.
    pub fn is_producing_summary(&self) -> bool {
        matches!(self, Self::Uploading { .. } | Self::Summarizing { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Uploading { document } => write!(f, "uploading {}", document),
            Self::Summarizing { document_id } => write!(f, "summarizing {}", document_id),
            Self::Ready { summary_id } => write!(f, "ready with summary {}", summary_id),
            Self::GeneratingArtifact { target_id, kind } => {
                write!(f, "generating {} for summary {}", kind, target_id)
            }
            Self::Polling { target_id, kind } => {
                write!(f, "waiting for {} of summary {}", kind, target_id)
            }
            Self::Done { outcome } => match outcome {
                ArtifactOutcome::Quiz { questions } => {
                    write!(f, "done: quiz with {} questions", questions.len())
                }
                ArtifactOutcome::Flashcards { cards } => {
                    write!(f, "done: {} flashcards", cards.len())
                }
                ArtifactOutcome::Video { url } => write!(f, "done: video at {}", url),
            },
            Self::Error { message, .. } => write!(f, "error: {}", message),
        }
    }
}

/// Tunables shared by every pipeline of a session.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub retry: RetryPolicy,
    pub polling: PollSettings,
    pub style: SummaryStyle,
    pub limits: UploadLimits,
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retry),
            polling: PollSettings::from(&config.polling),
            style: config.summarize.style,
            limits: config.upload.limits(),
        }
    }
}

/// Result of a successful upload-and-summarize run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub receipt: UploadReceipt,
    pub summary: SummaryRecord,
}

pub struct GenerationPipeline {
    surface: Surface,
    session: Arc<Session>,
    backend: Arc<dyn Backend>,
    selection: SelectionState,
    clock: Arc<AuthorityClock>,
    state: Mutex<PipelineState>,
    upload: StageRunner,
    summarize: StageRunner,
    listing: StageRunner,
    generate: StageRunner,
    poller: JobPoller,
    active_poll: Mutex<Option<(Authority, CancellationToken)>>,
    reporter: Arc<dyn ProgressReporter>,
    style: SummaryStyle,
    limits: UploadLimits,
}

impl GenerationPipeline {
    pub fn new(
        surface: Surface,
        session: Arc<Session>,
        backend: Arc<dyn Backend>,
        settings: &PipelineSettings,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        let runner = |stage, admission| {
            StageRunner::new(stage, admission, settings.retry).with_reporter(Arc::clone(&reporter))
        };
        Self {
            surface,
            session,
            selection: SelectionState::new(),
            clock: Arc::new(AuthorityClock::new()),
            state: Mutex::new(PipelineState::Idle),
            upload: runner(Stage::Upload, Admission::Superseding),
            summarize: runner(Stage::Summarize, Admission::Superseding),
            listing: runner(Stage::ListSummaries, Admission::Superseding),
            generate: runner(Stage::GenerateArtifact, Admission::Exclusive),
            poller: JobPoller::new(Arc::clone(&backend), settings.polling)
                .with_reporter(Arc::clone(&reporter)),
            backend,
            active_poll: Mutex::new(None),
            reporter,
            style: settings.style,
            limits: settings.limits.clone(),
        }
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn state(&self) -> PipelineState {
        self.state.lock().clone()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn is_in_flight(&self, stage: Stage) -> bool {
        match stage {
            Stage::Upload => self.upload.is_in_flight(),
            Stage::Summarize => self.summarize.is_in_flight(),
            Stage::ListSummaries => self.listing.is_in_flight(),
            Stage::GenerateArtifact => self.generate.is_in_flight(),
            Stage::PollJob => self.active_poll.lock().is_some(),
        }
    }

    // ============ Operations ============

    /// Upload `document` and summarize it, making the new summary the
    /// selection. Supersedes every flow that was running on this pipeline.
    pub async fn submit_document(
        &self,
        document: SourceDocument,
    ) -> Result<Submission, PipelineError> {
        if let Err(err) = document.validate(&self.limits) {
            warn!(
                surface = %self.surface,
                document = %document.name,
                cause = %err.cause,
                "document rejected"
            );
            return Err(err.into());
        }

        let authority = self.begin();
        let started = self.advance_with(
            authority,
            PipelineState::Uploading {
                document: document.name.clone(),
            },
            || self.selection.clear(),
        );
        if !started {
            return Err(PipelineError::stale(Stage::Upload));
        }

        let uploaded = self
            .upload
            .run(
                || self.clock.is_current(authority),
                || self.backend.upload(&self.session, &document),
            )
            .await;
        let receipt = self.settle(authority, Stage::Upload, uploaded)?;
        info!(
            surface = %self.surface,
            document_id = %receipt.document_id,
            points_earned = receipt.points_earned,
            "document uploaded"
        );
        drop(document);

        let document_id = receipt.document_id.clone();
        if !self.advance(
            authority,
            PipelineState::Summarizing {
                document_id: document_id.clone(),
            },
        ) {
            return Err(PipelineError::stale(Stage::Upload));
        }

        let summarized = self
            .summarize
            .run(
                || self.clock.is_current(authority),
                || self.backend.summarize(&self.session, &document_id, self.style),
            )
            .await;
        let summary = self.settle(authority, Stage::Summarize, summarized)?.into_record();

        let summary_id = summary.id;
        let committed = self.advance_with(authority, PipelineState::Ready { summary_id }, || {
            self.selection.select(summary_id, SelectionSource::Summarized);
        });
        if !committed {
            warn!(
                surface = %self.surface,
                summary_id = %summary_id,
                "discarding summary of superseded upload"
            );
            return Err(PipelineError::stale(Stage::Summarize));
        }
        info!(surface = %self.surface, summary_id = %summary_id, "summary ready");
        Ok(Submission { receipt, summary })
    }

    /// Generate an artifact for the summary selected *now*.
    ///
    /// Fails with a validation error, without touching the backend or the
    /// pipeline state, when nothing is selected or another generation
    /// request of this pipeline is still in flight.
    pub async fn generate(
        &self,
        kind: ArtifactKind,
        options: ArtifactOptions,
    ) -> Result<ArtifactOutcome, PipelineError> {
        let Some(target_id) = self.selection.current() else {
            return Err(PipelineError::validation(
                Stage::GenerateArtifact,
                "no summary available",
            ));
        };
        let permit = self.generate.admit()?;

        let authority = self.begin();
        if !self.advance(authority, PipelineState::GeneratingArtifact { target_id, kind }) {
            return Err(PipelineError::stale(Stage::GenerateArtifact));
        }

        let request = GenerateRequest {
            summary_id: target_id,
            kind,
            options: options.normalized_for(kind),
        };
        let generated = self
            .generate
            .run_admitted(
                permit,
                || self.clock.is_current(authority),
                || self.backend.generate_artifact(&self.session, &request),
            )
            .await;
        let response = self.settle(authority, Stage::GenerateArtifact, generated)?;

        if !response.accepted {
            return Err(self.fail(
                authority,
                PipelineError::validation(
                    Stage::GenerateArtifact,
                    "the backend did not accept the request",
                ),
            ));
        }

        let outcome = match response.payload {
            Some(payload) => ArtifactOutcome::from_sync_payload(kind, payload)
                .map_err(|err| self.fail(authority, err.into()))?,
            None if kind.is_async() => self.await_job(authority, target_id, kind).await?,
            None => {
                return Err(self.fail(
                    authority,
                    PipelineError::MalformedResponse {
                        stage: Stage::GenerateArtifact,
                        cause: format!("{} generation returned no payload", kind),
                    },
                ))
            }
        };

        if !self.advance(
            authority,
            PipelineState::Done {
                outcome: outcome.clone(),
            },
        ) {
            return Err(PipelineError::stale(Stage::GenerateArtifact));
        }
        Ok(outcome)
    }

    async fn await_job(
        &self,
        authority: Authority,
        target_id: SummaryId,
        kind: ArtifactKind,
    ) -> Result<ArtifactOutcome, PipelineError> {
        if !self.advance(authority, PipelineState::Polling { target_id, kind }) {
            return Err(PipelineError::stale(Stage::PollJob));
        }

        let cancel = CancellationToken::new();
        *self.active_poll.lock() = Some((authority, cancel.clone()));
        let scope = PollScope {
            cell: Arc::clone(self.selection.cell()),
            clock: Arc::clone(&self.clock),
            authority,
            cancel,
        };
        let polled = self.poller.poll(target_id, kind, &scope).await;
        {
            let mut active = self.active_poll.lock();
            if matches!(*active, Some((owner, _)) if owner == authority) {
                *active = None;
            }
        }

        let job = polled.map_err(|err| self.fail(authority, err))?;
        match job.result_url {
            Some(url) => Ok(ArtifactOutcome::Video { url }),
            None => Err(self.fail(
                authority,
                PipelineError::MalformedResponse {
                    stage: Stage::PollJob,
                    cause: "job finished without a result url".to_string(),
                },
            )),
        }
    }

    /// Explicit user selection. Always wins; a job polling for another
    /// summary is left to finish and its result is discarded.
    pub fn select_summary(&self, summary_id: SummaryId) {
        let authority = self.clock.acquire();
        self.advance_with(authority, PipelineState::Ready { summary_id }, || {
            self.selection.select(summary_id, SelectionSource::User);
        });
    }

    /// Fetch the user's summaries and reconcile them with the selection.
    ///
    /// Runs independently of the pipeline's own flow and never changes its
    /// state. While a summary is being produced the refresh does not fill an
    /// empty selection.
    pub async fn refresh_summaries(&self) -> Result<SummaryListing, PipelineError> {
        let records = self
            .listing
            .run(|| true, || self.backend.list_summaries(&self.session))
            .await?;

        let state = self.state.lock();
        let policy = if state.is_producing_summary() {
            FillPolicy::Never
        } else {
            FillPolicy::FillIfUnset
        };
        let listing = SelectionSynchronizer::reconcile(records, &self.selection, policy);
        debug!(
            surface = %self.surface,
            summaries = listing.records.len(),
            selected = ?listing.selected,
            "summaries refreshed"
        );
        Ok(listing)
    }

    /// Abandon whatever is running and return to `Idle`. The selection is
    /// kept.
    pub fn reset(&self) {
        let authority = self.begin();
        self.advance(authority, PipelineState::Idle);
    }

    /// Stop for good: cancel the poller and invalidate every outstanding
    /// continuation. Used when the session ends.
    pub fn shutdown(&self) {
        self.clock.revoke_all();
        if let Some((_, cancel)) = self.active_poll.lock().take() {
            cancel.cancel();
        }
        *self.state.lock() = PipelineState::Idle;
        debug!(surface = %self.surface, "pipeline shut down");
    }

    // ============ Transitions ============

    /// Take write authority for a new flow and stop the live poller.
    fn begin(&self) -> Authority {
        let authority = self.clock.acquire();
        if let Some((_, cancel)) = self.active_poll.lock().take() {
            debug!(surface = %self.surface, "cancelling previous poller");
            cancel.cancel();
        }
        authority
    }

    fn advance(&self, authority: Authority, next: PipelineState) -> bool {
        self.advance_with(authority, next, || {})
    }

    /// Apply `write` and move to `next` if `authority` is still current.
    fn advance_with(
        &self,
        authority: Authority,
        next: PipelineState,
        write: impl FnOnce(),
    ) -> bool {
        let mut state = self.state.lock();
        if !self.clock.is_current(authority) {
            return false;
        }
        write();
        info!(
            surface = %self.surface,
            from = state.name(),
            to = next.name(),
            "pipeline transition"
        );
        *state = next;
        self.reporter.report(&ProgressEvent::Transition {
            surface: self.surface,
            state: state.clone(),
        });
        true
    }

    /// Keep a stage result only if its flow still owns the pipeline.
    fn settle<T>(
        &self,
        authority: Authority,
        stage: Stage,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        match result {
            Ok(value) if self.clock.is_current(authority) => Ok(value),
            Ok(_) => {
                warn!(
                    surface = %self.surface,
                    stage = %stage,
                    "discarding result of superseded operation"
                );
                Err(PipelineError::stale(stage))
            }
            Err(err) => Err(self.fail(authority, err)),
        }
    }

    /// Move to `Error` for `err`, or downgrade it to stale when the flow
    /// was superseded.
    fn fail(&self, authority: Authority, err: PipelineError) -> PipelineError {
        if err.is_stale() {
            return err;
        }
        let stage = err.stage();
        let message = err.user_message().unwrap_or_else(|| err.to_string());
        if self.advance(authority, PipelineState::Error { stage, message }) {
            err
        } else {
            warn!(
                surface = %self.surface,
                stage = %stage,
                error = %err,
                "discarding failure of superseded operation"
            );
            PipelineError::stale(stage)
        }
    }
}
