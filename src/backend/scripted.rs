//! In-memory [`Backend`] that replays scripted responses.
//!
//! Each operation has a queue of responses, each with an optional latency.
//! A queue hands out its entries in order and then keeps repeating the last
//! one, so "processing forever" or "same listing every time" needs a single
//! entry. Every call is recorded with the runtime's clock, which makes poll
//! intervals observable under `tokio::time::pause`.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use studyflow_core::error::{Stage, StageError};
use studyflow_core::models::{
    DocumentId, JobStatus, JobStatusReport, SourceDocument, SummaryId, SummaryRecord, SummaryStyle,
};

use super::{Backend, GenerateRequest, GenerateResponse, SummarizeResponse, UploadReceipt};
use crate::session::Session;

/// Backend operation, as recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Upload,
    Summarize,
    ListSummaries,
    GenerateArtifact,
    JobStatus,
}

/// One recorded backend call.
#[derive(Debug, Clone)]
pub struct Call {
    pub op: Op,
    pub at: Instant,
    /// Summary id the call targeted (generate, job status).
    pub target: Option<SummaryId>,
    /// Document name (upload) or document id (summarize).
    pub document: Option<String>,
}

#[derive(Clone)]
struct Scripted<T> {
    delay: Duration,
    result: Result<T, StageError>,
}

struct Script<T> {
    stage: Stage,
    entries: VecDeque<Scripted<T>>,
}

impl<T: Clone> Script<T> {
    fn new(stage: Stage) -> Self {
        Self {
            stage,
            entries: VecDeque::new(),
        }
    }

    fn push(&mut self, delay: Duration, result: Result<T, StageError>) {
        self.entries.push_back(Scripted { delay, result });
    }

    fn next(&mut self) -> Scripted<T> {
        if self.entries.len() > 1 {
            if let Some(entry) = self.entries.pop_front() {
                return entry;
            }
        }
        match self.entries.front() {
            Some(entry) => entry.clone(),
            None => Scripted {
                delay: Duration::ZERO,
                result: Err(StageError::rejected(
                    self.stage,
                    "no scripted response".to_string(),
                )),
            },
        }
    }
}

/// Scripted, call-recording backend.
pub struct ScriptedBackend {
    uploads: Mutex<Script<UploadReceipt>>,
    summaries: Mutex<Script<SummarizeResponse>>,
    summaries_by_document: Mutex<HashMap<DocumentId, Script<SummarizeResponse>>>,
    listings: Mutex<Script<Vec<SummaryRecord>>>,
    generations: Mutex<Script<GenerateResponse>>,
    statuses: Mutex<HashMap<SummaryId, Script<JobStatusReport>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            uploads: Mutex::new(Script::new(Stage::Upload)),
            summaries: Mutex::new(Script::new(Stage::Summarize)),
            summaries_by_document: Mutex::new(HashMap::new()),
            listings: Mutex::new(Script::new(Stage::ListSummaries)),
            generations: Mutex::new(Script::new(Stage::GenerateArtifact)),
            statuses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    // ============ Scripting ============

    pub fn push_upload(&self, delay: Duration, result: Result<UploadReceipt, StageError>) {
        self.uploads.lock().push(delay, result);
    }

    /// Queue a summarize response consumed by calls for any document.
    pub fn push_summarize(&self, delay: Duration, result: Result<SummarizeResponse, StageError>) {
        self.summaries.lock().push(delay, result);
    }

    /// Queue a summarize response for one document id; takes precedence
    /// over [`push_summarize`](Self::push_summarize).
    pub fn push_summarize_for(
        &self,
        document_id: &str,
        delay: Duration,
        result: Result<SummarizeResponse, StageError>,
    ) {
        self.summaries_by_document
            .lock()
            .entry(DocumentId(document_id.to_string()))
            .or_insert_with(|| Script::new(Stage::Summarize))
            .push(delay, result);
    }

    pub fn push_listing(&self, delay: Duration, result: Result<Vec<SummaryRecord>, StageError>) {
        self.listings.lock().push(delay, result);
    }

    pub fn push_generate(&self, delay: Duration, result: Result<GenerateResponse, StageError>) {
        self.generations.lock().push(delay, result);
    }

    pub fn push_status(
        &self,
        target_id: SummaryId,
        delay: Duration,
        result: Result<JobStatusReport, StageError>,
    ) {
        self.statuses
            .lock()
            .entry(target_id)
            .or_insert_with(|| Script::new(Stage::PollJob))
            .push(delay, result);
    }

    /// Queue a sequence of plain statuses for `target_id`; a `done` status
    /// carries `result_url`.
    pub fn push_statuses(&self, target_id: SummaryId, statuses: &[JobStatus], result_url: &str) {
        for status in statuses {
            let report = JobStatusReport {
                status: *status,
                result_url: (*status == JobStatus::Done).then(|| result_url.to_string()),
                error_detail: None,
            };
            self.push_status(target_id, Duration::ZERO, Ok(report));
        }
    }

    // ============ Inspection ============

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, op: Op) -> Vec<Call> {
        self.calls.lock().iter().filter(|c| c.op == op).cloned().collect()
    }

    pub fn count(&self, op: Op) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    fn record(&self, op: Op, target: Option<SummaryId>, document: Option<String>) {
        self.calls.lock().push(Call {
            op,
            at: Instant::now(),
            target,
            document,
        });
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

async fn replay<T>(entry: Scripted<T>) -> Result<T, StageError> {
    if !entry.delay.is_zero() {
        tokio::time::sleep(entry.delay).await;
    }
    entry.result
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn upload(
        &self,
        _session: &Session,
        document: &SourceDocument,
    ) -> Result<UploadReceipt, StageError> {
        self.record(Op::Upload, None, Some(document.name.clone()));
        let entry = self.uploads.lock().next();
        replay(entry).await
    }

    async fn summarize(
        &self,
        _session: &Session,
        document_id: &DocumentId,
        _style: SummaryStyle,
    ) -> Result<SummarizeResponse, StageError> {
        self.record(Op::Summarize, None, Some(document_id.0.clone()));
        let keyed = self
            .summaries_by_document
            .lock()
            .get_mut(document_id)
            .map(|script| script.next());
        let entry = match keyed {
            Some(entry) => entry,
            None => self.summaries.lock().next(),
        };
        replay(entry).await
    }

    async fn list_summaries(&self, _session: &Session) -> Result<Vec<SummaryRecord>, StageError> {
        self.record(Op::ListSummaries, None, None);
        let entry = self.listings.lock().next();
        replay(entry).await
    }

    async fn generate_artifact(
        &self,
        _session: &Session,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StageError> {
        self.record(Op::GenerateArtifact, Some(request.summary_id), None);
        let entry = self.generations.lock().next();
        replay(entry).await
    }

    async fn job_status(&self, target_id: SummaryId) -> Result<JobStatusReport, StageError> {
        self.record(Op::JobStatus, Some(target_id), None);
        let entry = self
            .statuses
            .lock()
            .entry(target_id)
            .or_insert_with(|| Script::new(Stage::PollJob))
            .next();
        replay(entry).await
    }
}
