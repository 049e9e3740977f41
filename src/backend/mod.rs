//! Backend collaborator abstraction.
//!
//! The document-processing backend is reached only through the five
//! operations of [`Backend`]. Two implementations ship with the crate:
//!
//! - **[`HttpBackend`]** — JSON over HTTP with `reqwest`.
//! - **[`ScriptedBackend`]** — replays queued responses and records every
//!   call; used by tests and for exercising the pipeline offline.
//!
//! Every operation fails with a [`StageError`] already classified as
//! rejected, transient, or malformed, so callers never inspect transport
//! details.

pub mod http;
pub mod scripted;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use studyflow_core::error::StageError;
use studyflow_core::models::{
    ArtifactKind, ArtifactOptions, DocumentId, JobStatusReport, SourceDocument, SummaryId,
    SummaryRecord, SummaryStyle,
};

use crate::session::Session;

pub use http::HttpBackend;
pub use scripted::ScriptedBackend;

/// Response of the upload call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub document_id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points_earned: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_points: Option<u32>,
}

impl UploadReceipt {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: DocumentId(document_id.into()),
            message: None,
            points_earned: None,
            total_points: None,
        }
    }
}

/// Response of the summarize call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    pub summary_id: SummaryId,
    pub summary_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl SummarizeResponse {
    pub fn new(summary_id: i64, summary_text: impl Into<String>) -> Self {
        Self {
            summary_id: SummaryId(summary_id),
            summary_text: summary_text.into(),
            generated_at: None,
        }
    }

    /// Convert into a record, stamping it now if the backend sent no timestamp.
    pub fn into_record(self) -> SummaryRecord {
        SummaryRecord {
            id: self.summary_id,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
            text: self.summary_text,
        }
    }
}

/// Body of an artifact generation request, minus the user's email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub summary_id: SummaryId,
    pub kind: ArtifactKind,
    pub options: ArtifactOptions,
}

/// Response of the generate call.
///
/// `payload` is present when the artifact was produced within the request
/// (quiz, flashcards); otherwise a job was queued and must be polled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub accepted: bool,
    #[serde(
        default,
        rename = "jobAcceptedSynchronously",
        skip_serializing_if = "Option::is_none"
    )]
    pub payload: Option<serde_json::Value>,
}

impl GenerateResponse {
    pub fn queued() -> Self {
        Self {
            accepted: true,
            payload: None,
        }
    }

    pub fn completed(payload: serde_json::Value) -> Self {
        Self {
            accepted: true,
            payload: Some(payload),
        }
    }
}

/// The backend operations the orchestrator depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Upload a document; yields the backend's document id.
    async fn upload(
        &self,
        session: &Session,
        document: &SourceDocument,
    ) -> Result<UploadReceipt, StageError>;

    /// Summarize an uploaded document.
    async fn summarize(
        &self,
        session: &Session,
        document_id: &DocumentId,
        style: SummaryStyle,
    ) -> Result<SummarizeResponse, StageError>;

    /// All summaries of the user, in no particular order.
    async fn list_summaries(&self, session: &Session) -> Result<Vec<SummaryRecord>, StageError>;

    /// Request an artifact for a summary.
    async fn generate_artifact(
        &self,
        session: &Session,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StageError>;

    /// Current status of the generation job for `target_id`.
    async fn job_status(&self, target_id: SummaryId) -> Result<JobStatusReport, StageError>;
}
