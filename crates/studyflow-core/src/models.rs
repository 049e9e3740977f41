//! Core data models shared by every stage of the generation pipeline.
//!
//! These types describe what flows between the client and the backend:
//! the user's [`SourceDocument`], the [`SummaryRecord`]s derived from it,
//! artifact requests ([`ArtifactKind`], [`ArtifactOptions`]) and the
//! server-side [`GenerationJob`] tracked while a video renders.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Stage, StageError};

/// Backend identifier of a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryId(pub i64);

impl fmt::Display for SummaryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SummaryId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Backend identifier of an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============ Source documents ============

/// Content kind of a [`SourceDocument`], derived from its file extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Pdf,
    Text,
    Docx,
    Other(String),
}

impl ContentKind {
    /// Classify a file by the extension of `name` (case-insensitive).
    pub fn from_file_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "txt" => Self::Text,
            "docx" => Self::Docx,
            _ => Self::Other(ext),
        }
    }

    /// Short name used in configuration (`allowed_kinds`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Docx => "docx",
            Self::Other(ext) => ext,
        }
    }

    /// MIME type sent with the multipart upload.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Text => "text/plain",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Other(_) => "application/octet-stream",
        }
    }
}

/// Limits applied to a document before it is uploaded.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_bytes: u64,
    pub allowed_kinds: Vec<String>,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            allowed_kinds: vec!["pdf".to_string(), "txt".to_string(), "docx".to_string()],
        }
    }
}

/// A user-supplied file, consumed by exactly one pipeline invocation.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub content_kind: ContentKind,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_kind = ContentKind::from_file_name(&name);
        Self {
            name,
            content_kind,
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Check the document against `limits`.
    ///
    /// Both the kind and the size must be acceptable. Failures are
    /// non-retryable validation errors attributed to the upload stage.
    pub fn validate(&self, limits: &UploadLimits) -> Result<(), StageError> {
        if self.bytes.is_empty() {
            return Err(StageError::rejected(
                Stage::Upload,
                format!("'{}' is empty", self.name),
            ));
        }
        let kind = self.content_kind.as_str();
        if !limits
            .allowed_kinds
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(kind))
        {
            return Err(StageError::rejected(
                Stage::Upload,
                format!(
                    "'{}' is not a supported file type (supported: {})",
                    self.name,
                    limits.allowed_kinds.join(", ")
                ),
            ));
        }
        if self.size_bytes() > limits.max_bytes {
            return Err(StageError::rejected(
                Stage::Upload,
                format!(
                    "'{}' is {} bytes, larger than the {} byte limit",
                    self.name,
                    self.size_bytes(),
                    limits.max_bytes
                ),
            ));
        }
        Ok(())
    }
}

// ============ Summaries ============

/// Tone of the generated summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStyle {
    #[default]
    Genz,
    Formal,
}

impl FromStr for SummaryStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "genz" => Ok(Self::Genz),
            "formal" => Ok(Self::Formal),
            other => Err(format!("unknown summary style '{}' (expected genz or formal)", other)),
        }
    }
}

/// A summary produced by the summarize stage or returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub id: SummaryId,
    pub generated_at: DateTime<Utc>,
    pub text: String,
}

// ============ Artifacts ============

/// Kind of learning artifact derived from a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Quiz,
    Flashcards,
    Video,
}

impl ArtifactKind {
    /// Whether the backend renders this kind as a background job that must be polled.
    pub fn is_async(self) -> bool {
        matches!(self, Self::Video)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Quiz => "quiz",
            Self::Flashcards => "flashcards",
            Self::Video => "video",
        })
    }
}

impl FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quiz" => Ok(Self::Quiz),
            "flashcards" | "flashcard" => Ok(Self::Flashcards),
            "video" => Ok(Self::Video),
            other => Err(format!(
                "unknown artifact kind '{}' (expected quiz, flashcards, or video)",
                other
            )),
        }
    }
}

/// Background footage used when rendering a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoTheme {
    #[default]
    Subway,
    Slime,
    Minecraft,
}

impl FromStr for VideoTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "subway" => Ok(Self::Subway),
            "slime" => Ok(Self::Slime),
            "minecraft" => Ok(Self::Minecraft),
            other => Err(format!(
                "unknown video theme '{}' (expected subway, slime, or minecraft)",
                other
            )),
        }
    }
}

/// Per-request generation options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<VideoTheme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Default number of quiz questions or flashcards.
pub const DEFAULT_ITEM_COUNT: u32 = 5;

impl ArtifactOptions {
    /// Fill in kind-specific defaults and drop options that do not apply.
    pub fn normalized_for(mut self, kind: ArtifactKind) -> Self {
        match kind {
            ArtifactKind::Video => {
                self.theme = Some(self.theme.unwrap_or_default());
                self.count = None;
            }
            ArtifactKind::Quiz | ArtifactKind::Flashcards => {
                self.theme = None;
                self.count = Some(self.count.unwrap_or(DEFAULT_ITEM_COUNT));
            }
        }
        self
    }
}

/// A multiple-choice quiz question; `correct` indexes into `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Final result of a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactOutcome {
    Quiz { questions: Vec<QuizQuestion> },
    Flashcards { cards: Vec<Flashcard> },
    Video { url: String },
}

impl ArtifactOutcome {
    /// Decode a payload returned synchronously by the generate call.
    pub fn from_sync_payload(
        kind: ArtifactKind,
        payload: serde_json::Value,
    ) -> Result<Self, StageError> {
        let malformed =
            |cause: String| StageError::malformed(Stage::GenerateArtifact, cause);
        match kind {
            ArtifactKind::Quiz => {
                let questions: Vec<QuizQuestion> = serde_json::from_value(payload)
                    .map_err(|e| malformed(format!("invalid quiz payload: {}", e)))?;
                if let Some(bad) = questions.iter().find(|q| q.correct >= q.options.len()) {
                    return Err(malformed(format!(
                        "quiz question '{}' marks option {} correct but has {} options",
                        bad.question,
                        bad.correct,
                        bad.options.len()
                    )));
                }
                Ok(Self::Quiz { questions })
            }
            ArtifactKind::Flashcards => {
                let cards: Vec<Flashcard> = serde_json::from_value(payload)
                    .map_err(|e| malformed(format!("invalid flashcard payload: {}", e)))?;
                Ok(Self::Flashcards { cards })
            }
            ArtifactKind::Video => Err(malformed(
                "video generation never completes synchronously".to_string(),
            )),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Quiz { .. } => ArtifactKind::Quiz,
            Self::Flashcards { .. } => ArtifactKind::Flashcards,
            Self::Video { .. } => ArtifactKind::Video,
        }
    }
}

// ============ Jobs ============

/// Status of a server-side generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Done => "done",
            Self::Error => "error",
        })
    }
}

/// One response of the job-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Client-side view of an accepted asynchronous generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationJob {
    pub target_id: SummaryId,
    pub kind: ArtifactKind,
    pub status: JobStatus,
    pub result_url: Option<String>,
    pub error_detail: Option<String>,
    /// Number of status reports applied so far.
    pub polls: u32,
}

impl GenerationJob {
    pub fn new(target_id: SummaryId, kind: ArtifactKind) -> Self {
        Self {
            target_id,
            kind,
            status: JobStatus::Queued,
            result_url: None,
            error_detail: None,
            polls: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status report. Reports arriving after a terminal status are
    /// ignored; returns whether the report was applied.
    pub fn apply(&mut self, report: &JobStatusReport) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = report.status;
        self.polls += 1;
        if report.result_url.is_some() {
            self.result_url = report.result_url.clone();
        }
        if report.error_detail.is_some() {
            self.error_detail = report.error_detail.clone();
        }
        true
    }
}
