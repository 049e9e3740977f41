//! JSON-over-HTTP [`Backend`] implementation.
//!
//! # Endpoints
//!
//! | Operation | Method | Path |
//! |-----------|--------|------|
//! | upload | `POST` | `/api/upload` (multipart: `email`, `file`) |
//! | summarize | `POST` | `/api/summarize` |
//! | list summaries | `GET` | `/api/summaries?email=` |
//! | generate artifact | `POST` | `/api/generate` |
//! | job status | `GET` | `/api/jobs/{summaryId}` |
//!
//! # Failure classification
//!
//! - HTTP 4xx → rejected, not retried. The message is the `detail` field of
//!   the error body when there is one.
//! - HTTP 5xx, connect errors, timeouts → transient, retried by the stage runner.
//! - 2xx with a body that does not decode → malformed, not retried.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use studyflow_core::error::{Stage, StageError};
use studyflow_core::models::{
    DocumentId, JobStatusReport, SourceDocument, SummaryId, SummaryRecord, SummaryStyle,
};

use super::{Backend, GenerateRequest, GenerateResponse, SummarizeResponse, UploadReceipt};
use crate::config::BackendConfig;
use crate::session::Session;

/// Backend reached over HTTP.
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SummarizeBody<'a> {
    document_id: &'a DocumentId,
    email: &'a str,
    style: SummaryStyle,
}

#[derive(Serialize)]
struct GenerateBody<'a> {
    email: &'a str,
    #[serde(flatten)]
    request: &'a GenerateRequest,
}

impl HttpBackend {
    /// Build a client with the configured request timeout.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send `request` and decode a JSON body, classifying every failure.
    async fn send_json<T: DeserializeOwned>(
        &self,
        stage: Stage,
        request: RequestBuilder,
    ) -> Result<T, StageError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(stage, &e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(stage, &e))?;

        if !status.is_success() {
            return Err(classify_status(
                stage,
                status,
                &String::from_utf8_lossy(&body),
            ));
        }

        serde_json::from_slice(&body).map_err(|e| {
            StageError::malformed(stage, format!("invalid response body: {}", e))
                .with_status(status.as_u16())
        })
    }
}

/// Classify an error raised before a complete response was read.
fn classify_transport_error(stage: Stage, err: &reqwest::Error) -> StageError {
    let cause = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("could not connect: {}", err)
    } else {
        format!("network error: {}", err)
    };
    StageError::transient(stage, cause)
}

/// Classify a non-success HTTP status.
pub(crate) fn classify_status(stage: Stage, status: StatusCode, body: &str) -> StageError {
    let detail = detail_from_body(body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
    let cause = format!("HTTP {}: {}", status.as_u16(), detail);
    let err = if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        StageError::transient(stage, cause)
    } else if status.is_client_error() {
        StageError::rejected(stage, detail)
    } else {
        StageError::malformed(stage, format!("unexpected {}", cause))
    };
    err.with_status(status.as_u16())
}

/// Extract a FastAPI-style `{"detail": ...}` message, or the raw text.
pub(crate) fn detail_from_body(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(json) => match json.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        Err(_) => Some(trimmed.to_string()),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(
        &self,
        session: &Session,
        document: &SourceDocument,
    ) -> Result<UploadReceipt, StageError> {
        let part = Part::bytes(document.bytes.clone())
            .file_name(document.name.clone())
            .mime_str(document.content_kind.mime())
            .map_err(|e| StageError::rejected(Stage::Upload, format!("invalid file: {}", e)))?;
        let form = Form::new()
            .text("email", session.email.clone())
            .part("file", part);

        self.send_json(
            Stage::Upload,
            self.client.post(self.url("/api/upload")).multipart(form),
        )
        .await
    }

    async fn summarize(
        &self,
        session: &Session,
        document_id: &DocumentId,
        style: SummaryStyle,
    ) -> Result<SummarizeResponse, StageError> {
        let body = SummarizeBody {
            document_id,
            email: &session.email,
            style,
        };
        self.send_json(
            Stage::Summarize,
            self.client.post(self.url("/api/summarize")).json(&body),
        )
        .await
    }

    async fn list_summaries(&self, session: &Session) -> Result<Vec<SummaryRecord>, StageError> {
        self.send_json(
            Stage::ListSummaries,
            self.client
                .get(self.url("/api/summaries"))
                .query(&[("email", session.email.as_str())]),
        )
        .await
    }

    async fn generate_artifact(
        &self,
        session: &Session,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, StageError> {
        let body = GenerateBody {
            email: &session.email,
            request,
        };
        self.send_json(
            Stage::GenerateArtifact,
            self.client.post(self.url("/api/generate")).json(&body),
        )
        .await
    }

    async fn job_status(&self, target_id: SummaryId) -> Result<JobStatusReport, StageError> {
        self.send_json(
            Stage::PollJob,
            self.client
                .get(self.url(&format!("/api/jobs/{}", target_id))),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyflow_core::error::StageErrorKind;

    #[test]
    fn client_errors_are_rejections_with_detail() {
        let err = classify_status(
            Stage::Upload,
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Only PDF files are allowed"}"#,
        );
        assert_eq!(err.kind, StageErrorKind::Rejected);
        assert_eq!(err.cause, "Only PDF files are allowed");
        assert_eq!(err.status, Some(400));
        assert!(!err.is_retryable());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = classify_status(Stage::Summarize, StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.kind, StageErrorKind::Transient);
        assert_eq!(err.cause, "HTTP 502: Bad Gateway");

        let timeout = classify_status(Stage::PollJob, StatusCode::REQUEST_TIMEOUT, "");
        assert!(timeout.is_retryable());
    }

    #[test]
    fn detail_extraction() {
        assert_eq!(detail_from_body(""), None);
        assert_eq!(detail_from_body("plain text").as_deref(), Some("plain text"));
        assert_eq!(
            detail_from_body(r#"{"detail":[{"msg":"field required"}]}"#).as_deref(),
            Some(r#"[{"msg":"field required"}]"#)
        );
        assert_eq!(
            detail_from_body(r#"{"error":"boom"}"#).as_deref(),
            Some(r#"{"error":"boom"}"#)
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let backend = HttpBackend::new(&BackendConfig {
            base_url: "http://localhost:8000/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8000");
        assert_eq!(backend.url("/api/upload"), "http://localhost:8000/api/upload");
    }
}
