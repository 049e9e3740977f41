//! In-process mock of the document-processing backend.
//!
//! Serves the five endpoints on an ephemeral port with scripted behavior
//! and counts status calls.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

type Reply = Result<Json<Value>, (StatusCode, Json<Value>)>;

/// Scripted backend state shared with the test.
pub struct MockBackend {
    /// Email that the upload endpoint does not know.
    pub unknown_email: String,
    pub fail_summarize: AtomicBool,
    pub next_summary_id: AtomicI64,
    pub summaries: Mutex<Vec<Value>>,
    /// Job status bodies; the last one repeats.
    pub statuses: Mutex<VecDeque<Value>>,
    pub status_calls: AtomicUsize,
    pub summarize_calls: AtomicUsize,
    /// (email, file name, byte count) per upload.
    pub uploads: Mutex<Vec<(String, String, usize)>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            unknown_email: "ghost@example.com".to_string(),
            fail_summarize: AtomicBool::new(false),
            next_summary_id: AtomicI64::new(42),
            summaries: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            summarize_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn add_summary(&self, id: i64, generated_at: &str, text: &str) {
        self.summaries
            .lock()
            .unwrap()
            .push(json!({ "id": id, "generatedAt": generated_at, "text": text }));
    }

    pub fn script_statuses(&self, statuses: &[&str], result_url: &str) {
        let mut queue = self.statuses.lock().unwrap();
        for status in statuses {
            let body = if *status == "done" {
                json!({ "status": status, "resultUrl": result_url })
            } else {
                json!({ "status": status })
            };
            queue.push_back(body);
        }
    }

    pub fn script_status_body(&self, body: Value) {
        self.statuses.lock().unwrap().push_back(body);
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }
}

fn rejected(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

async fn upload(State(mock): State<Arc<MockBackend>>, mut multipart: Multipart) -> Reply {
    let mut email = None;
    let mut file = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("email") => email = field.text().await.ok(),
            Some("file") => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field.bytes().await.map(|b| b.len()).unwrap_or(0);
                file = Some((name, bytes));
            }
            _ => {}
        }
    }
    let (Some(email), Some((name, size))) = (email, file) else {
        return Err(rejected(StatusCode::UNPROCESSABLE_ENTITY, "email and file are required"));
    };
    if email == mock.unknown_email {
        return Err(rejected(StatusCode::NOT_FOUND, "User not found"));
    }
    mock.uploads.lock().unwrap().push((email, name.clone(), size));
    Ok(Json(json!({
        "documentId": format!("uploads/{}", name),
        "message": "File uploaded successfully",
        "pointsEarned": 10,
        "totalPoints": 10 * mock.uploads.lock().unwrap().len()
    })))
}

async fn summarize(State(mock): State<Arc<MockBackend>>, Json(body): Json<Value>) -> Reply {
    mock.summarize_calls.fetch_add(1, Ordering::SeqCst);
    if mock.fail_summarize.load(Ordering::SeqCst) {
        return Err(rejected(StatusCode::SERVICE_UNAVAILABLE, "model overloaded"));
    }
    let Some(document_id) = body.get("documentId").and_then(Value::as_str) else {
        return Err(rejected(StatusCode::UNPROCESSABLE_ENTITY, "documentId is required"));
    };
    let id = mock.next_summary_id.fetch_add(1, Ordering::SeqCst);
    let text = format!("Summary of {} ({})", document_id, body["style"].as_str().unwrap_or("?"));
    mock.add_summary(id, "2026-05-01T12:00:00Z", &text);
    Ok(Json(json!({
        "summaryId": id,
        "summaryText": text,
        "generatedAt": "2026-05-01T12:00:00Z"
    })))
}

async fn list_summaries(
    State(mock): State<Arc<MockBackend>>,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    if !query.contains_key("email") {
        return Err(rejected(StatusCode::UNPROCESSABLE_ENTITY, "email is required"));
    }
    Ok(Json(Value::Array(mock.summaries.lock().unwrap().clone())))
}

async fn generate(Json(body): Json<Value>) -> Reply {
    let count = body["options"]["count"].as_u64().unwrap_or(5) as usize;
    match body["kind"].as_str() {
        Some("video") => Ok(Json(json!({ "accepted": true }))),
        Some("quiz") => {
            let questions: Vec<Value> = (0..count)
                .map(|i| {
                    json!({
                        "question": format!("Question {}?", i + 1),
                        "options": ["yes", "no", "maybe", "never"],
                        "correct": i % 4
                    })
                })
                .collect();
            Ok(Json(json!({ "accepted": true, "jobAcceptedSynchronously": questions })))
        }
        Some("flashcards") => {
            let cards: Vec<Value> = (0..count)
                .map(|i| json!({ "question": format!("Term {}", i + 1), "answer": "Definition" }))
                .collect();
            Ok(Json(json!({ "accepted": true, "jobAcceptedSynchronously": cards })))
        }
        _ => Err(rejected(StatusCode::BAD_REQUEST, "unknown kind")),
    }
}

async fn job_status(State(mock): State<Arc<MockBackend>>, Path(_summary_id): Path<i64>) -> Reply {
    mock.status_calls.fetch_add(1, Ordering::SeqCst);
    let mut queue = mock.statuses.lock().unwrap();
    let body = if queue.len() > 1 {
        queue.pop_front()
    } else {
        queue.front().cloned()
    };
    body.map(Json)
        .ok_or_else(|| rejected(StatusCode::NOT_FOUND, "Video job not found"))
}

/// Serve `mock` on 127.0.0.1 and return its base url.
pub async fn serve(mock: Arc<MockBackend>) -> String {
    let app = Router::new()
        .route("/api/upload", post(upload))
        .route("/api/summarize", post(summarize))
        .route("/api/summaries", get(list_summaries))
        .route("/api/generate", post(generate))
        .route("/api/jobs/{summary_id}", get(job_status))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}
