//! In-process stand-in for the RAG backend, served by axum on a random port.

#![allow(dead_code)]

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Uploads whose file name equals this are answered with a 500.
pub const BROKEN_UPLOAD: &str = "broken.txt";

#[derive(Default)]
pub struct Recorded {
    pub uploads: Vec<(String, Vec<u8>)>,
    pub index_builds: usize,
    pub queries: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    pub recorded: Arc<Mutex<Recorded>>,
    /// When set, `/query/` answers with a 500.
    pub fail_queries: Arc<AtomicBool>,
}

impl FakeBackend {
    pub fn uploaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .recorded
            .lock()
            .unwrap()
            .uploads
            .iter()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn index_builds(&self) -> usize {
        self.recorded.lock().unwrap().index_builds
    }

    pub fn break_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    pub fn queries(&self) -> Vec<String> {
        self.recorded.lock().unwrap().queries.clone()
    }
}

async fn upload(State(fake): State<FakeBackend>, mut multipart: Multipart) -> StatusCode {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let Ok(bytes) = field.bytes().await else {
            return StatusCode::BAD_REQUEST;
        };
        if name == BROKEN_UPLOAD {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        fake.recorded.lock().unwrap().uploads.push((name, bytes.to_vec()));
        return StatusCode::OK;
    }
    StatusCode::BAD_REQUEST
}

async fn index(State(fake): State<FakeBackend>) -> Json<serde_json::Value> {
    fake.recorded.lock().unwrap().index_builds += 1;
    Json(serde_json::json!({ "status": "indexed" }))
}

async fn query(
    State(fake): State<FakeBackend>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if fake.fail_queries.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let text = body["text"].as_str().unwrap_or_default().to_string();
    let sources: Vec<String> = {
        let mut recorded = fake.recorded.lock().unwrap();
        recorded.queries.push(text.clone());
        recorded.uploads.iter().map(|(name, _)| name.clone()).collect()
    };
    Ok(Json(serde_json::json!({
        "answer": format!("answer to: {}", text),
        "sources": sources,
    })))
}

/// Start the fake backend. Returns its base URL and a handle to what it saw.
pub async fn spawn_fake_backend() -> (String, FakeBackend) {
    let fake = FakeBackend::default();
    let app = Router::new()
        .route("/upload/", post(upload))
        .route("/index/", post(index))
        .route("/query/", post(query))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), fake)
}
