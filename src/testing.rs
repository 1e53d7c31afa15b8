//! In-process fake of the dropp backend for tests.
//!
//! Serves `/api/list`, `/api/upload/`, `/api/files/:id` and signed blob URLs
//! on `127.0.0.1:0` with axum. Behaviour is steered through [`BackendState`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;

pub const TEST_TOKEN: &str = "test-token";

#[derive(Debug, Clone)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub field: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

#[derive(Default)]
pub struct BackendState {
    pub origin: String,
    pub files: Vec<StoredFile>,
    pub cap: u64,
    pub used: u64,
    /// Forced status for `GET /list`.
    pub list_status: Option<u16>,
    /// Serve a truncated JSON body from `GET /list`.
    pub malformed_list: bool,
    /// Forced status for `POST /upload/`.
    pub upload_status: Option<u16>,
    pub list_calls: usize,
    pub uploads: Vec<ReceivedUpload>,
    pub deletes: Vec<String>,
    pub blob_requests_with_auth: usize,
    next_id: usize,
}

type Shared = Arc<Mutex<BackendState>>;

pub struct FakeBackend {
    pub addr: SocketAddr,
    state: Shared,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state: Shared = Arc::new(Mutex::new(BackendState {
            origin: format!("http://{}", addr),
            cap: 1_000_000,
            ..Default::default()
        }));

        let router = Router::new()
            .route("/api/list", get(list))
            .route("/api/upload/", post(upload))
            .route("/api/files/:id", delete(remove))
            .route("/blob/:id", get(blob))
            .with_state(state.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap()
    }

    pub fn add_file(&self, id: &str, name: &str, content: &[u8]) {
        let mut state = self.state();
        state.used += content.len() as u64;
        state.files.push(StoredFile {
            id: id.to_string(),
            name: name.to_string(),
            content: content.to_vec(),
        });
    }

    pub fn file_ids(&self) -> Vec<String> {
        self.state().files.iter().map(|f| f.id.clone()).collect()
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", TEST_TOKEN))
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap()
}

async fn list(State(state): State<Shared>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, r#"{"error":"Unauthorized"}"#).into_response();
    }
    let mut state = state.lock().unwrap();
    state.list_calls += 1;
    if let Some(code) = state.list_status {
        return (status(code), "forced failure").into_response();
    }
    if state.malformed_list {
        return (StatusCode::OK, r#"{"files": [{"_id": "#).into_response();
    }
    let files: Vec<serde_json::Value> = state
        .files
        .iter()
        .map(|f| {
            serde_json::json!({
                "_id": f.id,
                "name": f.name,
                "size": f.content.len(),
                "download_url": format!("{}/blob/{}", state.origin, f.id),
            })
        })
        .collect();
    let body = serde_json::json!({
        "files": files,
        "storage": { "cap": state.cap, "used": state.used },
    });
    (StatusCode::OK, body.to_string()).into_response()
}

async fn upload(
    State(state): State<Shared>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let forced = state.lock().unwrap().upload_status;
    if let Some(code) = forced {
        return status(code).into_response();
    }

    let mut received = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|s| s.to_string());
        let content = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
        received.push(ReceivedUpload {
            field: name,
            file_name,
            content_type,
            content,
        });
    }

    let mut state = state.lock().unwrap();
    for part in &received {
        if part.field == "file" {
            state.next_id += 1;
            let id = format!("up-{}", state.next_id);
            state.used += part.content.len() as u64;
            state.files.push(StoredFile {
                id,
                name: part.file_name.clone().unwrap_or_default(),
                content: part.content.clone(),
            });
        }
    }
    state.uploads.extend(received);
    (StatusCode::OK, r#"{"ok":true}"#).into_response()
}

async fn remove(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut state = state.lock().unwrap();
    state.deletes.push(id.clone());
    match state.files.iter().position(|f| f.id == id) {
        Some(idx) => {
            let removed = state.files.remove(idx);
            state.used = state.used.saturating_sub(removed.content.len() as u64);
            (StatusCode::OK, r#"{"ok":true}"#).into_response()
        }
        None => (StatusCode::NOT_FOUND, r#"{"error":"Not found"}"#).into_response(),
    }
}

async fn blob(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    let mut state = state.lock().unwrap();
    if headers.contains_key("authorization") {
        state.blob_requests_with_auth += 1;
    }
    match state.files.iter().find(|f| f.id == id) {
        Some(f) => (StatusCode::OK, f.content.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
