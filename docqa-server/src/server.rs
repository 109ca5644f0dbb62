use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use docqa_rag::{AnswerPipeline, Document, Indexer, RagError, is_markdown};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::protocol::{QueryRequest, QueryResponse, UploadResponse};
use crate::session::{SessionStore, UploadedIndex};

/// Default cap on uploaded file size.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Extra room for multipart framing and the other form fields.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub const NO_DOCUMENT_MESSAGE: &str = "No document uploaded. Please upload a document first.";

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub indexer: Arc<Indexer>,
    pub pipeline: Arc<AnswerPipeline>,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(indexer: Arc<Indexer>, pipeline: Arc<AnswerPipeline>) -> Self {
        Self {
            sessions: SessionStore::new(),
            indexer,
            pipeline,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }

    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    // Oversized files must reach the handler so it can answer with its own 400.
    let body_limit = state.max_upload_bytes.saturating_mul(4) + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/upload", post(upload))
        .route("/query", post(query))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state.with_max_upload_bytes(config.max_upload_bytes));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index() -> impl IntoResponse {
    Html(include_str!("../ui/index.html"))
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

/// "2MB" for whole mebibytes, otherwise kilobytes.
fn size_label(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes % MIB == 0 { format!("{}MB", bytes / MIB) } else { format!("{}KB", bytes.div_ceil(1024)) }
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

fn oversized_upload(max_bytes: usize) -> ApiError {
    RagError::InvalidUpload(format!("File size must be under {}", size_label(max_bytes))).into()
}

/// Map a multipart read failure to a 400. Hitting the request body limit
/// reports the upload size cap rather than a framing error.
fn multipart_rejection(status: StatusCode, detail: impl std::fmt::Display, max_bytes: usize) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        oversized_upload(max_bytes)
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {detail}"))
    }
}

fn multipart_error(max_bytes: usize) -> impl Fn(MultipartError) -> ApiError {
    move |err| multipart_rejection(err.status(), err.body_text(), max_bytes)
}

/// Read the `file` field, rejecting the wrong type before reading the body
/// and keeping at most `max_bytes` of it.
async fn read_markdown_field(field: &mut Field<'_>, max_bytes: usize) -> Result<UploadedFile, ApiError> {
    let filename = field.file_name().unwrap_or_default().to_string();
    if !is_markdown(&filename) {
        return Err(RagError::InvalidUpload("Only Markdown (.md) files are supported".into()).into());
    }

    let mut bytes = Vec::new();
    let mut oversized = false;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error(max_bytes))? {
        // Past the cap, drain the field without buffering it.
        if oversized || bytes.len() + chunk.len() > max_bytes {
            oversized = true;
            continue;
        }
        bytes.extend_from_slice(&chunk);
    }

    if oversized {
        return Err(oversized_upload(max_bytes));
    }
    Ok(UploadedFile { filename, bytes })
}

/// Stage the upload in a temporary `.md` file and load it back as a document
/// whose source is the client's file name. The temporary file is removed on return.
fn stage_document(file: UploadedFile) -> docqa_rag::Result<Document> {
    use std::io::Write;

    let mut staged = tempfile::Builder::new().prefix("docqa-upload-").suffix(".md").tempfile()?;
    staged.write_all(&file.bytes)?;
    staged.flush()?;

    let loaded = Document::from_path(staged.path())?;
    Ok(Document::new(file.filename, loaded.text))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let max_bytes = state.max_upload_bytes;
    let mut session_id = None;
    let mut file = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error(max_bytes))? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => file = Some(read_markdown_field(&mut field, max_bytes).await?),
            Some("session_id") => session_id = Some(field.text().await.map_err(multipart_error(max_bytes))?),
            _ => {}
        }
    }

    let file = file.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    let session_id =
        SessionStore::normalize(session_id.as_deref()).unwrap_or_else(SessionStore::new_session_id);
    let filename = file.filename.clone();
    let size = file.bytes.len();

    let document = tokio::task::spawn_blocking(move || stage_document(file))
        .await
        .map_err(|e| ApiError::internal(format!("Error processing file: {e}")))?
        .map_err(|e| {
            error!(filename = %filename, error = %e, "failed to read upload");
            ApiError::internal(format!("Error processing file: {e}"))
        })?;

    let scratch = state.indexer.build_scratch_index(&document).await.map_err(|e| {
        error!(filename = %filename, error = %e, "failed to index upload");
        ApiError::internal(format!("Error processing file: {e}"))
    })?;
    let chunks = scratch.index().len();

    let upload = UploadedIndex { filename: filename.clone(), scratch, uploaded_at: Utc::now() };
    if let Some(previous) = state.sessions.replace(&session_id, upload).await {
        info!(
            session_id = %session_id,
            previous = %previous.filename,
            previous_uploaded_at = %previous.uploaded_at,
            "replaced uploaded document"
        );
    }
    info!(session_id = %session_id, filename = %filename, bytes = size, chunks, "processed upload");

    Ok(Json(UploadResponse {
        success: true,
        message: "File processed successfully".to_string(),
        filename,
        session_id,
    }))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    AnswerPipeline::validate_query(&request.query)?;

    let not_ready = || ApiError::from(RagError::IndexNotReady(NO_DOCUMENT_MESSAGE.to_string()));
    let session_id = SessionStore::normalize(request.session_id.as_deref()).ok_or_else(not_ready)?;
    let uploaded = state.sessions.get(&session_id).await.ok_or_else(not_ready)?;

    match state.pipeline.answer(uploaded.scratch.index(), &request.query).await {
        Ok(answer) => Ok(Json(QueryResponse::answered(answer.text, answer.sources))),
        Err(e) if e.is_validation() => Err(e.into()),
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "query failed");
            Ok(Json(QueryResponse::failed(format!("Query failed: {e}"))))
        }
    }
}
