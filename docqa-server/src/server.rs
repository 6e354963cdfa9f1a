use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docqa_rag::{DocQa, QueryFailure, QueryResult, RagError, split_queries};
use serde::Serialize;
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Largest accepted upload, in bytes.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub docqa: Arc<DocQa>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(docqa: DocQa, upload_dir: impl Into<PathBuf>) -> Self {
        Self { docqa: Arc::new(docqa), upload_dir: upload_dir.into() }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4444,
            upload_dir: PathBuf::from("./uploads"),
        }
    }
}

impl ServerConfig {
    /// Read `DOCQA_HOST`, `DOCQA_PORT` and `DOCQA_UPLOAD_DIR`, keeping defaults for unset or
    /// unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("DOCQA_HOST").unwrap_or(defaults.host),
            port: std::env::var("DOCQA_PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            upload_dir: std::env::var("DOCQA_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_dir),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RagOnDocsResponse {
    pub result: Vec<QueryResult>,
    pub failures: Vec<QueryFailure>,
}

/// An error response: `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::Config(_) => StatusCode::BAD_REQUEST,
            RagError::DocumentParse { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/rag_on_docs", post(rag_on_docs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig, docqa: DocQa) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("cannot create upload dir {}", config.upload_dir.display()))?;

    let app = app_router(AppState::new(docqa, config.upload_dir.clone()));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(json!({"status":"ok","service":"docqa"}))
}

struct Upload {
    post_in_slack: bool,
    queries: Vec<String>,
    file_name: String,
    bytes: Vec<u8>,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut post_in_slack = false;
    let mut queries = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "post_in_slack" => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                post_in_slack = parse_flag(&text).ok_or_else(|| {
                    ApiError::bad_request(format!("post_in_slack must be a boolean, got '{text}'"))
                })?;
            }
            "queries" => {
                let text = field.text().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                queries = Some(split_queries(&text));
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.to_string()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            other => warn!(field = other, "ignoring unknown form field"),
        }
    }

    let queries = queries.ok_or_else(|| ApiError::bad_request("missing form field 'queries'"))?;
    if queries.is_empty() {
        return Err(ApiError::bad_request("'queries' contains no questions"));
    }
    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::bad_request("missing form field 'file'"))?;

    Ok(Upload { post_in_slack, queries, file_name, bytes })
}

/// `file-<unix timestamp>-<uuid>.<ext>`, keeping the uploaded extension (default `pdf`).
fn stored_file_name(original: &str) -> String {
    let extension = std::path::Path::new(original)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or("pdf");
    format!("file-{}-{}.{extension}", chrono::Utc::now().timestamp(), Uuid::new_v4().simple())
}

async fn rag_on_docs(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RagOnDocsResponse>, ApiError> {
    let upload = read_upload(multipart).await?;

    let path = state.upload_dir.join(stored_file_name(&upload.file_name));
    tokio::fs::write(&path, &upload.bytes).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to store upload");
        ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("failed to store upload: {e}"),
        }
    })?;
    info!(
        path = %path.display(),
        bytes = upload.bytes.len(),
        queries = upload.queries.len(),
        post_in_slack = upload.post_in_slack,
        "stored upload"
    );

    let outcome = state.docqa.run(&path, &upload.queries, upload.post_in_slack).await;
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), error = %e, "failed to remove upload");
    }
    let report = outcome.map_err(|e| {
        error!(phase = e.phase(), error = %e, "batch failed");
        ApiError::from(e)
    })?;

    Ok(Json(RagOnDocsResponse { result: report.results, failures: report.failures }))
}
