//! HTTP surface: upload, document serving and the query endpoint.

use crate::config::AppConfig;
use crate::document_store::{self, DocumentStore, StoreError};
use crate::error::{AppError, MISSING_QUERY_FIELDS};
use crate::pipeline::QueryPipeline;
use crate::schema::{QueryBody, QueryResponse, UploadResponse};
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    store: DocumentStore,
    pipeline: Arc<QueryPipeline>,
}

impl AppState {
    pub fn new(store: DocumentStore, pipeline: QueryPipeline) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Build the router. `url_prefix` is where stored documents are served.
pub fn router(state: AppState, url_prefix: &str, max_body_bytes: usize) -> Router {
    let documents_route = format!("{}/{{name}}", url_prefix.trim_end_matches('/'));

    Router::new()
        .route("/health", get(health))
        .route("/api/upload", post(upload_document))
        .route("/api/query", post(query))
        .route(&documents_route, get(serve_document))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run_server(config: AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = router(state, &config.upload_url_prefix, config.max_upload_bytes);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Accept a single-file multipart upload under the `file` field.
///
/// Anything that is not a readable multipart form with a non-empty `file`
/// part is answered with [`StoreError::Empty`].
async fn upload_document(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected upload: {}", rejection);
        StoreError::Empty
    })?;
    let mut upload = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!("Malformed multipart upload: {}", e);
                return Err(StoreError::Empty.into());
            }
        };

        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("document").to_string();
            let data = field.bytes().await.map_err(|e| {
                warn!("Failed to read uploaded file: {}", e);
                StoreError::Empty
            })?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) = upload.ok_or(StoreError::Empty)?;
    let document = state.store.store(&data, &filename).await?;

    info!(
        "Received file: {} ({} bytes) stored at {}",
        document.original_name,
        data.len(),
        document.storage_path.display()
    );

    Ok(Json(UploadResponse {
        file_path: document.url,
    }))
}

/// Stream back a stored document.
async fn serve_document(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let bytes = state.store.read(&name).await?;
    let content_type = document_store::content_type_for(&name);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Answer a question about a selected passage.
async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryBody>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let request = match body {
        Ok(Json(body)) => body.validate(),
        Err(rejection) => {
            warn!("Rejected query body: {}", rejection);
            None
        }
    }
    .ok_or_else(|| AppError::Validation(MISSING_QUERY_FIELDS.to_string()))?;

    let response = state.pipeline.answer(&request).await?;
    Ok(Json(QueryResponse { response }))
}
