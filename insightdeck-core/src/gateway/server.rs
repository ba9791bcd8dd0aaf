//! HTTP endpoints for uploading spreadsheets and fetching reports.

use super::store::{ReportStore, is_allowed_upload, sanitize_file_name};
use crate::brain::LlmProvider;
use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared state for the handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub store: ReportStore,
    pub static_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        let server = &pipeline.config().server;
        let store = ReportStore::from_config(server);
        let static_dir = server.static_dir.clone();
        Self {
            pipeline: Arc::new(pipeline),
            store,
            static_dir,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .route("/download/{pdf_name}", get(download_handler))
        .route("/history", get(history_handler))
        .route("/health", get(health_handler));
    if let Some(dir) = &state.static_dir {
        app = app.nest_service("/static", ServeDir::new(dir));
    }
    app.with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Serve the frontend entry page, if one is configured.
async fn index_handler(State(state): State<AppState>) -> Response {
    let Some(dir) = &state.static_dir else {
        return (StatusCode::NOT_FOUND, "Frontend not found").into_response();
    };
    match tokio::fs::read_to_string(dir.join("index.html")).await {
        Ok(html) => Html(html).into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "Frontend not found").into_response(),
    }
}

/// Accept a spreadsheet, run the pipeline on it, and list the reports produced.
async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((file_name, bytes));
                        break;
                    }
                    Err(e) => {
                        return json_error(StatusCode::BAD_REQUEST, format!("Invalid upload: {e}"));
                    }
                }
            }
            Ok(Some(_)) => continue,
            Ok(None) => break,
            Err(e) => return json_error(StatusCode::BAD_REQUEST, format!("Invalid upload: {e}")),
        }
    }

    let Some((file_name, bytes)) = upload else {
        return json_error(StatusCode::BAD_REQUEST, "No file uploaded");
    };
    if sanitize_file_name(&file_name).is_none() || !is_allowed_upload(&file_name) {
        warn!(file = %file_name, "Rejected upload");
        return json_error(StatusCode::BAD_REQUEST, "Invalid file type");
    }

    let path = match state.store.save_upload(&file_name, &bytes).await {
        Ok(path) => path,
        Err(e) => {
            error!(file = %file_name, error = %e, "Failed to save upload");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("File upload failed: {e}"),
            );
        }
    };
    info!(file = %file_name, bytes = bytes.len(), "Upload received");

    match state.pipeline.run(&path).await {
        Ok(result) => {
            let pdfs: Vec<String> = result
                .report_files()
                .into_iter()
                .filter(|name| state.store.resolve_report(name).is_some())
                .collect();
            Json(json!({ "success": true, "pdfs": pdfs })).into_response()
        }
        Err(e) => {
            error!(file = %file_name, error = %e, "Pipeline failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": format!("Workflow failed: {e}") })),
            )
                .into_response()
        }
    }
}

/// Stream a generated report.
async fn download_handler(State(state): State<AppState>, Path(pdf_name): Path<String>) -> Response {
    let Some(path) = state.store.resolve_report(&pdf_name) else {
        return json_error(StatusCode::NOT_FOUND, "File not found");
    };
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{pdf_name}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            warn!(file = %pdf_name, error = %e, "Failed to read report");
            json_error(StatusCode::NOT_FOUND, "File not found")
        }
    }
}

/// List generated reports.
async fn history_handler(State(state): State<AppState>) -> Response {
    match state.store.list_reports().await {
        Ok(pdfs) => Json(json!({ "pdfs": pdfs })).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to list reports");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Create the storage directories and serve until the process is stopped.
pub async fn serve(config: AppConfig, provider: Arc<dyn LlmProvider>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(Pipeline::new(provider, config));
    state.store.ensure_dirs().await?;

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Serving reports on http://{}", addr);
    axum::serve(listener, app).await
}
