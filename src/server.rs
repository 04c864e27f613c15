//! HTTP boundary for the Q&A service.
//!
//! Thin plumbing over the core pipeline: routes map 1:1 to the boundary
//! operations, and every handler delegates to the session, retrieval,
//! prompt, and generation modules.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Health check (`{ message, knowledge_base_active }`) |
//! | `POST` | `/ai/upload` | Ingest a document (form field `file_path`) |
//! | `POST` | `/ai/reset` | Clear the knowledge base |
//! | `POST` | `/ai/chat` | Ask a question; answer streams as SSE frames |
//!
//! # Error Contract
//!
//! Ingestion failures return `{ "error": "<message>" }` with a mapped
//! status: 404 missing path, 415 unsupported format, 422 malformed
//! document, 502 embedding backend failure. They never crash the process
//! and never corrupt the existing knowledge base.
//!
//! Chat failures surface inside the stream as a single `Error: <message>`
//! frame terminating it; retrieval failures never fail the request at all
//! (the answer is simply ungrounded).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::{Embedder, GeminiEmbedder};
use crate::generate::{escape_fragment, stream_events, GenerationEvent, GeminiGenerator, Generator};
use crate::loader::LoadError;
use crate::models::{ChatRequest, HealthResponse, MessageResponse};
use crate::prompt::compose;
use crate::retrieve::retrieve_context;
use crate::session::{ingest_file, IngestError, SessionState};

/// Shared application state passed to all route handlers.
///
/// The embedding and generation backends sit behind trait objects so
/// tests can inject deterministic stand-ins.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<SessionState>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
}

/// Build the service router over the given state.
///
/// Split out from [`run_server`] so integration tests can serve the full
/// API on an ephemeral listener with stub backends.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_health))
        .route("/ai/upload", post(handle_upload))
        .route("/ai/reset", post(handle_reset))
        .route("/ai/chat", post(handle_chat))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server on `[server].bind` with the production backends.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        config: Arc::new(config.clone()),
        session: Arc::new(SessionState::new()),
        embedder: Arc::new(GeminiEmbedder::new(config)?),
        generator: Arc::new(GeminiGenerator::new(config)?),
    };
    let app = build_router(state);

    println!("docqa listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// JSON error payload for ingestion failures.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map each ingestion error kind to its status code.
fn classify_ingest_error(err: IngestError) -> AppError {
    let status = match &err {
        IngestError::Load(LoadError::PathNotFound(_)) => StatusCode::NOT_FOUND,
        IngestError::Load(LoadError::UnsupportedFormat(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        IngestError::Load(LoadError::MalformedDocument(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        IngestError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    AppError {
        status,
        message: err.to_string(),
    }
}

// ============ GET / ============

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "docqa engine is running".to_string(),
        knowledge_base_active: state.session.is_active().await,
    })
}

// ============ POST /ai/upload ============

#[derive(Deserialize)]
struct UploadForm {
    file_path: PathBuf,
}

/// Ingest one document into the knowledge base (create-or-append).
async fn handle_upload(
    State(state): State<AppState>,
    Form(form): Form<UploadForm>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = ingest_file(
        &state.session,
        &state.config,
        state.embedder.as_ref(),
        &form.file_path,
    )
    .await
    .map_err(|e| {
        eprintln!("upload failed: {}", e);
        classify_ingest_error(e)
    })?;

    println!("ingested {}", form.file_path.display());
    Ok(Json(MessageResponse { message }))
}

// ============ POST /ai/reset ============

async fn handle_reset(State(state): State<AppState>) -> Json<MessageResponse> {
    state.session.reset().await;
    Json(MessageResponse {
        message: "Knowledge base cleared.".to_string(),
    })
}

// ============ POST /ai/chat ============

/// Answer a question as a live SSE stream.
///
/// Retrieval runs under the store's read lock and finishes before
/// generation starts, so a concurrent upload can proceed while the answer
/// streams out.
async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let context = {
        let slot = state.session.slot().await;
        retrieve_context(
            slot.as_ref(),
            &req.question,
            req.enable_rag,
            state.config.retrieval.k,
            state.embedder.as_ref(),
        )
        .await
    };

    let prompt = compose(&req.question, &req.history, &context);
    let rx = stream_events(state.generator.clone(), prompt);

    let stream = ReceiverStream::new(rx).map(|ev| {
        let data = match ev {
            GenerationEvent::Content(text) => text,
            // Content fragments arrive pre-escaped; error messages may
            // still carry newlines.
            GenerationEvent::Error(msg) => format!("Error: {}", escape_fragment(&msg)),
        };
        Ok::<Event, Infallible>(Event::default().data(data))
    });

    Sse::new(stream)
}
