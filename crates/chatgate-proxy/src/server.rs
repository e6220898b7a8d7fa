//! Axum HTTP server for the OpenAI-compatible API.
//!
//! Routes are mounted under every prefix OpenAI clients commonly configure:
//! none, `/v1`, `/api` and `/api/v1`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use bytes::Bytes;
use chatgate_core::{ChunkEnvelope, ChunkStream, ModelList};
use chatgate_hf::{ChatOrchestrator, ChatOutcome};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::auth::{authorize, bearer_token};
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::models::ChatCompletionsRequest;

/// Path prefixes every API route is served under.
pub const ROUTE_PREFIXES: [&str; 4] = ["", "/v1", "/api", "/api/v1"];

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<ChatOrchestrator>,
    api_key: Option<Arc<str>>,
    keep_alive: Duration,
}

impl AppState {
    pub fn new(orchestrator: Arc<ChatOrchestrator>, config: &ServerConfig) -> Self {
        Self {
            orchestrator,
            api_key: config.api_key.as_deref().map(Arc::from),
            keep_alive: config.keep_alive,
        }
    }
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    let api = ROUTE_PREFIXES.iter().fold(Router::new(), |router, prefix| {
        router
            .route(&format!("{prefix}/models"), get(list_models))
            .route(&format!("{prefix}/chat/completions"), post(chat_completions))
    });

    api.route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server on a pre-bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    orchestrator: Arc<ChatOrchestrator>,
    config: &ServerConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let app = router(AppState::new(orchestrator, config));

    info!(
        %addr,
        auth_enabled = config.api_key.is_some(),
        "chatgate listening"
    );
    info!("Configure OpenAI clients to use: http://{addr}/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("chatgate shut down");
    Ok(())
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_models(State(state): State<AppState>) -> Json<ModelList> {
    debug!("GET models");
    Json(ModelList::from_specs(state.orchestrator.registry().specs()))
}

async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let credential = authorize(state.api_key.as_deref(), bearer_token(&headers))?;
    let request: ChatCompletionsRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    debug!(model = %request.model, stream = request.stream, "POST chat/completions");

    match state.orchestrator.chat(request.into_chat_request(credential)?).await? {
        ChatOutcome::Stream { model, chunks } => Ok(sse_response(&model, chunks, state.keep_alive)),
        ChatOutcome::Complete(completion) => Ok(Json(completion).into_response()),
    }
}

/// Relay canonical chunks as `data:` events, one completion chunk each.
fn sse_response(model: &str, chunks: ChunkStream, keep_alive: Duration) -> Response {
    let envelope = ChunkEnvelope::new(model);
    let events = chunks.map(move |chunk| Event::default().json_data(envelope.wrap(&chunk)));
    Sse::new(events)
        .keep_alive(KeepAlive::new().interval(keep_alive))
        .into_response()
}
