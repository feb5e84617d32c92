//! Sous HTTP 接口
//!
//! 启动: cargo run --bin sous-web --features web
//! 所有成功的处理器都返回 ResponseEnvelope（JSON，HTTP 200）；failed / degraded 通过信封的 status 表达。

#![cfg(feature = "web")]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use sous::agent::create_orchestrator_from_path;
use sous::core::{ConversationHistory, ImageInput, Orchestrator, ResponseEnvelope, UserRequest};

/// 会话清理间隔
const CLEANUP_INTERVAL_SECS: u64 = 300;

struct AppState {
    orchestrator: Orchestrator,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    session_id: Option<String>,
    text: String,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    session_id: Option<String>,
    /// base64 或 data URL
    image: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct SessionRequest {
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct SearchRecipesRequest {
    #[serde(default)]
    session_id: Option<String>,
    ingredients: Vec<String>,
}

#[derive(Deserialize)]
struct SelectRequest {
    session_id: String,
    index: usize,
}

fn session_or_new(id: Option<String>) -> String {
    id.filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// POST /api/chat
async fn api_chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> ApiResult<ResponseEnvelope> {
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "text is required".to_string()));
    }
    let session_id = session_or_new(req.session_id);
    let outcome = state.orchestrator.handle_text_query(&session_id, &req.text).await;
    tracing::debug!(session = %session_id, trace = ?outcome.trace.states(), "chat handled");
    Ok(Json(outcome.envelope))
}

/// POST /api/analyze-ingredients
async fn api_analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> ApiResult<ResponseEnvelope> {
    if req.image.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is required".to_string()));
    }
    let session_id = session_or_new(req.session_id);
    let request = UserRequest {
        text: req.text,
        image: Some(ImageInput::Upload(req.image)),
    };
    let outcome = state.orchestrator.handle_request(&session_id, request).await;
    Ok(Json(outcome.envelope))
}

/// POST /api/shopping-list
async fn api_shopping_list(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SessionRequest>,
) -> ApiResult<ResponseEnvelope> {
    let session_id = session_or_new(req.session_id);
    let outcome = state.orchestrator.generate_shopping_list(&session_id).await;
    Ok(Json(outcome.envelope))
}

/// POST /api/search-recipes
async fn api_search_recipes(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRecipesRequest>,
) -> ApiResult<ResponseEnvelope> {
    if req.ingredients.iter().all(|i| i.trim().is_empty()) {
        return Err((StatusCode::BAD_REQUEST, "ingredients are required".to_string()));
    }
    let session_id = session_or_new(req.session_id);
    let outcome = state.orchestrator.search_recipes(&session_id, req.ingredients).await;
    Ok(Json(outcome.envelope))
}

/// POST /api/select-recipe
async fn api_select_recipe(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<ResponseEnvelope> {
    let outcome = state.orchestrator.select_recipe(&req.session_id, req.index).await;
    Ok(Json(outcome.envelope))
}

/// GET /api/sessions/:id/history
async fn api_history(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<ConversationHistory> {
    if state.orchestrator.sessions().get(&id).await.is_none() {
        return Err((StatusCode::NOT_FOUND, "session not found".to_string()));
    }
    Ok(Json(state.orchestrator.conversation_history(&id).await))
}

/// DELETE /api/sessions/:id
async fn api_session_clear(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> StatusCode {
    state.orchestrator.clear_session(&id).await;
    state.orchestrator.sessions().remove(&id).await;
    StatusCode::OK
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sous::observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let (cfg, orchestrator) = create_orchestrator_from_path(config_path);
    let state = Arc::new(AppState { orchestrator });

    let app = Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/analyze-ingredients", post(api_analyze))
        .route("/api/search-recipes", post(api_search_recipes))
        .route("/api/shopping-list", post(api_shopping_list))
        .route("/api/select-recipe", post(api_select_recipe))
        .route("/api/sessions/:id/history", get(api_history))
        .route("/api/sessions/:id", delete(api_session_clear))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(Arc::clone(&state));

    // 定期清理空闲会话
    let cleanup_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));
        interval.tick().await;
        loop {
            interval.tick().await;
            cleanup_state.orchestrator.sessions().cleanup_expired().await;
        }
    });

    tracing::info!("Sous web listening on http://{}", cfg.app.bind);
    let listener = tokio::net::TcpListener::bind(&cfg.app.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
