use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::{error, info};

use crate::api::{
    types::{ChatRequest, ChatResponse, HealthResponse},
    AppState,
};

pub async fn home(State(state): State<AppState>) -> Response {
    match state.page.render(state.chat.model_available()) {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!("chat page render failed: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, "page unavailable").into_response()
        }
    }
}

/// Always answers 200. Bad payloads and orchestrator panics become the
/// `processing_error` apology.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            error!("Error in chat endpoint: {rejection}");
            return Json(ChatResponse::processing_error());
        }
    };

    info!(len = req.message.len(), "Received message: {}", req.message.trim());

    let chat = state.chat.clone();
    match tokio::task::spawn_blocking(move || chat.respond(&req.message)).await {
        Ok(reply) => Json(reply.into()),
        Err(err) => {
            error!("Error in chat endpoint: {err}");
            Json(ChatResponse::processing_error())
        }
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model_loaded: state.chat.model_available(),
    })
}
