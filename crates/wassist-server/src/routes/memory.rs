use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use wassist_memory::{
    ConversationRecord, MemoryBackend, PatternAnalysis, PreferencesUpdate, TaskStatus,
    UserPreferences, UserTask,
};

use crate::state::AppState;

const DEFAULT_CONVERSATION_LIMIT: usize = 10;
const MAX_CONVERSATION_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct TaskParams {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ConversationParams {
    pub limit: Option<usize>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analysis/{number}", get(analysis))
        .route(
            "/preferences/{number}",
            get(get_preferences).post(update_preferences),
        )
        .route("/tasks/{number}", get(tasks))
        .route("/conversations/{number}", get(conversations))
}

/// Numbers arrive bare (`+9715...`) or with the channel prefix Twilio uses.
fn sender_key(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

fn backend(state: &AppState) -> Result<&Arc<dyn MemoryBackend>, StatusCode> {
    state.memory.as_ref().ok_or(StatusCode::SERVICE_UNAVAILABLE)
}

fn internal(what: &'static str) -> impl Fn(anyhow::Error) -> StatusCode {
    move |e| {
        tracing::error!(error = %e, "{what} failed");
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn user_id(memory: &Arc<dyn MemoryBackend>, number: &str) -> Result<String, StatusCode> {
    memory
        .get_or_create_user_id(&sender_key(number))
        .await
        .map_err(internal("user lookup"))
}

pub async fn analysis(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<PatternAnalysis>, StatusCode> {
    let memory = backend(&state)?;
    let user_id = user_id(memory, &number).await?;
    let analysis = memory
        .analyze_patterns(&user_id)
        .await
        .map_err(internal("pattern analysis"))?;
    Ok(Json(analysis))
}

pub async fn get_preferences(
    State(state): State<AppState>,
    Path(number): Path<String>,
) -> Result<Json<UserPreferences>, StatusCode> {
    let memory = backend(&state)?;
    let user_id = user_id(memory, &number).await?;
    memory
        .preferences(&user_id)
        .await
        .map_err(internal("preferences read"))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn update_preferences(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Json(update): Json<PreferencesUpdate>,
) -> Result<Json<UserPreferences>, StatusCode> {
    let memory = backend(&state)?;
    let user_id = user_id(memory, &number).await?;
    if !update.is_empty() {
        memory
            .update_preferences(&user_id, update)
            .await
            .map_err(internal("preferences update"))?;
    }
    memory
        .preferences(&user_id)
        .await
        .map_err(internal("preferences read"))?
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

pub async fn tasks(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(params): Query<TaskParams>,
) -> Result<Json<Vec<UserTask>>, StatusCode> {
    let memory = backend(&state)?;
    let status = match params.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(raw) => Some(TaskStatus::parse(raw).ok_or(StatusCode::BAD_REQUEST)?),
    };
    let user_id = user_id(memory, &number).await?;
    let tasks = memory
        .tasks(&user_id, status)
        .await
        .map_err(internal("task listing"))?;
    Ok(Json(tasks))
}

pub async fn conversations(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(params): Query<ConversationParams>,
) -> Result<Json<Vec<ConversationRecord>>, StatusCode> {
    let memory = backend(&state)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_CONVERSATION_LIMIT)
        .clamp(1, MAX_CONVERSATION_LIMIT);
    let user_id = user_id(memory, &number).await?;
    let records = memory
        .recent_conversations(&user_id, limit)
        .await
        .map_err(internal("conversation listing"))?;
    Ok(Json(records))
}
