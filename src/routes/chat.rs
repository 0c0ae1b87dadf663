use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use crate::{
    error::AppError,
    message::{ChatRequest, ChatResponse, EndRequest, EndResponse},
    services::orchestrator::{END_COMMAND, OrchestratorResult},
    state::SharedState,
};

fn into_schema<T: serde::de::DeserializeOwned>(result: OrchestratorResult) -> Result<T, AppError> {
    Ok(serde_json::from_value(serde_json::Value::Object(result))?)
}

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(payload) = payload?;

    let result = state
        .orchestrator
        .process_user_query(&payload.message, &payload.session_id)
        .await?;

    Ok(Json(into_schema(result)?))
}

pub async fn end_handler(
    State(state): State<SharedState>,
    payload: Result<Json<EndRequest>, JsonRejection>,
) -> Result<Json<EndResponse>, AppError> {
    let Json(payload) = payload?;

    let result = state
        .orchestrator
        .process_user_query(END_COMMAND, &payload.session_id)
        .await?;

    Ok(Json(into_schema(result)?))
}
