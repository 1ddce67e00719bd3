use super::DISPLAY_TIME_FORMAT;
use crate::auth::{CurrentUser, MaybeUser};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use pdf_chat_core::ChatAnswer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub timestamp: String,
    pub model_name: String,
}

impl From<ChatAnswer> for ChatResponse {
    fn from(answer: ChatAnswer) -> Self {
        Self {
            answer: answer.answer,
            timestamp: answer.timestamp.format(DISPLAY_TIME_FORMAT).to_string(),
            model_name: answer.model_name,
        }
    }
}

/// Open chat. The conversation is recorded under the bearer user, else
/// under `user_id` from the body, else anonymously.
pub async fn chat(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let owner = user
        .map(|user| user.username)
        .or(request.user_id)
        .filter(|owner| !owner.trim().is_empty());

    let answer = state.query.ask(&request.question, owner.as_deref()).await?;
    Ok(Json(answer.into()))
}

pub async fn user_chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let answer = state
        .query
        .ask(&request.question, Some(&user.username))
        .await
        .map_err(ApiError::for_user_chat)?;
    Ok(Json(answer.into()))
}
