use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use pdf_chat_core::{hash_password, verify_password, NewUser, User};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::bad_request("username must not be empty"));
    }
    if !email.contains('@') {
        return Err(ApiError::bad_request("email is not valid"));
    }
    if request.password.is_empty() {
        return Err(ApiError::bad_request("password must not be empty"));
    }

    if state.users.username_or_email_taken(&username, &email).await? {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "already_registered",
            "Username or email already registered",
        ));
    }

    let password = request.password;
    let hashed_password = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(ApiError::internal)??;

    let is_admin = state.admins.contains(&username);
    let user = state
        .users
        .create_user(NewUser {
            username,
            email,
            full_name: request.full_name,
            hashed_password,
            is_admin,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let rejected = || ApiError::unauthorized("Incorrect username or password");

    let user = state
        .users
        .find_user(request.username.trim())
        .await?
        .ok_or_else(rejected)?;

    let hashed = user.hashed_password.clone();
    let password = request.password;
    let valid = tokio::task::spawn_blocking(move || verify_password(&password, &hashed))
        .await
        .map_err(ApiError::internal)?;
    if !valid {
        return Err(rejected());
    }

    let access_token = state.tokens.issue(&user.username, user.is_admin)?;
    info!(username = %user.username, "login succeeded");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
        user,
    }))
}
