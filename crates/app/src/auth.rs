//! Bearer-token extractors.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use pdf_chat_core::User;

/// An authenticated, active user.
pub struct CurrentUser(pub User);

/// An authenticated, active admin.
pub struct AdminUser(pub User);

/// The caller when a bearer token is present. A present but invalid
/// token is still rejected.
pub struct MaybeUser(pub Option<User>);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

async fn authenticate(state: &AppState, token: &str) -> Result<User, ApiError> {
    let claims = state.tokens.verify(token)?;
    let user = state
        .users
        .find_user(&claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Could not validate credentials"))?;

    if user.disabled {
        return Err(ApiError::bad_request("Inactive user"));
    }
    Ok(user)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        Ok(CurrentUser(authenticate(state, token).await?))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(ApiError::forbidden("Not enough permissions"));
        }
        Ok(AdminUser(user))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if parts.headers.get(AUTHORIZATION).is_none() {
            return Ok(MaybeUser(None));
        }
        let token = bearer_token(parts).ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;
        Ok(MaybeUser(Some(authenticate(state, token).await?)))
    }
}
