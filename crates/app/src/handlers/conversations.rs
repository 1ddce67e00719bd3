use crate::auth::{AdminUser, CurrentUser};
use crate::error::ApiError;
use crate::extract::ApiQuery;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use pdf_chat_core::{ConversationPage, Page};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    fn validated(&self) -> Result<Page, ApiError> {
        let defaults = Page::default();
        let page = self.page.unwrap_or(defaults.page);
        let limit = self.limit.unwrap_or(defaults.limit);

        if page == 0 {
            return Err(ApiError::bad_request("page must be at least 1"));
        }
        if limit == 0 || limit > Page::MAX_LIMIT {
            return Err(ApiError::bad_request(format!(
                "limit must be between 1 and {}",
                Page::MAX_LIMIT
            )));
        }
        Ok(Page { page, limit })
    }
}

#[derive(Debug, Deserialize)]
pub struct OwnerPageQuery {
    pub user_id: String,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn conversations_by_owner(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OwnerPageQuery>,
) -> Result<Json<ConversationPage>, ApiError> {
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .validated()?;
    Ok(Json(state.query.history(Some(&query.user_id), page).await?))
}

pub async fn my_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ConversationPage>, ApiError> {
    let page = query.validated()?;
    Ok(Json(state.query.history(Some(&user.username), page).await?))
}

pub async fn all_conversations(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ConversationPage>, ApiError> {
    let page = query.validated()?;
    Ok(Json(state.query.history(None, page).await?))
}
