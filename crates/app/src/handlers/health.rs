use super::DISPLAY_TIME_FORMAT;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "healthy",
        timestamp: Utc::now().format(DISPLAY_TIME_FORMAT).to_string(),
    })
}
