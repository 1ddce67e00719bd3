use crate::auth::MaybeUser;
use crate::error::ApiError;
use crate::extract::{ApiMultipart, ApiPath, ApiQuery};
use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use pdf_chat_core::{CatalogEntry, DeleteOutcome, DocumentUpload, IndexingStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

const OWNER_FIELD: &str = "user_id";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: &'static str,
    pub uploaded_files: Vec<CatalogEntry>,
    pub timestamp: DateTime<Utc>,
    pub indexing: IndexingStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<CatalogEntry>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub indexing: IndexingStatus,
}

/// Multipart upload. Every part with a file name is stored; a `user_id`
/// text part names the owner unless a bearer token already does.
pub async fn upload_pdfs(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut owner = user.map(|user| user.username);
    let token_owner = owner.is_some();
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(OWNER_FIELD) && field.file_name().is_none() {
            let value = field.text().await?;
            if !token_owner && !value.trim().is_empty() {
                owner = Some(value.trim().to_string());
            }
            continue;
        }

        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;

        files.push((filename, content_type, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("no files in request"));
    }

    let uploads: Vec<DocumentUpload> = files
        .into_iter()
        .map(|(filename, content_type, bytes)| DocumentUpload {
            filename,
            content_type,
            owner: owner.clone(),
            bytes,
        })
        .collect();

    let report = state.ingestion.upload(&uploads).await?;
    info!(files = report.files.len(), owner = ?owner, "upload handled");

    Ok(Json(UploadResponse {
        message: "Files uploaded successfully",
        uploaded_files: report.files,
        timestamp: Utc::now(),
        indexing: report.indexing,
    }))
}

pub async fn list_pdf_files(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<FileList>, ApiError> {
    let owner = query.user_id.as_deref().filter(|owner| !owner.is_empty());
    let files = state.catalog.list_entries(owner).await?;
    Ok(Json(FileList { files }))
}

pub async fn delete_pdf_file(
    State(state): State<AppState>,
    ApiPath(file_id): ApiPath<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    match state.ingestion.delete_document(&file_id).await? {
        DeleteOutcome::NotFound => Err(ApiError::not_found("PDF file not found")),
        DeleteOutcome::Deleted { indexing } => Ok(Json(DeleteResponse {
            message: "PDF file deleted successfully",
            indexing,
        })),
    }
}
