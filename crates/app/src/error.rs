use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdf_chat_core::{AuthError, PipelineError, StoreError};
use serde::Serialize;
use tracing::error;

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// Every failure leaves the server as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// A request the extractors could not read; keeps their status code.
    pub fn invalid_request(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, "invalid_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        error!(%message, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message.to_string())
    }

    /// The authenticated chat route reports a missing index as 404.
    pub fn for_user_chat(error: PipelineError) -> Self {
        match error {
            PipelineError::IndexNotReady => Self::new(
                StatusCode::NOT_FOUND,
                "index_not_ready",
                "Vector store not found. Please upload PDFs first.",
            ),
            other => other.into(),
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        match error {
            PipelineError::MissingCredential => {
                error!("API key not configured");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "configuration_error",
                    "API key not configured",
                )
            }
            PipelineError::EmptyQuestion => {
                Self::new(StatusCode::BAD_REQUEST, "empty_question", error.to_string())
            }
            PipelineError::NoDocuments => {
                Self::new(StatusCode::BAD_REQUEST, "no_documents", "No PDF files uploaded")
            }
            PipelineError::NoReadableContent | PipelineError::IndexNotReady => Self::new(
                StatusCode::BAD_REQUEST,
                "no_readable_content",
                "No readable content could be extracted from the uploaded PDF files",
            ),
            PipelineError::Store(store) => store.into(),
            other => Self::internal(other),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Conflict(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "already_registered",
                "Username or email already registered",
            ),
            other => Self::internal(other),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Hashing(reason) => Self::internal(reason),
            AuthError::InvalidToken(_) | AuthError::Expired => {
                Self::unauthorized("Could not validate credentials")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
