//! HTTP surface.
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | `POST` | `/register` | none |
//! | `POST` | `/login` | none |
//! | `POST` | `/upload-pdfs` | optional bearer |
//! | `POST` | `/chat` | optional bearer |
//! | `POST` | `/user/chat` | bearer |
//! | `GET` | `/conversations?user_id=` | none |
//! | `GET` | `/conversations/me` | bearer |
//! | `GET` | `/conversations/all` | admin bearer |
//! | `GET` | `/pdf-files` | none |
//! | `DELETE` | `/pdf-files/{file_id}` | none |
//! | `GET` | `/health` | none |

use crate::error::ApiError;
use crate::handlers::{auth, chat, conversations, documents, health};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/upload-pdfs", post(documents::upload_pdfs))
        .route("/chat", post(chat::chat))
        .route("/user/chat", post(chat::user_chat))
        .route("/conversations", get(conversations::conversations_by_owner))
        .route("/conversations/me", get(conversations::my_conversations))
        .route("/conversations/all", get(conversations::all_conversations))
        .route("/pdf-files", get(documents::list_pdf_files))
        .route("/pdf-files/{file_id}", delete(documents::delete_pdf_file))
        .route("/health", get(health::health))
        .fallback(unknown_route)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn unknown_route() -> ApiError {
    ApiError::not_found("no such route")
}

pub async fn serve(state: AppState, bind_addr: &str, max_body_bytes: usize) -> anyhow::Result<()> {
    let app = router(state, max_body_bytes);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
