use crate::server::router;
use crate::state::AppState;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pdf_chat_core::{
    AiBackends, CharacterNgramEmbedder, LanguageModel, ModelProfile, OcrBackend, PipelineConfig,
    SearchError, SqliteStore, TokenSigner,
};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "pdfchatboundary";

struct CannedModel;

#[async_trait]
impl LanguageModel for CannedModel {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn generate(&self, _prompt: &str) -> Result<String, SearchError> {
        Ok("canned answer".to_string())
    }
}

async fn app_with(credential: bool) -> (TempDir, Router) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::connect(&dir.path().join("test.sqlite3"))
        .await
        .expect("store opens");

    let mut config = PipelineConfig::new(ModelProfile::GoogleAi, dir.path());
    config.ocr = OcrBackend::Disabled;
    let backends = credential.then(|| {
        AiBackends::new(
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(CannedModel),
        )
    });

    let state = AppState::assemble(
        &config,
        backends,
        Arc::new(store),
        TokenSigner::new(SECRET, 30),
        HashSet::from(["root".to_string()]),
    );
    (dir, router(state, 1024 * 1024))
}

async fn app() -> (TempDir, Router) {
    app_with(true).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request handled");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request builds")
}

fn upload_request(owner: &str, filename: &str, contents: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"user_id\"\r\n\r\n\
         {owner}\r\n\
         --{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method(Method::POST)
        .uri("/upload-pdfs")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request builds")
}

async fn register_and_login(app: &Router, username: &str) -> String {
    let (status, _) = send(
        app,
        json_request(
            Method::POST,
            "/register",
            json!({
                "username": username,
                "email": format!("{username}@x.com"),
                "password": "pw-123",
            }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/login",
            json!({ "username": username, "password": "pw-123" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["access_token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn health_reports_healthy() {
    let (_dir, app) = app().await;
    let (status, body) = send(&app, get("/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["timestamp"].as_str().map(str::len), Some(19));
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let (_dir, app) = app().await;
    let payload = json!({ "username": "alice", "email": "alice@x.com", "password": "pw" });

    let (status, body) = send(&app, json_request(Method::POST, "/register", payload.clone(), None)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["is_admin"], false);
    assert!(body.get("hashed_password").is_none());

    let (status, body) = send(&app, json_request(Method::POST, "/register", payload, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "already_registered");
    assert!(body["error"]["message"]
        .as_str()
        .is_some_and(|message| message.contains("already registered")));
}

#[tokio::test]
async fn login_checks_the_password_and_signs_claims() {
    let (_dir, app) = app().await;
    register_and_login(&app, "alice").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/login",
            json!({ "username": "alice", "password": "wrong" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/login",
            json!({ "username": "alice", "password": "pw-123" }),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["user"]["username"], "alice");

    let token = body["access_token"].as_str().expect("token");
    let claims = TokenSigner::new(SECRET, 30).verify(token).expect("valid token");
    assert_eq!(claims.sub, "alice");
    assert!(!claims.is_admin);
}

#[tokio::test]
async fn configured_admins_get_admin_tokens() {
    let (_dir, app) = app().await;
    let root = register_and_login(&app, "root").await;
    let alice = register_and_login(&app, "alice").await;

    assert!(TokenSigner::new(SECRET, 30).verify(&root).expect("valid").is_admin);

    let (status, _) = send(&app, get("/conversations/all", Some(&alice))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, get("/conversations/all", Some(&root))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let (_dir, app) = app().await;

    let (status, _) = send(&app, get("/conversations/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/conversations/me", Some("not.a.token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = TokenSigner::new("other-secret", 30).issue("alice", true).expect("token");
    let (status, _) = send(&app, get("/conversations/me", Some(&forged))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleting_an_unknown_file_is_not_found() {
    let (_dir, app) = app().await;
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/pdf-files/does-not-exist")
        .body(Body::empty())
        .expect("request builds");

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn chat_without_documents_is_a_client_error() {
    let (_dir, app) = app().await;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/chat", json!({ "question": "hello?" }), None),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "no_documents");
}

#[tokio::test]
async fn chat_without_credential_is_a_server_error() {
    let (_dir, app) = app_with(false).await;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/chat", json!({ "question": "hello?" }), None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "configuration_error");
}

#[tokio::test]
async fn unreadable_upload_is_cataloged_but_not_answerable() {
    let (_dir, app) = app().await;

    let (status, body) = send(&app, upload_request("bob", "notes.pdf", "not really a pdf")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uploaded_files"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["uploaded_files"][0]["owner"], "bob");
    assert_eq!(body["uploaded_files"][0]["filename"], "notes.pdf");
    assert_eq!(body["indexing"]["status"], "skipped");

    let (_, first) = send(&app, get("/pdf-files", None)).await;
    let (_, second) = send(&app, get("/pdf-files", None)).await;
    assert_eq!(first, second);
    assert_eq!(first["files"].as_array().map(Vec::len), Some(1));

    let (_, none) = send(&app, get("/pdf-files?user_id=carol", None)).await;
    assert_eq!(none["files"].as_array().map(Vec::len), Some(0));

    let (status, body) = send(
        &app,
        json_request(Method::POST, "/chat", json!({ "question": "hello?" }), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "no_readable_content");

    let token = register_and_login(&app, "bob").await;
    let (status, body) = send(
        &app,
        json_request(Method::POST, "/user/chat", json!({ "question": "hello?" }), Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "index_not_ready");
}

#[tokio::test]
async fn upload_then_delete_round_trip() {
    let (_dir, app) = app().await;
    let (_, body) = send(&app, upload_request("bob", "a.pdf", "still not a pdf")).await;
    let file_id = body["uploaded_files"][0]["file_id"]
        .as_str()
        .expect("file id")
        .to_string();

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/pdf-files/{file_id}"))
        .body(Body::empty())
        .expect("request builds");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["indexing"]["status"], "skipped");

    let (_, listing) = send(&app, get("/pdf-files", None)).await;
    assert_eq!(listing["files"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn conversation_paging_is_validated() {
    let (_dir, app) = app().await;

    let (status, _) = send(&app, get("/conversations?user_id=bob&limit=0", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get("/conversations?user_id=bob&page=2&limit=5", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
    assert_eq!(body["conversations"], json!([]));
}

#[tokio::test]
async fn malformed_chat_body_is_a_json_error() {
    let (_dir, app) = app().await;

    let (status, body) = send(&app, json_request(Method::POST, "/chat", json!({}), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "invalid_request");
    assert!(body["error"]["message"]
        .as_str()
        .is_some_and(|message| message.contains("question")));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .expect("request builds");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn missing_query_parameter_is_a_json_error() {
    let (_dir, app) = app().await;

    let (status, body) = send(&app, get("/conversations", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");

    let (status, body) = send(&app, get("/conversations?user_id=bob&limit=ten", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_request");
}

#[tokio::test]
async fn upload_without_multipart_body_is_a_json_error() {
    let (_dir, app) = app().await;

    let (status, body) = send(&app, json_request(Method::POST, "/upload-pdfs", json!({}), None)).await;
    assert!(status.is_client_error());
    assert_eq!(body["error"]["code"], "invalid_request");

    let (status, body) = send(&app, get("/no-such-route", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}
