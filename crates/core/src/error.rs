use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("unknown model profile: {0:?}")]
    UnknownModelProfile(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("store not available yet: {0}")]
    NotReady(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token expired")]
    Expired,
}

/// Failure taxonomy of the ingestion and query pipelines.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("API key is not configured")]
    MissingCredential,

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("no PDF files uploaded")]
    NoDocuments,

    #[error("no readable content could be extracted from the uploaded PDF files")]
    NoReadableContent,

    #[error("vector index has not been built yet; upload PDF files first")]
    IndexNotReady,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
