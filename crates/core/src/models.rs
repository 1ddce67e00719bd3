use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One uploaded file as received from a client, before it is stored.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub content_type: String,
    pub owner: Option<String>,
    pub bytes: Vec<u8>,
}

/// A document whose bytes are about to be run through text extraction.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub filename: String,
    pub owner: Option<String>,
    /// Reference into the blob store.
    pub file_id: String,
    pub size: u64,
    pub content_type: String,
    pub checksum: String,
    pub upload_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexGeneration {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub embedding_model: String,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationRecord {
    pub id: String,
    pub owner: Option<String>,
    pub question: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
    pub model_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub is_admin: bool,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub hashed_password: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub const MAX_LIMIT: u32 = 100;

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationRecord>,
    pub total_count: u64,
}
