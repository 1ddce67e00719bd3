use crate::models::{
    CatalogEntry, ConversationPage, ConversationRecord, DocumentUpload, IndexGeneration, NewUser,
    Page, RetrievedChunk, User,
};
use crate::{SearchError, StoreError};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Builds a new generation from `texts` and makes it current. The
    /// previous generation stays readable until the switch.
    async fn replace(
        &self,
        texts: &[String],
        embeddings: &[Vec<f32>],
        embedding_model: &str,
    ) -> Result<IndexGeneration, SearchError>;

    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, SearchError>;

    async fn current_generation(&self) -> Result<Option<IndexGeneration>, SearchError>;

    async fn clear(&self) -> Result<(), SearchError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores the bytes and returns the new blob id.
    async fn put_blob(&self, upload: &DocumentUpload) -> Result<String, StoreError>;

    async fn get_blob(&self, blob_id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn delete_blob(&self, blob_id: &str) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    async fn insert_entry(&self, entry: &CatalogEntry) -> Result<(), StoreError>;

    /// Entries ordered by upload time, optionally restricted to one owner.
    async fn list_entries(&self, owner: Option<&str>) -> Result<Vec<CatalogEntry>, StoreError>;

    async fn count_entries(&self) -> Result<u64, StoreError>;

    /// Removes the entry pointing at `file_id` and its cached text; false
    /// when no entry existed.
    async fn delete_entry(&self, file_id: &str) -> Result<bool, StoreError>;

    /// Text previously extracted from `file_id`, if any.
    async fn cached_text(&self, file_id: &str) -> Result<Option<String>, StoreError>;

    async fn cache_text(&self, file_id: &str, text: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ConversationLog: Send + Sync {
    async fn append(&self, record: &ConversationRecord) -> Result<(), StoreError>;

    /// Newest first. `owner = None` lists every conversation.
    async fn list_conversations(
        &self,
        owner: Option<&str>,
        page: Page,
    ) -> Result<ConversationPage, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the username or email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError>;

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, StoreError>;
}
