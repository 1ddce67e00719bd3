//! SQLite persistence for blobs, the document catalog, users and chat history.

use crate::models::{
    CatalogEntry, ConversationPage, ConversationRecord, DocumentUpload, NewUser, Page, User,
};
use crate::traits::{BlobStore, ConversationLog, DocumentCatalog, UserStore};
use crate::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: [&str; 7] = [
    r#"
    CREATE TABLE IF NOT EXISTS blobs (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        content_type TEXT NOT NULL,
        data BLOB NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS files (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        owner TEXT,
        file_id TEXT NOT NULL UNIQUE,
        size INTEGER NOT NULL,
        content_type TEXT NOT NULL,
        checksum TEXT NOT NULL,
        upload_date TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS extracted_texts (
        file_id TEXT PRIMARY KEY,
        text TEXT NOT NULL,
        extracted_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT,
        hashed_password TEXT NOT NULL,
        is_admin INTEGER NOT NULL DEFAULT 0,
        disabled INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        owner TEXT,
        question TEXT NOT NULL,
        answer TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        model_name TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_files_owner ON files(owner, upload_date)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_owner ON conversations(owner, timestamp)",
];

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and applies the schema.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "sqlite store ready");
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl BlobStore for SqliteStore {
    async fn put_blob(&self, upload: &DocumentUpload) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO blobs (id, filename, content_type, data, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&upload.filename)
        .bind(&upload.content_type)
        .bind(&upload.bytes)
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        debug!(blob = %id, filename = %upload.filename, bytes = upload.bytes.len(), "stored blob");
        Ok(id)
    }

    async fn get_blob(&self, blob_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query("SELECT data FROM blobs WHERE id = ?")
            .bind(blob_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("data")?),
            None => None,
        })
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM blobs WHERE id = ?")
            .bind(blob_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DocumentCatalog for SqliteStore {
    async fn insert_entry(&self, entry: &CatalogEntry) -> Result<(), StoreError> {
        let size = i64::try_from(entry.size)
            .map_err(|_| StoreError::Corrupt(format!("file size {} out of range", entry.size)))?;

        sqlx::query(
            r#"
            INSERT INTO files (id, filename, owner, file_id, size, content_type, checksum, upload_date)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.filename)
        .bind(&entry.owner)
        .bind(&entry.file_id)
        .bind(size)
        .bind(&entry.content_type)
        .bind(&entry.checksum)
        .bind(encode_timestamp(entry.upload_date))
        .execute(&self.pool)
        .await
        .map_err(|error| conflict_or(error, &entry.file_id))?;

        Ok(())
    }

    async fn list_entries(&self, owner: Option<&str>) -> Result<Vec<CatalogEntry>, StoreError> {
        let rows = match owner {
            Some(owner) => {
                sqlx::query("SELECT * FROM files WHERE owner = ? ORDER BY upload_date, id")
                    .bind(owner)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM files ORDER BY upload_date, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(catalog_entry_from_row).collect()
    }

    async fn count_entries(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn delete_entry(&self, file_id: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM files WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM extracted_texts WHERE file_id = ?")
            .bind(file_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cached_text(&self, file_id: &str) -> Result<Option<String>, StoreError> {
        Ok(
            sqlx::query_scalar("SELECT text FROM extracted_texts WHERE file_id = ?")
                .bind(file_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn cache_text(&self, file_id: &str, text: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO extracted_texts (file_id, text, extracted_at) VALUES (?, ?, ?)
            ON CONFLICT(file_id) DO UPDATE SET text = excluded.text, extracted_at = excluded.extracted_at
            "#,
        )
        .bind(file_id)
        .bind(text)
        .bind(encode_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ConversationLog for SqliteStore {
    async fn append(&self, record: &ConversationRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO conversations (id, owner, question, answer, timestamp, model_name)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner)
        .bind(&record.question)
        .bind(&record.answer)
        .bind(encode_timestamp(record.timestamp))
        .bind(&record.model_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_conversations(
        &self,
        owner: Option<&str>,
        page: Page,
    ) -> Result<ConversationPage, StoreError> {
        let limit = i64::from(page.limit);
        let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);

        let (total, rows): (i64, Vec<SqliteRow>) = match owner {
            Some(owner) => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations WHERE owner = ?")
                    .bind(owner)
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(
                    r#"
                    SELECT * FROM conversations WHERE owner = ?
                    ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?
                    "#,
                )
                .bind(owner)
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM conversations")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query(
                    "SELECT * FROM conversations ORDER BY timestamp DESC, id DESC LIMIT ? OFFSET ?",
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        Ok(ConversationPage {
            conversations: rows
                .iter()
                .map(conversation_from_row)
                .collect::<Result<_, _>>()?,
            total_count: total.max(0) as u64,
        })
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let created = User {
            id: Uuid::new_v4().to_string(),
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            hashed_password: user.hashed_password,
            is_admin: user.is_admin,
            disabled: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, full_name, hashed_password, is_admin, disabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&created.id)
        .bind(&created.username)
        .bind(&created.email)
        .bind(&created.full_name)
        .bind(&created.hashed_password)
        .bind(created.is_admin)
        .bind(created.disabled)
        .bind(encode_timestamp(created.created_at))
        .execute(&self.pool)
        .await
        .map_err(|error| conflict_or(error, &created.username))?;

        info!(username = %created.username, is_admin = created.is_admin, "user registered");
        Ok(created)
    }

    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? OR email = ?")
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

fn conflict_or(error: sqlx::Error, key: &str) -> StoreError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(key.to_string()),
        _ => StoreError::Database(error),
    }
}

/// Fixed-width UTC text so lexical order in SQL matches time order.
fn encode_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| StoreError::Corrupt(format!("bad timestamp {raw:?}: {error}")))
}

fn catalog_entry_from_row(row: &SqliteRow) -> Result<CatalogEntry, StoreError> {
    let size: i64 = row.try_get("size")?;
    let upload_date: String = row.try_get("upload_date")?;
    Ok(CatalogEntry {
        id: row.try_get("id")?,
        filename: row.try_get("filename")?,
        owner: row.try_get("owner")?,
        file_id: row.try_get("file_id")?,
        size: size.max(0) as u64,
        content_type: row.try_get("content_type")?,
        checksum: row.try_get("checksum")?,
        upload_date: decode_timestamp(&upload_date)?,
    })
}

fn conversation_from_row(row: &SqliteRow) -> Result<ConversationRecord, StoreError> {
    let timestamp: String = row.try_get("timestamp")?;
    Ok(ConversationRecord {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        question: row.try_get("question")?,
        answer: row.try_get("answer")?,
        timestamp: decode_timestamp(&timestamp)?,
        model_name: row.try_get("model_name")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let created_at: String = row.try_get("created_at")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        hashed_password: row.try_get("hashed_password")?,
        is_admin: row.try_get("is_admin")?,
        disabled: row.try_get("disabled")?,
        created_at: decode_timestamp(&created_at)?,
    })
}
