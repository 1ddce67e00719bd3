pub mod generational;
pub mod sqlite;

pub use generational::{cosine_similarity, GenerationalIndex};
pub use sqlite::SqliteStore;
