pub mod auth;
pub mod chat;
pub mod conversations;
pub mod documents;
pub mod health;

/// Wall-clock format used in chat and health responses.
pub(crate) const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
