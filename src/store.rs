//! Backend contract shared by the durable and in-memory user stores.

use crate::models::{ScoreUpdate, UserRecord};
use async_trait::async_trait;
use std::fmt;

/// Storage failure, split by blast radius.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend cannot be reached (connect, I/O, pool exhaustion, timeout).
    Unavailable(String),
    /// A single query failed; the backend itself is presumed healthy.
    Query(String),
}

impl StoreError {
    pub fn is_connection_level(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {}", msg),
            StoreError::Query(msg) => write!(f, "Store query failed: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Query(err.to_string()),
        }
    }
}

/// Per-user score storage.
///
/// Every mutating call is atomic per user id: either the whole update is
/// persisted (with derived fields recomputed) or nothing is.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Upsert: creates the record if absent, otherwise merges it in.
    async fn save_user(&self, record: &UserRecord) -> Result<UserRecord, StoreError>;

    /// Applies `update` to the user's record, creating it on first write.
    async fn apply_update(&self, id: &str, update: &ScoreUpdate)
        -> Result<UserRecord, StoreError>;

    async fn all_users(&self) -> Result<Vec<UserRecord>, StoreError>;
}
