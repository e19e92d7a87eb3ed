use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use marketer_core::domain::entitlement::{EntitlementRecord, UserId};
use marketer_core::domain::session::UserSession;

pub mod entitlement;
pub mod memory;

pub use entitlement::SqlEntitlementRepository;
pub use memory::{InMemoryEntitlementRepository, InMemorySessionRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Change applied to a record inside the store's read-modify-write section.
pub type RecordMutation = Box<dyn FnOnce(&mut EntitlementRecord) + Send>;

#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, RepositoryError>;

    /// Loads the record (creating a default one for unknown users), refreshes the username
    /// when one is given, applies `mutation` and persists the result atomically.
    async fn modify(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        now: DateTime<Utc>,
        mutation: RecordMutation,
    ) -> Result<EntitlementRecord, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Returns the stored session or a fresh idle one.
    async fn load(&self, user_id: &UserId) -> Result<UserSession, RepositoryError>;
    async fn save(&self, user_id: &UserId, session: UserSession) -> Result<(), RepositoryError>;
    async fn reset(&self, user_id: &UserId) -> Result<(), RepositoryError>;
}
