use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use marketer_core::domain::entitlement::{EntitlementRecord, UserId};
use marketer_core::domain::session::UserSession;

use super::{EntitlementRepository, RecordMutation, RepositoryError, SessionRepository};

#[derive(Default)]
pub struct InMemoryEntitlementRepository {
    records: RwLock<HashMap<String, EntitlementRecord>>,
}

#[async_trait::async_trait]
impl EntitlementRepository for InMemoryEntitlementRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(user_id.as_str()).cloned())
    }

    async fn modify(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        now: DateTime<Utc>,
        mutation: RecordMutation,
    ) -> Result<EntitlementRecord, RepositoryError> {
        let mut records = self.records.write().await;
        let record = records.entry(user_id.0.clone()).or_insert_with(|| {
            EntitlementRecord::new(user_id.clone(), username.map(str::to_owned), now)
        });
        record.touch_username(username);
        mutation(record);
        Ok(record.clone())
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, UserSession>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self, user_id: &UserId) -> Result<UserSession, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(user_id.as_str()).cloned().unwrap_or_default())
    }

    async fn save(&self, user_id: &UserId, session: UserSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(user_id.0.clone(), session);
        Ok(())
    }

    async fn reset(&self, user_id: &UserId) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(user_id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use marketer_core::domain::entitlement::{UsageCategory, UserId};
    use marketer_core::domain::session::{Stage, UserSession};

    use crate::repositories::{
        EntitlementRepository, InMemoryEntitlementRepository, InMemorySessionRepository,
        SessionRepository,
    };

    #[tokio::test]
    async fn in_memory_entitlement_repo_applies_mutations_in_place() {
        let repo = InMemoryEntitlementRepository::default();
        let user = UserId::from("42");
        let now = Utc::now();

        repo.modify(
            &user,
            Some("anna"),
            now,
            Box::new(move |record| record.activate("marketing_pro", Duration::days(30), now)),
        )
        .await
        .expect("activate");
        let updated = repo
            .modify(&user, None, now, Box::new(move |record| record.record_usage(UsageCategory::Images, now)))
            .await
            .expect("register");

        assert_eq!(updated.usage(UsageCategory::Images), 1);
        assert_eq!(updated.username.as_deref(), Some("anna"));
        assert_eq!(repo.find(&user).await.expect("find"), Some(updated));
    }

    #[tokio::test]
    async fn in_memory_session_repo_defaults_and_resets() {
        let repo = InMemorySessionRepository::default();
        let user = UserId::from("42");

        assert_eq!(repo.load(&user).await.expect("load"), UserSession::default());

        let session = UserSession { stage: Stage::GenImage, ..UserSession::default() };
        repo.save(&user, session.clone()).await.expect("save");
        assert_eq!(repo.load(&user).await.expect("load"), session);

        repo.reset(&user).await.expect("reset");
        assert_eq!(repo.load(&user).await.expect("load").stage, Stage::Idle);
    }
}
