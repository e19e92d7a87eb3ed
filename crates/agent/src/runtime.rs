use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use marketer_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use marketer_core::dialogue::{DialogueService, IncomingMessage, OutgoingMessage};
use marketer_core::domain::entitlement::UserId;
use marketer_core::domain::session::UserSession;
use marketer_db::SessionRepository;
use tokio::sync::Mutex as TurnLock;
use tracing::{error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::replies::SERVICE_ERROR;

/// Serializes turns per user and owns the load, dispatch and save cycle.
///
/// Messages from different users run concurrently. A failed turn restores the session
/// as it was before the message and drops it back to the idle stage.
pub struct DialogueRuntime {
    dispatcher: Dispatcher,
    sessions: Arc<dyn SessionRepository>,
    audit: Arc<dyn AuditSink>,
    turn_locks: Mutex<HashMap<UserId, Arc<TurnLock<()>>>>,
}

impl DialogueRuntime {
    pub fn new(
        dispatcher: Dispatcher,
        sessions: Arc<dyn SessionRepository>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { dispatcher, sessions, audit, turn_locks: Mutex::new(HashMap::new()) }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    fn turn_lock(&self, user_id: &UserId) -> Arc<TurnLock<()>> {
        let mut locks = match self.turn_locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(user_id.clone()).or_default().clone()
    }

    async fn load_session(&self, message: &IncomingMessage) -> UserSession {
        match self.sessions.load(&message.user_id).await {
            Ok(session) => session,
            Err(error) => {
                warn!(
                    event_name = "dialogue.session_load_failed",
                    correlation_id = %message.correlation_id,
                    user_id = %message.user_id,
                    error = %error,
                    "session unavailable, starting fresh"
                );
                UserSession::default()
            }
        }
    }

    async fn save_session(&self, message: &IncomingMessage, session: UserSession) {
        if let Err(error) = self.sessions.save(&message.user_id, session).await {
            warn!(
                event_name = "dialogue.session_save_failed",
                correlation_id = %message.correlation_id,
                user_id = %message.user_id,
                error = %error,
                "session could not be saved"
            );
        }
    }
}

#[async_trait]
impl DialogueService for DialogueRuntime {
    async fn handle(&self, message: IncomingMessage) -> Vec<OutgoingMessage> {
        let lock = self.turn_lock(&message.user_id);
        let _turn = lock.lock().await;

        let mut session = self.load_session(&message).await;
        let snapshot = session.clone();
        let audit = AuditContext::new(
            Some(message.user_id.clone()),
            message.correlation_id.clone(),
            "dialogue",
        );
        self.audit.emit(
            audit
                .event("dialogue.message_received", AuditCategory::Ingress, AuditOutcome::Success)
                .with_metadata("stage", session.stage.as_str())
                .with_metadata("kind", message.content.kind()),
        );
        info!(
            event_name = "dialogue.dispatch",
            correlation_id = %message.correlation_id,
            user_id = %message.user_id,
            stage = session.stage.as_str(),
            kind = message.content.kind(),
            "dispatching message"
        );

        let mut replies = Vec::new();
        match self.dispatcher.dispatch(&mut session, &message, &mut replies).await {
            Ok(()) => self.save_session(&message, session).await,
            Err(failure) => {
                let interface = failure.into_interface(message.correlation_id.clone());
                error!(
                    event_name = "dialogue.turn_failed",
                    correlation_id = %interface.correlation_id(),
                    user_id = %message.user_id,
                    error = %interface,
                    "turn failed, restoring session"
                );
                self.audit.emit(
                    audit
                        .event("dialogue.turn_failed", AuditCategory::System, AuditOutcome::Failed)
                        .with_metadata("error", interface.to_string()),
                );
                let mut restored = snapshot;
                restored.leave_flow();
                self.save_session(&message, restored).await;
                replies.push(OutgoingMessage::text(SERVICE_ERROR));
            }
        }
        replies
    }
}
