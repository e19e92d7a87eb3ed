use std::sync::Arc;

use chrono::Utc;
use marketer_core::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use marketer_core::domain::entitlement::{EntitlementRecord, UsageCategory, UserId};
use marketer_core::entitlement::{AccessDecision, EntitlementEngine};
use marketer_core::errors::{ApplicationError, DomainError};
use marketer_db::EntitlementRepository;
use tracing::{info, warn};

/// Entitlement decisions over the durable store.
///
/// Read failures degrade to a default record so a broken store denies gated features
/// instead of failing the whole turn.
pub struct EntitlementService {
    engine: EntitlementEngine,
    repository: Arc<dyn EntitlementRepository>,
    audit: Arc<dyn AuditSink>,
}

impl EntitlementService {
    pub fn new(
        engine: EntitlementEngine,
        repository: Arc<dyn EntitlementRepository>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { engine, repository, audit }
    }

    pub fn engine(&self) -> &EntitlementEngine {
        &self.engine
    }

    pub async fn record(&self, user_id: &UserId, username: Option<&str>) -> EntitlementRecord {
        match self.repository.find(user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => EntitlementRecord::new(user_id.clone(), username.map(str::to_owned), Utc::now()),
            Err(error) => {
                warn!(
                    event_name = "entitlement.load_failed",
                    user_id = %user_id,
                    error = %error,
                    "entitlement record unavailable, using defaults"
                );
                EntitlementRecord::new(user_id.clone(), username.map(str::to_owned), Utc::now())
            }
        }
    }

    pub async fn status_label(&self, user_id: &UserId) -> String {
        let record = self.record(user_id, None).await;
        self.engine.status_label(&record, Utc::now())
    }

    pub async fn check_access(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        category: UsageCategory,
        audit: &AuditContext,
    ) -> (AccessDecision, EntitlementRecord) {
        let record = self.record(user_id, username).await;
        let decision = self.engine.check_access(&record, category, Utc::now());

        info!(
            event_name = "entitlement.access_checked",
            correlation_id = %audit.correlation_id,
            user_id = %user_id,
            category = category.as_str(),
            allowed = decision.is_allowed(),
            "entitlement access checked"
        );
        if let AccessDecision::Denied(reason) = &decision {
            self.audit.emit(
                audit
                    .event("entitlement.access_denied", AuditCategory::Entitlement, AuditOutcome::Rejected)
                    .with_metadata("category", category.as_str())
                    .with_metadata("reason", reason.reason_code())
                    .with_metadata("tariff", record.tariff_code()),
            );
        }
        (decision, record)
    }

    /// Counts one delivered generation. Text is never metered.
    pub async fn register_usage(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        category: UsageCategory,
        audit: &AuditContext,
    ) {
        if category == UsageCategory::Text {
            return;
        }
        let engine = self.engine.clone();
        let result = self
            .repository
            .modify(
                user_id,
                username,
                Utc::now(),
                Box::new(move |record| engine.register_usage(record, category, Utc::now())),
            )
            .await;

        match result {
            Ok(record) => {
                info!(
                    event_name = "entitlement.usage_registered",
                    correlation_id = %audit.correlation_id,
                    user_id = %user_id,
                    category = category.as_str(),
                    used = record.usage(category),
                    "usage registered"
                );
                self.audit.emit(
                    audit
                        .event("entitlement.usage_registered", AuditCategory::Entitlement, AuditOutcome::Success)
                        .with_metadata("category", category.as_str())
                        .with_metadata("used", record.usage(category).to_string()),
                );
            }
            Err(error) => {
                warn!(
                    event_name = "entitlement.usage_register_failed",
                    correlation_id = %audit.correlation_id,
                    user_id = %user_id,
                    error = %error,
                    "usage registration failed"
                );
                self.audit.emit(
                    audit
                        .event("entitlement.usage_register_failed", AuditCategory::Persistence, AuditOutcome::Failed)
                        .with_metadata("category", category.as_str()),
                );
            }
        }
    }

    /// Best-effort interaction history append.
    pub async fn append_history(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        prompt: &str,
        answer: &str,
    ) {
        let prompt = prompt.to_owned();
        let answer = answer.to_owned();
        let result = self
            .repository
            .modify(
                user_id,
                username,
                Utc::now(),
                Box::new(move |record| record.push_history(prompt, answer, Utc::now())),
            )
            .await;
        if let Err(error) = result {
            warn!(
                event_name = "entitlement.history_append_failed",
                user_id = %user_id,
                error = %error,
                "history append failed"
            );
        }
    }

    /// Activates a sellable tariff for the configured subscription window.
    pub async fn activate_tariff(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        tariff_code: &str,
        audit: &AuditContext,
    ) -> Result<EntitlementRecord, ApplicationError> {
        if !self.engine.catalog().contains(tariff_code) {
            self.audit.emit(
                audit
                    .event("entitlement.activation_rejected", AuditCategory::Entitlement, AuditOutcome::Rejected)
                    .with_metadata("tariff", tariff_code),
            );
            return Err(DomainError::UnknownTariff(tariff_code.to_owned()).into());
        }

        let engine = self.engine.clone();
        let code = tariff_code.to_owned();
        let record = self
            .repository
            .modify(
                user_id,
                username,
                Utc::now(),
                Box::new(move |record| {
                    let duration = engine.default_duration();
                    engine.activate_tariff(record, &code, duration, Utc::now());
                }),
            )
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        info!(
            event_name = "entitlement.tariff_activated",
            correlation_id = %audit.correlation_id,
            user_id = %user_id,
            tariff = tariff_code,
            expires_at = ?record.subscription_expires_at,
            "tariff activated"
        );
        self.audit.emit(
            audit
                .event("entitlement.tariff_activated", AuditCategory::Entitlement, AuditOutcome::Success)
                .with_metadata("tariff", tariff_code),
        );
        Ok(record)
    }
}
