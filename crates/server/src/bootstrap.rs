use std::sync::Arc;

use axum::Router;
use marketer_agent::{
    Dispatcher, DialogueRuntime, EntitlementService, GenerationClient, GenerationError,
    OpenAiCompatibleClient,
};
use marketer_chat::{PollingRunner, ReconnectPolicy, TelegramTransport, TransportError};
use marketer_core::audit::AuditSink;
use marketer_core::config::{AppConfig, ConfigError, LoadOptions};
use marketer_core::domain::promo::PromoCatalog;
use marketer_core::domain::tariff::TariffCatalog;
use marketer_core::entitlement::EntitlementEngine;
use marketer_core::errors::ApplicationError;
use marketer_core::payments::{DisabledPaymentGateway, PaymentError, PaymentGateway};
use marketer_db::{
    connect_with_settings, migrations, DbPool, InMemorySessionRepository, SqlEntitlementRepository,
};
use thiserror::Error;
use tracing::info;

use crate::audit::TracingAuditSink;
use crate::payments::{CallbackState, YooKassaGateway};
use crate::{health, payments};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub entitlements: Arc<EntitlementService>,
    pub runtime: Arc<DialogueRuntime>,
    pub chat_runner: PollingRunner,
}

impl Application {
    /// Health probe plus the payment provider callback.
    pub fn http_router(&self) -> Router {
        health::router(self.db_pool.clone()).merge(payments::router(CallbackState::new(
            self.entitlements.clone(),
            self.config.payments.webhook_secret.clone(),
        )))
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("generation client setup failed: {0}")]
    Generation(#[source] GenerationError),
    #[error("payment gateway setup failed: {0}")]
    Payments(#[source] PaymentError),
    #[error("chat transport setup failed: {0}")]
    Transport(#[source] TransportError),
    #[error("dialogue runtime setup failed: {0}")]
    Runtime(#[source] ApplicationError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let catalog = TariffCatalog::standard();
    let engine = EntitlementEngine::new(
        catalog.clone(),
        PromoCatalog::standard(),
        chrono::Duration::days(i64::from(config.subscription.duration_days)),
    );
    let entitlements = Arc::new(EntitlementService::new(
        engine.clone(),
        Arc::new(SqlEntitlementRepository::new(db_pool.clone())),
        audit.clone(),
    ));

    let generator: Arc<dyn GenerationClient> = Arc::new(
        OpenAiCompatibleClient::from_config(&config.llm).map_err(BootstrapError::Generation)?,
    );
    let payments: Arc<dyn PaymentGateway> =
        match YooKassaGateway::from_config(&config.payments, engine).map_err(BootstrapError::Payments)? {
            Some(gateway) => Arc::new(gateway),
            None => Arc::new(DisabledPaymentGateway),
        };
    info!(
        event_name = "system.bootstrap.integrations_ready",
        correlation_id = "bootstrap",
        llm_provider = ?config.llm.provider,
        llm_model = %config.llm.model,
        payments_enabled = config.payments.enabled,
        "generation and payment clients ready"
    );

    let dispatcher = Dispatcher::new(
        entitlements.clone(),
        generator,
        payments,
        audit.clone(),
        config.llm.temperature,
    )
    .map_err(BootstrapError::Runtime)?;
    let runtime = Arc::new(DialogueRuntime::new(
        dispatcher,
        Arc::new(InMemorySessionRepository::default()),
        audit,
    ));

    let transport =
        TelegramTransport::from_config(&config.telegram).map_err(BootstrapError::Transport)?;
    let chat_runner = PollingRunner::new(
        Arc::new(transport),
        runtime.clone(),
        catalog,
        ReconnectPolicy::default(),
    );

    Ok(Application { config, db_pool, entitlements, runtime, chat_runner })
}

#[cfg(test)]
mod tests {
    use marketer_core::config::{ConfigOverrides, LoadOptions};
    use marketer_core::dialogue::{Command, DialogueService, IncomingMessage, OutgoingMessage};
    use marketer_core::domain::entitlement::UserId;

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_without_a_bot_token() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("telegram.bot_token"));
    }

    #[tokio::test]
    async fn integration_smoke_covers_schema_dialogue_and_entitlements() {
        let app = bootstrap(valid_overrides("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN ('user_entitlement', 'entitlement_history')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("expected entitlement tables after bootstrap");
        assert_eq!(table_count, 2);

        let replies = app
            .runtime
            .handle(IncomingMessage::text("9001", "smoke-1", "/start", Some(Command::Start)))
            .await;
        assert_eq!(replies.len(), 2);
        assert!(matches!(&replies[0], OutgoingMessage::Text { keyboard: Some(_), .. }));

        let user = UserId("9001".to_owned());
        assert_eq!(app.entitlements.status_label(&user).await, "Free mode");

        app.db_pool.close().await;
    }

    fn valid_overrides(database_url: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                telegram_bot_token: Some("123456:test-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }
}
