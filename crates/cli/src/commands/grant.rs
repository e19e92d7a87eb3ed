use chrono::{Duration, Utc};
use marketer_core::config::AppConfig;
use marketer_core::domain::entitlement::UserId;
use marketer_core::domain::promo::PromoCatalog;
use marketer_core::domain::tariff::TariffCatalog;
use marketer_core::entitlement::EntitlementEngine;
use marketer_db::{EntitlementRepository, SqlEntitlementRepository};
use serde_json::json;

use crate::commands::{with_database, CommandResult};

pub(crate) fn engine_for(config: &AppConfig) -> EntitlementEngine {
    EntitlementEngine::new(
        TariffCatalog::standard(),
        PromoCatalog::standard(),
        Duration::days(i64::from(config.subscription.duration_days)),
    )
}

/// Activates a catalog tariff for a user, as a confirmed payment would.
pub fn run(user_id: &str, tariff_code: &str) -> CommandResult {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return CommandResult::failure("grant", "invalid_argument", "user id must not be empty", 6);
    }
    if !TariffCatalog::standard().contains(tariff_code) {
        let catalog = TariffCatalog::standard();
        let known: Vec<&str> =
            catalog.all().iter().map(|tariff| tariff.code.as_str()).collect();
        return CommandResult::failure(
            "grant",
            "invalid_argument",
            format!("unknown tariff `{tariff_code}`; expected one of: {}", known.join(", ")),
            6,
        );
    }

    let user = UserId(user_id.to_owned());
    let code = tariff_code.to_owned();
    let outcome = with_database("grant", |config, pool| async move {
        let engine = engine_for(&config);
        let repository = SqlEntitlementRepository::new(pool);
        let record = repository
            .modify(
                &user,
                None,
                Utc::now(),
                Box::new(move |record| {
                    let now = Utc::now();
                    let _ = engine.activate_catalog_tariff(record, &code, now);
                }),
            )
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        Ok(record)
    });

    match outcome {
        Ok(record) => CommandResult::success_with_data(
            "grant",
            format!("activated `{tariff_code}` for user {user_id}"),
            Some(json!({
                "user_id": record.user_id.as_str(),
                "tariff": record.tariff_code(),
                "expires_at": record.subscription_expires_at.map(|expires_at| expires_at.to_rfc3339()),
            })),
        ),
        Err(failure) => failure,
    }
}
