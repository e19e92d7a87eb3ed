use chrono::Utc;
use marketer_core::domain::entitlement::{EntitlementRecord, UserId};
use marketer_db::{EntitlementRepository, SqlEntitlementRepository};
use serde_json::json;

use crate::commands::grant::engine_for;
use crate::commands::{with_database, CommandResult};

pub fn run(user_id: &str) -> CommandResult {
    let user = UserId(user_id.trim().to_owned());
    let outcome = with_database("status", |config, pool| async move {
        let repository = SqlEntitlementRepository::new(pool);
        let record = repository
            .find(&user)
            .await
            .map_err(|error| ("persistence", error.to_string(), 4u8))?;
        let known = record.is_some();
        let record = record.unwrap_or_else(|| EntitlementRecord::new(user, None, Utc::now()));
        let label = engine_for(&config).status_label(&record, Utc::now());
        Ok((record, known, label))
    });

    match outcome {
        Ok((record, known, label)) => CommandResult::success_with_data(
            "status",
            label.clone(),
            Some(json!({
                "user_id": record.user_id.as_str(),
                "known": known,
                "tariff": record.tariff_code(),
                "status_label": label,
                "expires_at": record.subscription_expires_at.map(|expires_at| expires_at.to_rfc3339()),
                "usage": record.usage,
                "history_entries": record.history.len(),
            })),
        ),
        Err(failure) => failure,
    }
}
