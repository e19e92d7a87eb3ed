use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row};
use tracing::{debug, warn};

use marketer_core::domain::entitlement::{
    EntitlementRecord, HistoryEntry, UsageCounters, UserId, FREE_TARIFF,
};

use super::{EntitlementRepository, RecordMutation, RepositoryError};
use crate::DbPool;

pub struct SqlEntitlementRepository {
    pool: DbPool,
}

impl SqlEntitlementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const SELECT_RECORD: &str = "SELECT
        user_id,
        username,
        tariff_code,
        subscription_expires_at,
        usage_images,
        usage_video,
        usage_presentations,
        last_payment_at,
        created_at,
        updated_at
     FROM user_entitlement
     WHERE user_id = ?";

const SELECT_HISTORY: &str = "SELECT prompt, answer, created_at
     FROM entitlement_history
     WHERE user_id = ?
     ORDER BY id ASC";

#[async_trait::async_trait]
impl EntitlementRepository for SqlEntitlementRepository {
    async fn find(&self, user_id: &UserId) -> Result<Option<EntitlementRecord>, RepositoryError> {
        let row = sqlx::query(SELECT_RECORD).bind(user_id.as_str()).fetch_optional(&self.pool).await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let history = sqlx::query(SELECT_HISTORY)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(history_from_row)
            .collect::<Result<Vec<_>, _>>()?;

        record_from_row(&row, history).map(Some)
    }

    async fn modify(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        now: DateTime<Utc>,
        mutation: RecordMutation,
    ) -> Result<EntitlementRecord, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let timestamp = now.to_rfc3339();

        // The ensure-row insert is a write, so SQLite hands this transaction the write lock
        // before anything is read.
        sqlx::query(
            "INSERT INTO user_entitlement (user_id, username, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(username)
        .bind(&timestamp)
        .bind(&timestamp)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(SELECT_RECORD).bind(user_id.as_str()).fetch_one(&mut *tx).await?;
        let history = sqlx::query(SELECT_HISTORY)
            .bind(user_id.as_str())
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(history_from_row)
            .collect::<Result<Vec<_>, _>>();

        // An unreadable row is replaced by a fresh record; the write below overwrites it.
        let mut record = match history.and_then(|history| record_from_row(&row, history)) {
            Ok(record) => record,
            Err(RepositoryError::Decode(reason)) => {
                warn!(
                    event_name = "persistence.entitlement_corrupt",
                    correlation_id = user_id.as_str(),
                    reason = %reason,
                    "entitlement row unreadable; rebuilding from defaults"
                );
                EntitlementRecord::new(user_id.clone(), username.map(str::to_owned), now)
            }
            Err(error) => return Err(error),
        };
        record.touch_username(username);
        mutation(&mut record);

        sqlx::query(
            "UPDATE user_entitlement SET
                username = ?,
                tariff_code = ?,
                subscription_expires_at = ?,
                usage_images = ?,
                usage_video = ?,
                usage_presentations = ?,
                last_payment_at = ?,
                updated_at = ?
             WHERE user_id = ?",
        )
        .bind(record.username.as_deref())
        .bind(record.tariff_code.as_deref())
        .bind(record.subscription_expires_at.map(|value| value.to_rfc3339()))
        .bind(i64::from(record.usage.images))
        .bind(i64::from(record.usage.video))
        .bind(i64::from(record.usage.presentations))
        .bind(record.last_payment_at.map(|value| value.to_rfc3339()))
        .bind(record.updated_at.to_rfc3339())
        .bind(user_id.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM entitlement_history WHERE user_id = ?")
            .bind(user_id.as_str())
            .execute(&mut *tx)
            .await?;
        for entry in &record.history {
            sqlx::query(
                "INSERT INTO entitlement_history (user_id, prompt, answer, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(user_id.as_str())
            .bind(&entry.prompt)
            .bind(&entry.answer)
            .bind(entry.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(
            event_name = "persistence.entitlement_saved",
            user_id = %user_id,
            tariff = record.tariff_code(),
            history_entries = record.history.len(),
            "entitlement record persisted"
        );
        Ok(record)
    }
}

fn record_from_row(
    row: &SqliteRow,
    history: Vec<HistoryEntry>,
) -> Result<EntitlementRecord, RepositoryError> {
    // A stored "free" is the same as no tariff at all.
    let tariff_code = row
        .try_get::<Option<String>, _>("tariff_code")?
        .filter(|code| !code.is_empty() && code != FREE_TARIFF);

    Ok(EntitlementRecord {
        user_id: UserId(row.try_get("user_id")?),
        username: row.try_get("username")?,
        tariff_code,
        subscription_expires_at: parse_optional_timestamp(
            "subscription_expires_at",
            row.try_get("subscription_expires_at")?,
        )?,
        usage: UsageCounters {
            images: parse_counter("usage_images", row.try_get("usage_images")?)?,
            video: parse_counter("usage_video", row.try_get("usage_video")?)?,
            presentations: parse_counter(
                "usage_presentations",
                row.try_get("usage_presentations")?,
            )?,
        },
        history,
        last_payment_at: parse_optional_timestamp("last_payment_at", row.try_get("last_payment_at")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn history_from_row(row: SqliteRow) -> Result<HistoryEntry, RepositoryError> {
    Ok(HistoryEntry {
        prompt: row.try_get("prompt")?,
        answer: row.try_get("answer")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

/// Missing counters read as zero.
fn parse_counter(column: &str, value: Option<i64>) -> Result<u32, RepositoryError> {
    let value = value.unwrap_or(0);
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}
