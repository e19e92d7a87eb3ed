use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Records keep at most this many prompt/answer pairs; the oldest is evicted first.
pub const HISTORY_LIMIT: usize = 20;

/// Tariff code reported for users that never paid.
pub const FREE_TARIFF: &str = "free";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageCategory {
    Text,
    Images,
    Video,
    Presentations,
}

impl UsageCategory {
    pub const METERED: [UsageCategory; 3] = [Self::Images, Self::Video, Self::Presentations];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Images => "images",
            Self::Video => "video",
            Self::Presentations => "presentations",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "images" => Some(Self::Images),
            "video" => Some(Self::Video),
            "presentations" => Some(Self::Presentations),
            _ => None,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Text => "Text requests",
            Self::Images => "Image generations",
            Self::Video => "Video scripts",
            Self::Presentations => "Presentations",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub images: u32,
    pub video: u32,
    pub presentations: u32,
}

impl UsageCounters {
    /// Text is never counted, so it always reads as zero.
    pub fn get(&self, category: UsageCategory) -> u32 {
        match category {
            UsageCategory::Text => 0,
            UsageCategory::Images => self.images,
            UsageCategory::Video => self.video,
            UsageCategory::Presentations => self.presentations,
        }
    }

    pub fn increment(&mut self, category: UsageCategory) {
        match category {
            UsageCategory::Text => {}
            UsageCategory::Images => self.images = self.images.saturating_add(1),
            UsageCategory::Video => self.video = self.video.saturating_add(1),
            UsageCategory::Presentations => {
                self.presentations = self.presentations.saturating_add(1)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Durable per-user subscription state. One record per user id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    pub user_id: UserId,
    pub username: Option<String>,
    pub tariff_code: Option<String>,
    pub subscription_expires_at: Option<DateTime<Utc>>,
    pub usage: UsageCounters,
    pub history: Vec<HistoryEntry>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntitlementRecord {
    pub fn new(user_id: UserId, username: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            username,
            tariff_code: None,
            subscription_expires_at: None,
            usage: UsageCounters::default(),
            history: Vec::new(),
            last_payment_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tariff_code(&self) -> &str {
        self.tariff_code.as_deref().unwrap_or(FREE_TARIFF)
    }

    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.subscription_expires_at.map(|expires_at| expires_at > now).unwrap_or(false)
    }

    /// Whole days remaining, rounded up so that the last partial day still counts.
    pub fn days_left(&self, now: DateTime<Utc>) -> i64 {
        match self.subscription_expires_at {
            Some(expires_at) if expires_at > now => {
                let seconds = (expires_at - now).num_seconds();
                (seconds + 86_399) / 86_400
            }
            _ => 0,
        }
    }

    pub fn usage(&self, category: UsageCategory) -> u32 {
        self.usage.get(category)
    }

    pub fn record_usage(&mut self, category: UsageCategory, now: DateTime<Utc>) {
        self.usage.increment(category);
        self.updated_at = now;
    }

    /// Starts a fresh subscription window. Remaining quota never rolls over.
    pub fn activate(&mut self, tariff_code: &str, duration: Duration, now: DateTime<Utc>) {
        self.tariff_code = Some(tariff_code.to_owned());
        self.subscription_expires_at = Some(now + duration);
        self.usage = UsageCounters::default();
        self.last_payment_at = Some(now);
        self.updated_at = now;
    }

    pub fn push_history(
        &mut self,
        prompt: impl Into<String>,
        answer: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.history.push(HistoryEntry {
            prompt: prompt.into(),
            answer: answer.into(),
            created_at: now,
        });
        if self.history.len() > HISTORY_LIMIT {
            let overflow = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..overflow);
        }
        self.updated_at = now;
    }

    pub fn touch_username(&mut self, username: Option<&str>) {
        if let Some(username) = username.filter(|value| !value.is_empty()) {
            self.username = Some(username.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{EntitlementRecord, UsageCategory, UserId, FREE_TARIFF, HISTORY_LIMIT};

    fn record() -> EntitlementRecord {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid timestamp");
        EntitlementRecord::new(UserId::from("42"), Some("founder".to_owned()), now)
    }

    #[test]
    fn new_record_is_free_and_inactive() {
        let record = record();
        assert_eq!(record.tariff_code(), FREE_TARIFF);
        assert!(!record.has_active_subscription(record.created_at));
        assert_eq!(record.days_left(record.created_at), 0);
        for category in UsageCategory::METERED {
            assert_eq!(record.usage(category), 0);
        }
    }

    #[test]
    fn activation_resets_usage_and_sets_window() {
        let mut record = record();
        let now = record.created_at;
        record.activate("content_studio", Duration::days(30), now);
        record.record_usage(UsageCategory::Video, now);
        record.record_usage(UsageCategory::Video, now);
        assert_eq!(record.usage(UsageCategory::Video), 2);

        let later = now + Duration::days(3);
        record.activate("content_studio", Duration::days(30), later);

        assert_eq!(record.usage(UsageCategory::Video), 0);
        assert_eq!(record.subscription_expires_at, Some(later + Duration::days(30)));
        assert_eq!(record.last_payment_at, Some(later));
        assert_eq!(record.days_left(later), 30);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let mut record = record();
        let now = record.created_at;
        record.activate("start", Duration::days(1), now);

        assert!(record.has_active_subscription(now + Duration::hours(23)));
        assert!(!record.has_active_subscription(now + Duration::days(1)));
    }

    #[test]
    fn text_usage_is_not_counted() {
        let mut record = record();
        let now = record.created_at;
        record.record_usage(UsageCategory::Text, now);
        assert_eq!(record.usage(UsageCategory::Text), 0);
    }

    #[test]
    fn history_keeps_latest_entries() {
        let mut record = record();
        let now = record.created_at;
        for index in 0..(HISTORY_LIMIT + 5) {
            record.push_history(format!("prompt-{index}"), "answer", now);
        }

        assert_eq!(record.history.len(), HISTORY_LIMIT);
        assert_eq!(record.history[0].prompt, "prompt-5");
        assert_eq!(
            record.history.last().map(|entry| entry.prompt.as_str()),
            Some("prompt-24")
        );
    }
}
