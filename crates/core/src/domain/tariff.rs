use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::entitlement::{EntitlementRecord, UsageCategory};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaLimit {
    Unlimited,
    Finite(u32),
}

impl QuotaLimit {
    pub fn is_exhausted_by(self, used: u32) -> bool {
        match self {
            Self::Unlimited => false,
            Self::Finite(limit) => used >= limit,
        }
    }

    pub fn remaining(self, used: u32) -> Option<u32> {
        match self {
            Self::Unlimited => None,
            Self::Finite(limit) => Some(limit.saturating_sub(used)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffLimits {
    pub images: u32,
    pub video: u32,
    pub presentations: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    pub code: String,
    pub name: String,
    pub price: Decimal,
    pub limits: TariffLimits,
    pub highlights: Vec<String>,
}

impl Tariff {
    fn new(code: &str, name: &str, price: i64, limits: TariffLimits, highlights: &[&str]) -> Self {
        Self {
            code: code.to_owned(),
            name: name.to_owned(),
            price: Decimal::from(price),
            limits,
            highlights: highlights.iter().map(|line| (*line).to_owned()).collect(),
        }
    }

    pub fn limit(&self, category: UsageCategory) -> QuotaLimit {
        match category {
            UsageCategory::Text => QuotaLimit::Unlimited,
            UsageCategory::Images => QuotaLimit::Finite(self.limits.images),
            UsageCategory::Video => QuotaLimit::Finite(self.limits.video),
            UsageCategory::Presentations => QuotaLimit::Finite(self.limits.presentations),
        }
    }

    pub fn display_price(&self) -> String {
        format!("{} RUB / month", group_thousands(self.price))
    }

    pub fn description(&self) -> String {
        let mut text = format!("Tariff \"{}\" - {}", self.name, self.display_price());
        for line in &self.highlights {
            text.push_str("\n• ");
            text.push_str(line);
        }
        text
    }
}

/// Fixed set of sellable subscriptions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TariffCatalog {
    tariffs: Vec<Tariff>,
}

impl Default for TariffCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl TariffCatalog {
    pub fn new(tariffs: Vec<Tariff>) -> Self {
        Self { tariffs }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            Tariff::new(
                "start",
                "Start",
                2_990,
                TariffLimits { images: 0, video: 0, presentations: 0 },
                &[
                    "Text-only AI marketer, available 24/7",
                    "Strategies, content plans, offers, funnels, post and ad copy",
                ],
            ),
            Tariff::new(
                "marketing_pro",
                "Marketing Pro",
                5_990,
                TariffLimits { images: 50, video: 0, presentations: 0 },
                &[
                    "Everything in \"Start\"",
                    "Up to 50 image generations (creatives, covers, banners)",
                ],
            ),
            Tariff::new(
                "content_studio",
                "Content Studio",
                13_990,
                TariffLimits { images: 80, video: 15, presentations: 3 },
                &[
                    "Everything in \"Marketing Pro\"",
                    "Up to 80 image generations",
                    "Up to 15 video scripts (Reels, Shorts, ads)",
                    "Up to 3 presentations (structure and copy)",
                ],
            ),
            Tariff::new(
                "agency",
                "Agency 360",
                59_990,
                TariffLimits { images: 200, video: 60, presentations: 10 },
                &[
                    "Everything in \"Content Studio\"",
                    "Up to 200 image generations",
                    "Up to 60 video scripts",
                    "Up to 10 presentations",
                    "Priority support",
                ],
            ),
        ])
    }

    pub fn all(&self) -> &[Tariff] {
        &self.tariffs
    }

    pub fn get(&self, code: &str) -> Option<&Tariff> {
        self.tariffs.iter().find(|tariff| tariff.code == code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// Codes outside the catalog (including "free") carry no finite limits;
    /// the subscription window alone gates them.
    pub fn limit(&self, code: &str, category: UsageCategory) -> QuotaLimit {
        self.get(code).map(|tariff| tariff.limit(category)).unwrap_or(QuotaLimit::Unlimited)
    }

    pub fn status_label(&self, record: &EntitlementRecord, now: DateTime<Utc>) -> String {
        match self.get(record.tariff_code()) {
            Some(tariff) => format!("{} (days left: {})", tariff.name, record.days_left(now)),
            None => "Free mode".to_owned(),
        }
    }

    pub fn overview(&self) -> String {
        let mut text = String::from("Choose an AI Marketer 360 tariff.");
        for tariff in &self.tariffs {
            text.push_str(&format!("\n• {} - {}", tariff.name, tariff.display_price()));
        }
        text.push_str("\n\nPayment is available through YooKassa with the buttons below.");
        text
    }
}

fn group_thousands(value: Decimal) -> String {
    let digits = value.trunc().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    grouped
}
