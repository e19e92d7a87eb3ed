use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::domain::entitlement::{EntitlementRecord, UsageCategory};
use crate::domain::promo::{PricedCharge, PromoCatalog, PromoDiscount};
use crate::domain::tariff::{QuotaLimit, TariffCatalog};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DenialReason {
    NoActiveSubscription,
    QuotaExhausted { category: UsageCategory, limit: u32, used: u32 },
}

impl DenialReason {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoActiveSubscription => "no_active_subscription",
            Self::QuotaExhausted { .. } => "quota_exhausted",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NoActiveSubscription => {
                "You don't have an active subscription. Pick a tariff to use this section."
            }
            Self::QuotaExhausted { .. } => {
                "Your tariff limit for this section is used up. Upgrade or renew your subscription to continue."
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Pure decision logic over entitlement records. Persistence is the caller's concern.
#[derive(Clone, Debug)]
pub struct EntitlementEngine {
    catalog: TariffCatalog,
    promos: PromoCatalog,
    default_duration: Duration,
}

impl Default for EntitlementEngine {
    fn default() -> Self {
        Self::new(TariffCatalog::standard(), PromoCatalog::standard(), Duration::days(30))
    }
}

impl EntitlementEngine {
    pub fn new(catalog: TariffCatalog, promos: PromoCatalog, default_duration: Duration) -> Self {
        Self { catalog, promos, default_duration }
    }

    pub fn catalog(&self) -> &TariffCatalog {
        &self.catalog
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    pub fn limit(&self, record: &EntitlementRecord, category: UsageCategory) -> QuotaLimit {
        self.catalog.limit(record.tariff_code(), category)
    }

    pub fn check_access(
        &self,
        record: &EntitlementRecord,
        category: UsageCategory,
        now: DateTime<Utc>,
    ) -> AccessDecision {
        if !record.has_active_subscription(now) {
            return AccessDecision::Denied(DenialReason::NoActiveSubscription);
        }

        let used = record.usage(category);
        match self.limit(record, category) {
            QuotaLimit::Finite(limit) if used >= limit => {
                AccessDecision::Denied(DenialReason::QuotaExhausted { category, limit, used })
            }
            _ => AccessDecision::Allowed,
        }
    }

    /// Unconditional increment. Callers only reach this after an allowed check and a
    /// successful generation.
    pub fn register_usage(
        &self,
        record: &mut EntitlementRecord,
        category: UsageCategory,
        now: DateTime<Utc>,
    ) {
        record.record_usage(category, now);
    }

    pub fn activate_tariff(
        &self,
        record: &mut EntitlementRecord,
        tariff_code: &str,
        duration: Duration,
        now: DateTime<Utc>,
    ) {
        record.activate(tariff_code, duration, now);
    }

    /// Activation entry point for paid and operator grants, restricted to sellable tariffs.
    pub fn activate_catalog_tariff(
        &self,
        record: &mut EntitlementRecord,
        tariff_code: &str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if !self.catalog.contains(tariff_code) {
            return Err(DomainError::UnknownTariff(tariff_code.to_owned()));
        }
        self.activate_tariff(record, tariff_code, self.default_duration, now);
        Ok(())
    }

    pub fn price_with_promo(&self, list_price: Decimal, promo_code: Option<&str>) -> PricedCharge {
        self.promos.apply(list_price, promo_code)
    }

    pub fn resolve_promo(&self, promo_code: &str) -> Option<PromoDiscount> {
        self.promos.resolve(promo_code)
    }

    pub fn status_label(&self, record: &EntitlementRecord, now: DateTime<Utc>) -> String {
        self.catalog.status_label(record, now)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use super::{AccessDecision, DenialReason, EntitlementEngine};
    use crate::domain::entitlement::{EntitlementRecord, UsageCategory, UserId};
    use crate::errors::DomainError;

    fn fresh_record() -> EntitlementRecord {
        EntitlementRecord::new(UserId::from("500"), None, Utc::now())
    }

    #[test]
    fn unknown_user_is_denied_without_subscription() {
        let engine = EntitlementEngine::default();
        let decision = engine.check_access(&fresh_record(), UsageCategory::Text, Utc::now());

        assert_eq!(decision, AccessDecision::Denied(DenialReason::NoActiveSubscription));
    }

    #[test]
    fn pro_activation_allows_and_counts_usage() {
        let engine = EntitlementEngine::default();
        let now = Utc::now();
        let mut record = fresh_record();

        engine.activate_tariff(&mut record, "pro", Duration::days(30), now);
        assert!(engine.check_access(&record, UsageCategory::Images, now).is_allowed());

        engine.register_usage(&mut record, UsageCategory::Images, now);
        assert_eq!(record.usage(UsageCategory::Images), 1);
        assert_eq!(record.subscription_expires_at, Some(now + Duration::days(30)));
    }

    #[test]
    fn finite_quota_is_exhausted_after_limit_registrations() {
        let engine = EntitlementEngine::default();
        let now = Utc::now();
        let mut record = fresh_record();
        engine.activate_tariff(&mut record, "content_studio", Duration::days(30), now);

        for _ in 0..3 {
            assert!(engine.check_access(&record, UsageCategory::Presentations, now).is_allowed());
            engine.register_usage(&mut record, UsageCategory::Presentations, now);
        }

        let decision = engine.check_access(&record, UsageCategory::Presentations, now);
        assert!(matches!(
            decision,
            AccessDecision::Denied(DenialReason::QuotaExhausted { limit: 3, used: 3, .. })
        ));
        assert!(engine.check_access(&record, UsageCategory::Text, now).is_allowed());
        assert!(engine.check_access(&record, UsageCategory::Images, now).is_allowed());
    }

    #[test]
    fn zero_limit_denies_immediately() {
        let engine = EntitlementEngine::default();
        let now = Utc::now();
        let mut record = fresh_record();
        engine.activate_tariff(&mut record, "start", Duration::days(30), now);

        let decision = engine.check_access(&record, UsageCategory::Video, now);
        assert_eq!(
            decision.clone(),
            AccessDecision::Denied(DenialReason::QuotaExhausted {
                category: UsageCategory::Video,
                limit: 0,
                used: 0,
            })
        );
        if let AccessDecision::Denied(reason) = decision {
            assert_eq!(reason.reason_code(), "quota_exhausted");
        }
    }

    #[test]
    fn expired_subscription_is_denied() {
        let engine = EntitlementEngine::default();
        let now = Utc::now();
        let mut record = fresh_record();
        engine.activate_tariff(&mut record, "agency", Duration::days(30), now - Duration::days(31));

        assert_eq!(
            engine.check_access(&record, UsageCategory::Text, now),
            AccessDecision::Denied(DenialReason::NoActiveSubscription)
        );
    }

    #[test]
    fn reactivation_resets_usage_without_rollover() {
        let engine = EntitlementEngine::default();
        let now = Utc::now();
        let mut record = fresh_record();
        engine.activate_tariff(&mut record, "marketing_pro", Duration::days(30), now);
        engine.register_usage(&mut record, UsageCategory::Images, now);

        let later = now + Duration::days(10);
        engine.activate_tariff(&mut record, "marketing_pro", Duration::days(30), later);

        assert_eq!(record.usage(UsageCategory::Images), 0);
        assert_eq!(record.subscription_expires_at, Some(later + Duration::days(30)));
    }

    #[test]
    fn catalog_activation_rejects_unknown_codes() {
        let engine = EntitlementEngine::default();
        let mut record = fresh_record();

        let error = engine
            .activate_catalog_tariff(&mut record, "pro", Utc::now())
            .expect_err("pro is not sellable");
        assert_eq!(error, DomainError::UnknownTariff("pro".to_owned()));
        assert!(record.tariff_code.is_none());
    }

    #[test]
    fn promo_pricing_is_delegated() {
        let engine = EntitlementEngine::default();
        let charge = engine.price_with_promo(Decimal::from(1_000), Some("doesnotexist"));
        assert_eq!(charge.amount, Decimal::from(1_000));
        assert!(charge.promo.is_none());
    }
}
