use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoDiscount {
    pub code: String,
    pub multiplier: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedCharge {
    pub list_price: Decimal,
    pub amount: Decimal,
    pub promo: Option<PromoDiscount>,
}

/// Case-insensitive promo codes mapped to a multiplier on the list price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromoCatalog {
    codes: BTreeMap<String, Decimal>,
}

impl Default for PromoCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl PromoCatalog {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let codes = codes
            .into_iter()
            .map(|(code, multiplier)| (normalize(code.as_ref()), multiplier))
            .collect();
        Self { codes }
    }

    pub fn standard() -> Self {
        Self::new([("стеблев", Decimal::new(5, 1)), ("шимин", Decimal::new(5, 1))])
    }

    pub fn resolve(&self, code: &str) -> Option<PromoDiscount> {
        let normalized = normalize(code);
        self.codes
            .get(&normalized)
            .map(|multiplier| PromoDiscount { code: normalized, multiplier: *multiplier })
    }

    /// Unknown or empty codes leave the price untouched and carry no promo metadata.
    pub fn apply(&self, list_price: Decimal, code: Option<&str>) -> PricedCharge {
        match code.and_then(|code| self.resolve(code)) {
            Some(promo) => PricedCharge {
                list_price,
                amount: (list_price * promo.multiplier).round_dp(2),
                promo: Some(promo),
            },
            None => PricedCharge { list_price, amount: list_price, promo: None },
        }
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::PromoCatalog;

    #[test]
    fn unknown_promo_charges_list_price() {
        let charge = PromoCatalog::standard().apply(Decimal::from(1_000), Some("doesnotexist"));

        assert_eq!(charge.amount, Decimal::from(1_000));
        assert!(charge.promo.is_none());
    }

    #[test]
    fn known_promo_is_case_insensitive() {
        let charge = PromoCatalog::standard().apply(Decimal::from(5_990), Some("  ШИМИН "));

        assert_eq!(charge.amount, Decimal::from(2_995));
        assert_eq!(charge.promo.map(|promo| promo.code), Some("шимин".to_owned()));
    }

    #[test]
    fn missing_promo_is_ignored() {
        let charge = PromoCatalog::standard().apply(Decimal::from(2_990), None);
        assert_eq!(charge.amount, charge.list_price);
    }
}
