use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::domain::entitlement::UserId;
use crate::domain::tariff::TariffCatalog;

/// One-off service charges that sit next to the tariff catalog.
pub const SERVICE_AMOUNTS: [(&str, i64); 6] = [
    ("ai_marketer", 2_500),
    ("img_25", 2_500),
    ("img_50", 5_000),
    ("reels_10", 2_500),
    ("video_avatar_10", 2_500),
    ("presentation", 1_000),
];

/// List price for a payable code: catalog tariffs first, then one-off services.
pub fn amount_for(code: &str, catalog: &TariffCatalog) -> Option<Decimal> {
    if let Some(tariff) = catalog.get(code) {
        return Some(tariff.price);
    }
    SERVICE_AMOUNTS
        .iter()
        .find(|(service, _)| *service == code)
        .map(|(_, amount)| Decimal::from(*amount))
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRequest {
    pub service_code: String,
    pub user_id: UserId,
    pub promo_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub redirect_url: String,
    pub amount: Decimal,
    pub payload: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("unknown service code `{0}`")]
    UnknownService(String),
    #[error("payment provider request failed: {0}")]
    Provider(String),
    #[error("payment provider response malformed: {0}")]
    Response(String),
}

/// Creates hosted payment pages. `Ok(None)` means payments are switched off.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn build_payment(&self, request: PaymentRequest) -> Result<Option<PaymentLink>, PaymentError>;
}

#[derive(Clone, Debug, Default)]
pub struct DisabledPaymentGateway;

#[async_trait]
impl PaymentGateway for DisabledPaymentGateway {
    async fn build_payment(&self, _request: PaymentRequest) -> Result<Option<PaymentLink>, PaymentError> {
        Ok(None)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header is not valid hex")]
    Encoding,
    #[error("signing secret is empty")]
    EmptySecret,
    #[error("signature mismatch")]
    Mismatch,
}

/// Checks an HMAC-SHA256 over the raw callback body. Accepts a bare hex digest or the
/// `sha256=<hex>` form.
pub fn verify_callback_signature(secret: &str, body: &[u8], header: &str) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let digest = header.trim();
    let digest = digest.strip_prefix("sha256=").unwrap_or(digest);
    let expected = hex::decode(digest).map_err(|_| SignatureError::Encoding)?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::EmptySecret)?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

/// Produces the header value a provider would send for `body`. Used by tests and the
/// local webhook replay tooling.
pub fn sign_callback(secret: &str, body: &[u8]) -> Result<String, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::EmptySecret)?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{amount_for, sign_callback, verify_callback_signature, SignatureError};
    use crate::domain::tariff::TariffCatalog;

    #[test]
    fn amount_prefers_catalog_then_services() {
        let catalog = TariffCatalog::standard();
        let pro = catalog.get("marketing_pro").map(|tariff| tariff.price);
        assert_eq!(amount_for("marketing_pro", &catalog), pro);
        assert_eq!(amount_for("img_50", &catalog), Some(Decimal::from(5_000)));
        assert_eq!(amount_for("yacht", &catalog), None);
    }

    #[test]
    fn signature_roundtrip_accepts_prefixed_and_bare_digests() {
        let body = br#"{"event":"payment.succeeded"}"#;
        let header = sign_callback("s3cret", body).expect("sign");
        assert!(verify_callback_signature("s3cret", body, &header).is_ok());

        let bare = header.trim_start_matches("sha256=");
        assert!(verify_callback_signature("s3cret", body, bare).is_ok());
    }

    #[test]
    fn signature_rejects_tampering_and_garbage() {
        let body = br#"{"event":"payment.succeeded"}"#;
        let header = sign_callback("s3cret", body).expect("sign");

        assert_eq!(
            verify_callback_signature("s3cret", br#"{"event":"payment.canceled"}"#, &header),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(verify_callback_signature("other", body, &header), Err(SignatureError::Mismatch));
        assert_eq!(verify_callback_signature("s3cret", body, "zz"), Err(SignatureError::Encoding));
        assert_eq!(verify_callback_signature("", body, &header), Err(SignatureError::EmptySecret));
    }
}
