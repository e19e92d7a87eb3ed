use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use marketer_agent::EntitlementService;
use marketer_core::audit::AuditContext;
use marketer_core::config::PaymentsConfig;
use marketer_core::domain::entitlement::UserId;
use marketer_core::entitlement::EntitlementEngine;
use marketer_core::errors::{ApplicationError, DomainError};
use marketer_core::payments::{
    amount_for, verify_callback_signature, PaymentError, PaymentGateway, PaymentLink,
    PaymentRequest,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

pub const SIGNATURE_HEADER: &str = "x-marketer-signature";
const SUCCEEDED_EVENT: &str = "payment.succeeded";
const PROVIDER_TIMEOUT_SECS: u64 = 20;

/// Hosted-checkout client for YooKassa.
pub struct YooKassaGateway {
    http: reqwest::Client,
    api_base_url: String,
    shop_id: String,
    api_key: SecretString,
    return_url: String,
    currency: String,
    engine: EntitlementEngine,
}

#[derive(Deserialize)]
struct CreatedPayment {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    confirmation: Option<Confirmation>,
}

#[derive(Deserialize)]
struct Confirmation {
    #[serde(default)]
    confirmation_url: Option<String>,
}

impl YooKassaGateway {
    /// `Ok(None)` when payments are switched off or credentials are incomplete.
    pub fn from_config(
        config: &PaymentsConfig,
        engine: EntitlementEngine,
    ) -> Result<Option<Self>, PaymentError> {
        if !config.enabled {
            return Ok(None);
        }
        let (Some(shop_id), Some(api_key), Some(return_url)) =
            (config.shop_id.clone(), config.api_key.clone(), config.return_url.clone())
        else {
            return Ok(None);
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|error| PaymentError::Provider(error.to_string()))?;

        Ok(Some(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            shop_id,
            api_key,
            return_url,
            currency: config.currency.clone(),
            engine,
        }))
    }

    fn description(&self, service_code: &str) -> String {
        match self.engine.catalog().get(service_code) {
            Some(tariff) => format!("AI Marketer 360: tariff {}", tariff.name),
            None => format!("AI Marketer 360: {service_code}"),
        }
    }
}

/// Provider request body. Promo metadata is present only for codes that resolved.
pub fn payment_payload(
    request: &PaymentRequest,
    amount: Decimal,
    promo_code: Option<&str>,
    currency: &str,
    return_url: &str,
    description: &str,
) -> Value {
    let mut metadata = json!({
        "service_code": request.service_code,
        "user_id": request.user_id.as_str(),
    });
    if let Some(promo_code) = promo_code {
        metadata["promo_code"] = json!(promo_code);
    }

    json!({
        "amount": { "value": format_amount(amount), "currency": currency },
        "capture": true,
        "confirmation": { "type": "redirect", "return_url": return_url },
        "description": description,
        "metadata": metadata,
    })
}

fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

#[async_trait]
impl PaymentGateway for YooKassaGateway {
    async fn build_payment(
        &self,
        request: PaymentRequest,
    ) -> Result<Option<PaymentLink>, PaymentError> {
        let Some(list_price) = amount_for(&request.service_code, self.engine.catalog()) else {
            warn!(
                event_name = "payment.unknown_service",
                service_code = %request.service_code,
                "payment requested for unknown service code"
            );
            return Ok(None);
        };

        let charge = self.engine.price_with_promo(list_price, request.promo_code.as_deref());
        let payload = payment_payload(
            &request,
            charge.amount,
            charge.promo.as_ref().map(|promo| promo.code.as_str()),
            &self.currency,
            &self.return_url,
            &self.description(&request.service_code),
        );

        let response = self
            .http
            .post(format!("{}/payments", self.api_base_url))
            .basic_auth(&self.shop_id, Some(self.api_key.expose_secret()))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&payload)
            .send()
            .await
            .map_err(|error| PaymentError::Provider(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Provider(format!("status {status}: {body}")));
        }

        let created: CreatedPayment =
            response.json().await.map_err(|error| PaymentError::Response(error.to_string()))?;
        let redirect_url = created
            .confirmation
            .and_then(|confirmation| confirmation.confirmation_url)
            .ok_or_else(|| PaymentError::Response("missing confirmation_url".to_owned()))?;

        info!(
            event_name = "payment.provider_created",
            payment_id = created.id.as_deref().unwrap_or("unknown"),
            service_code = %request.service_code,
            amount = %charge.amount,
            "payment created at provider"
        );
        Ok(Some(PaymentLink { redirect_url, amount: charge.amount, payload }))
    }
}

#[derive(Clone)]
pub struct CallbackState {
    entitlements: Arc<EntitlementService>,
    webhook_secret: Option<SecretString>,
}

impl CallbackState {
    pub fn new(entitlements: Arc<EntitlementService>, webhook_secret: Option<SecretString>) -> Self {
        Self { entitlements, webhook_secret }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentNotification {
    pub event: String,
    pub object: NotificationObject,
}

#[derive(Debug, Deserialize)]
pub struct NotificationObject {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: NotificationMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationMetadata {
    #[serde(default)]
    pub service_code: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackError {
    pub error: String,
}

type CallbackResult = Result<(StatusCode, Json<CallbackResponse>), (StatusCode, Json<CallbackError>)>;

pub fn router(state: CallbackState) -> Router {
    Router::new().route("/payments/callback", post(payment_callback)).with_state(state)
}

fn reject(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<CallbackError>) {
    (status, Json(CallbackError { error: error.into() }))
}

fn ignored() -> (StatusCode, Json<CallbackResponse>) {
    (
        StatusCode::OK,
        Json(CallbackResponse { status: "ignored".to_owned(), tariff: None, expires_at: None }),
    )
}

/// Activates the paid tariff once the provider reports success.
///
/// The body must carry a valid HMAC-SHA256 signature. Non-success events and one-off
/// services are acknowledged without side effects.
pub async fn payment_callback(
    State(state): State<CallbackState>,
    headers: HeaderMap,
    body: Bytes,
) -> CallbackResult {
    let Some(secret) = state.webhook_secret.as_ref() else {
        warn!(
            event_name = "payment.callback_unconfigured",
            correlation_id = "payment-callback",
            "payment callback without webhook secret"
        );
        return Err(reject(StatusCode::SERVICE_UNAVAILABLE, "payment callbacks are not configured"));
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| reject(StatusCode::UNAUTHORIZED, format!("missing `{SIGNATURE_HEADER}` header")))?;
    if let Err(error) = verify_callback_signature(secret.expose_secret(), &body, signature) {
        warn!(
            event_name = "payment.callback_rejected",
            correlation_id = "payment-callback",
            error = %error,
            "payment callback signature rejected"
        );
        return Err(reject(StatusCode::UNAUTHORIZED, error.to_string()));
    }

    let notification: PaymentNotification = serde_json::from_slice(&body).map_err(|error| {
        reject(StatusCode::BAD_REQUEST, format!("invalid payment notification: {error}"))
    })?;
    if notification.event != SUCCEEDED_EVENT {
        info!(
            event_name = "payment.callback_ignored",
            correlation_id = "payment-callback",
            event = %notification.event,
            "ignoring payment event"
        );
        return Ok(ignored());
    }

    let (Some(user_id), Some(service_code)) =
        (notification.object.metadata.user_id, notification.object.metadata.service_code)
    else {
        return Err(reject(StatusCode::BAD_REQUEST, "payment metadata lacks user_id or service_code"));
    };

    let correlation_id = notification
        .object
        .id
        .unwrap_or_else(|| format!("callback-{}", Uuid::new_v4().simple()));
    let user_id = UserId(user_id);
    let audit = AuditContext::new(Some(user_id.clone()), correlation_id, "payment-callback");

    match state.entitlements.activate_tariff(&user_id, None, &service_code, &audit).await {
        Ok(record) => Ok((
            StatusCode::OK,
            Json(CallbackResponse {
                status: "activated".to_owned(),
                tariff: Some(service_code),
                expires_at: record.subscription_expires_at.map(|expires_at| expires_at.to_rfc3339()),
            }),
        )),
        Err(ApplicationError::Domain(DomainError::UnknownTariff(code))) => {
            info!(
                event_name = "payment.callback_one_off",
                correlation_id = %audit.correlation_id,
                service_code = %code,
                "one-off service paid; nothing to activate"
            );
            Ok(ignored())
        }
        Err(error) => {
            warn!(
                event_name = "payment.callback_failed",
                correlation_id = %audit.correlation_id,
                error = %error,
                "tariff activation failed"
            );
            Err(reject(StatusCode::SERVICE_UNAVAILABLE, "tariff activation failed, retry later"))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use marketer_agent::EntitlementService;
    use marketer_core::audit::InMemoryAuditSink;
    use marketer_core::domain::entitlement::UserId;
    use marketer_core::entitlement::EntitlementEngine;
    use marketer_core::payments::{sign_callback, PaymentRequest};
    use marketer_db::{EntitlementRepository, InMemoryEntitlementRepository};
    use rust_decimal::Decimal;
    use serde_json::json;
    use tower::ServiceExt;

    use super::{payment_payload, router, CallbackResponse, CallbackState, SIGNATURE_HEADER};

    const SECRET: &str = "hook-secret";

    fn setup() -> (axum::Router, Arc<InMemoryEntitlementRepository>) {
        let repository = Arc::new(InMemoryEntitlementRepository::default());
        let service = EntitlementService::new(
            EntitlementEngine::default(),
            repository.clone(),
            Arc::new(InMemoryAuditSink::default()),
        );
        let state = CallbackState::new(Arc::new(service), Some(SECRET.to_owned().into()));
        (router(state), repository)
    }

    fn signed_request(body: &str, secret: &str) -> Request<Body> {
        let signature = sign_callback(secret, body.as_bytes()).expect("sign");
        Request::builder()
            .method("POST")
            .uri("/payments/callback")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    fn succeeded(service_code: &str) -> String {
        json!({
            "type": "notification",
            "event": "payment.succeeded",
            "object": {
                "id": "pay-1",
                "status": "succeeded",
                "metadata": { "service_code": service_code, "user_id": "4242" }
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn signed_success_activates_the_tariff() {
        let (app, repository) = setup();

        let response =
            app.oneshot(signed_request(&succeeded("marketing_pro"), SECRET)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 64 * 1024).await.expect("body");
        let payload: CallbackResponse = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.status, "activated");
        assert_eq!(payload.tariff.as_deref(), Some("marketing_pro"));

        let record = repository
            .find(&UserId("4242".to_owned()))
            .await
            .expect("lookup")
            .expect("record created");
        assert_eq!(record.tariff_code(), "marketing_pro");
        assert!(record.subscription_expires_at.is_some_and(|expires_at| expires_at > Utc::now()));
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_without_activation() {
        let (app, repository) = setup();

        let response =
            app.oneshot(signed_request(&succeeded("agency"), "wrong-secret")).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(repository.find(&UserId("4242".to_owned())).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn one_off_services_and_other_events_are_ignored() {
        let (app, repository) = setup();

        let response =
            app.clone().oneshot(signed_request(&succeeded("img_50"), SECRET)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let canceled = json!({
            "event": "payment.canceled",
            "object": { "metadata": { "service_code": "agency", "user_id": "4242" } }
        })
        .to_string();
        let response = app.oneshot(signed_request(&canceled, SECRET)).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        assert!(repository.find(&UserId("4242".to_owned())).await.expect("lookup").is_none());
    }

    #[tokio::test]
    async fn missing_secret_disables_the_callback() {
        let service = EntitlementService::new(
            EntitlementEngine::default(),
            Arc::new(InMemoryEntitlementRepository::default()),
            Arc::new(InMemoryAuditSink::default()),
        );
        let app = router(CallbackState::new(Arc::new(service), None));

        let response = app.oneshot(signed_request(&succeeded("start"), SECRET)).await.expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn payload_carries_amount_metadata_and_redirect() {
        let request = PaymentRequest {
            service_code: "presentation".to_owned(),
            user_id: UserId("7".to_owned()),
            promo_code: Some("doesnotexist".to_owned()),
        };

        let payload = payment_payload(
            &request,
            Decimal::from(1_000),
            None,
            "RUB",
            "https://t.me/marketer_bot",
            "AI Marketer 360: presentation",
        );

        assert_eq!(payload["amount"], json!({ "value": "1000.00", "currency": "RUB" }));
        assert_eq!(payload["capture"], json!(true));
        assert_eq!(payload["confirmation"]["type"], json!("redirect"));
        assert_eq!(payload["metadata"]["service_code"], json!("presentation"));
        assert!(payload["metadata"].get("promo_code").is_none());

        let discounted = payment_payload(
            &request,
            Decimal::new(125_050, 2),
            Some("шимин"),
            "RUB",
            "https://t.me/marketer_bot",
            "x",
        );
        assert_eq!(discounted["amount"]["value"], json!("1250.50"));
        assert_eq!(discounted["metadata"]["promo_code"], json!("шимин"));
    }
}
