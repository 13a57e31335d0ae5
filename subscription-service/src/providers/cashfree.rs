//! Cashfree webhook verification and event mapping.
//!
//! Unlike Stripe, Cashfree does not sign the raw body. The
//! `x-webhook-signature` header is base64(HMAC-SHA256) over the
//! concatenation of order id, order amount, reference id, payment status,
//! payment mode and payment time. The header must be present before any
//! parsing happens; the digest itself can only be checked after the payload
//! fields are available.

use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use serde_json::Value;
use service_core::error::AppError;
use service_core::utils::signature;

use crate::config::CashfreeConfig;
use crate::services::dispatcher::LifecycleEvent;

/// Closed set of Cashfree payment event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CashfreeEventKind {
    PaymentSuccess,
    PaymentFailed,
    UserDropped,
    Unrecognized(String),
}

impl CashfreeEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "PAYMENT_SUCCESS_WEBHOOK" => CashfreeEventKind::PaymentSuccess,
            "PAYMENT_FAILED_WEBHOOK" => CashfreeEventKind::PaymentFailed,
            "PAYMENT_USER_DROPPED_WEBHOOK" => CashfreeEventKind::UserDropped,
            other => CashfreeEventKind::Unrecognized(other.to_string()),
        }
    }
}

/// Cashfree webhook payload: `{type, data: {order, payment, customer_details}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct CashfreePayload {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: CashfreeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashfreeData {
    pub order: CashfreeOrder,
    pub payment: CashfreePayment,
    #[serde(default)]
    pub customer_details: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashfreeOrder {
    pub order_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub order_amount: String,
    #[serde(default)]
    pub order_currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashfreePayment {
    #[serde(deserialize_with = "string_or_number")]
    pub cf_payment_id: String,
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub reference_id: Option<String>,
    pub payment_status: String,
    pub payment_mode: String,
    pub payment_time: String,
    #[serde(default)]
    pub payment_message: Option<String>,
}

impl CashfreePayload {
    pub fn kind(&self) -> CashfreeEventKind {
        CashfreeEventKind::from_type(&self.event_type)
    }

    /// Concatenated fields the provider signs, in wire order.
    pub fn signature_payload(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            self.data.order.order_id,
            self.data.order.order_amount,
            self.data.payment.reference_id.as_deref().unwrap_or(""),
            self.data.payment.payment_status,
            self.data.payment.payment_mode,
            self.data.payment.payment_time,
        )
    }

    /// Map this payload to a lifecycle transition.
    pub fn into_lifecycle(self) -> LifecycleEvent {
        let order_id = self.data.order.order_id.clone();
        let payment_id = self.data.payment.cf_payment_id.clone();
        match self.kind() {
            CashfreeEventKind::PaymentSuccess => LifecycleEvent::PaymentSucceeded {
                order_id,
                payment_id,
            },
            CashfreeEventKind::PaymentFailed => LifecycleEvent::PaymentFailed {
                order_id,
                payment_id: Some(payment_id),
                reason: self.data.payment.payment_message.clone(),
            },
            CashfreeEventKind::UserDropped => LifecycleEvent::CheckoutDropped { order_id },
            CashfreeEventKind::Unrecognized(event_type) => LifecycleEvent::Unrecognized {
                provider: "cashfree",
                event_type,
            },
        }
    }
}

/// Verifier for Cashfree webhook deliveries.
#[derive(Clone)]
pub struct CashfreeWebhook {
    secret: Secret<String>,
}

impl CashfreeWebhook {
    pub fn new(config: &CashfreeConfig) -> Self {
        Self {
            secret: config.webhook_secret.clone(),
        }
    }

    /// Parse the body. Malformed JSON is a client error, distinct from the
    /// signature check which runs afterwards on the parsed fields.
    pub fn parse(&self, body: &str) -> Result<CashfreePayload, AppError> {
        serde_json::from_str(body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Cashfree webhook payload");
            AppError::BadRequest(anyhow::anyhow!("Invalid JSON payload"))
        })
    }

    /// Verify the supplied digest against the payload's signed fields.
    pub fn verify(&self, payload: &CashfreePayload, supplied: &str) -> Result<(), AppError> {
        let data = payload.signature_payload();
        let valid = signature::verify_base64(self.secret.expose_secret(), &data, supplied)
            .map_err(|e| {
                tracing::error!(error = %e, "Cashfree signature computation failed");
                AppError::InternalError(anyhow::anyhow!("Signature verification failed"))
            })?;

        if !valid {
            tracing::warn!(
                order_id = %payload.data.order.order_id,
                "Invalid Cashfree webhook signature"
            );
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid webhook signature"
            )));
        }

        Ok(())
    }
}

/// Cashfree emits amounts and payment ids as either numbers or strings
/// depending on the payload version. The signed concatenation must use the
/// exact token the provider sent (a float round-trip would turn `299.00`
/// into `299.0`), so the raw JSON slice is kept instead of a parsed number.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    raw_token(raw.get()).map_err(serde::de::Error::custom)
}

fn optional_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Box::<RawValue>::deserialize(deserializer)?;
    let token = raw.get();
    if token == "null" {
        return Ok(None);
    }
    raw_token(token).map(Some).map_err(serde::de::Error::custom)
}

fn raw_token(token: &str) -> Result<String, String> {
    match token.as_bytes().first() {
        Some(b'"') => serde_json::from_str::<String>(token).map_err(|e| e.to_string()),
        Some(b'-') | Some(b'0'..=b'9') => Ok(token.to_string()),
        _ => Err(format!("expected string or number, got {}", token)),
    }
}
