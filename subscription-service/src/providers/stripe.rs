//! Stripe webhook verification and event mapping.
//!
//! Stripe signs the raw request body: the `stripe-signature` header carries
//! `t=<unix>,v1=<hex hmac>` where the digest is HMAC-SHA256 over
//! `"{t}.{raw_body}"` with the endpoint secret. Verification therefore needs
//! the exact bytes as received, never a re-serialized JSON value.

use std::collections::HashMap;

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::error::AppError;
use service_core::utils::signature;

use crate::config::StripeConfig;
use crate::services::dispatcher::LifecycleEvent;

/// Closed set of Stripe event types this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StripeEventKind {
    CheckoutSessionCompleted,
    InvoicePaymentFailed,
    SubscriptionDeleted,
    Unrecognized(String),
}

impl StripeEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => StripeEventKind::CheckoutSessionCompleted,
            "invoice.payment_failed" => StripeEventKind::InvoicePaymentFailed,
            "customer.subscription.deleted" => StripeEventKind::SubscriptionDeleted,
            other => StripeEventKind::Unrecognized(other.to_string()),
        }
    }
}

/// Deserialized Stripe event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: StripeObject,
}

/// The event's inner object (checkout session, invoice, or subscription).
/// Only the fields needed to resolve our order and payment ids are kept;
/// everything else is ignored for forward compatibility.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeObject {
    pub id: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeObject {
    /// Resolve the order id this event refers to.
    ///
    /// Checkout sessions carry our locally generated order id as
    /// `client_reference_id`; other objects fall back to `metadata.order_id`
    /// and finally the provider object id.
    fn order_id(&self) -> String {
        self.client_reference_id
            .clone()
            .or_else(|| self.metadata.get("order_id").cloned())
            .unwrap_or_else(|| self.id.clone())
    }
}

impl StripeEvent {
    pub fn kind(&self) -> StripeEventKind {
        StripeEventKind::from_type(&self.event_type)
    }

    /// Map this event to a lifecycle transition.
    pub fn into_lifecycle(self) -> LifecycleEvent {
        let object = &self.data.object;
        match self.kind() {
            StripeEventKind::CheckoutSessionCompleted => LifecycleEvent::PaymentSucceeded {
                order_id: object.order_id(),
                payment_id: object
                    .payment_intent
                    .clone()
                    .unwrap_or_else(|| object.id.clone()),
            },
            StripeEventKind::InvoicePaymentFailed => LifecycleEvent::PaymentFailed {
                order_id: object.order_id(),
                payment_id: object.payment_intent.clone(),
                reason: Some("invoice payment failed".to_string()),
            },
            StripeEventKind::SubscriptionDeleted => LifecycleEvent::PaymentFailed {
                order_id: object.order_id(),
                payment_id: None,
                reason: Some("subscription deleted by provider".to_string()),
            },
            StripeEventKind::Unrecognized(event_type) => LifecycleEvent::Unrecognized {
                provider: "stripe",
                event_type,
            },
        }
    }
}

/// Verifier for Stripe webhook deliveries.
#[derive(Clone)]
pub struct StripeWebhook {
    secret: Secret<String>,
    tolerance_seconds: i64,
}

impl StripeWebhook {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            secret: config.webhook_secret.clone(),
            tolerance_seconds: config.tolerance_seconds,
        }
    }

    /// Verify the `stripe-signature` header against the raw body.
    ///
    /// Per the response contract for this route, signature failures are
    /// client errors (400), not auth errors.
    pub fn verify(&self, body: &str, signature_header: &str) -> Result<(), AppError> {
        let (timestamp, v1) = parse_signature_header(signature_header)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Malformed signature header")))?;

        let age = (chrono::Utc::now().timestamp() - timestamp).abs();
        if age > self.tolerance_seconds {
            tracing::warn!(age_seconds = age, "Stripe webhook timestamp outside tolerance");
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Signature timestamp outside tolerance"
            )));
        }

        let signed_payload = format!("{}.{}", timestamp, body);
        let valid = signature::verify_hex(self.secret.expose_secret(), &signed_payload, &v1)
            .map_err(|e| {
                tracing::error!(error = %e, "Stripe signature computation failed");
                AppError::InternalError(anyhow::anyhow!("Signature verification failed"))
            })?;

        if !valid {
            tracing::warn!("Invalid Stripe webhook signature");
            return Err(AppError::BadRequest(anyhow::anyhow!("Invalid signature")));
        }

        Ok(())
    }

    /// Parse a verified body into an event. Malformed JSON is a client error
    /// distinct from signature failure.
    pub fn parse(&self, body: &str) -> Result<StripeEvent, AppError> {
        serde_json::from_str(body).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe webhook payload");
            AppError::BadRequest(anyhow::anyhow!("Invalid JSON payload"))
        })
    }
}

/// Split `t=<unix>,v1=<hex>` into its parts. Unknown schemes (`v0=`) are
/// ignored, matching Stripe's header format.
fn parse_signature_header(header: &str) -> Option<(i64, String)> {
    let mut timestamp: Option<i64> = None;
    let mut v1: Option<String> = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => v1 = Some(value.to_string()),
            _ => {}
        }
    }

    Some((timestamp?, v1?))
}
