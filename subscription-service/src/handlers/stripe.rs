//! Stripe webhook receiver.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::services::{dispatcher, record_webhook_event};
use crate::AppState;

/// Stripe webhook handler.
///
/// The body is taken as raw text because the signature covers the exact
/// bytes Stripe sent; framework-level JSON parsing would break verification.
/// Signature and JSON errors answer 400, store errors answer 500 so Stripe
/// redelivers.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing stripe-signature header");
            record_webhook_event("stripe", "unknown", "missing_signature");
            AppError::BadRequest(anyhow::anyhow!("Missing stripe-signature header"))
        })?;

    if let Err(e) = state.stripe.verify(&body, signature) {
        record_webhook_event("stripe", "unknown", "invalid_signature");
        return Err(e);
    }

    let event = match state.stripe.parse(&body) {
        Ok(event) => event,
        Err(e) => {
            record_webhook_event("stripe", "unknown", "malformed_payload");
            return Err(e);
        }
    };

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        object_id = %event.data.object.id,
        "Processing Stripe webhook"
    );
    record_webhook_event("stripe", &event.event_type, "accepted");

    dispatcher::apply(&state.db, event.into_lifecycle()).await?;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}
