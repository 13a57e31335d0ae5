//! Cashfree webhook receiver.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::services::{dispatcher, record_webhook_event};
use crate::AppState;

/// Cashfree webhook handler.
///
/// The signature header must be present before any JSON parsing occurs
/// (401). Cashfree signs a concatenation of payload fields rather than the
/// raw body, so the digest check runs after parsing (400 on malformed JSON,
/// then 401 on mismatch).
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let signature = headers
        .get("x-webhook-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing x-webhook-signature header");
            record_webhook_event("cashfree", "unknown", "missing_signature");
            AppError::Unauthorized(anyhow::anyhow!("Missing x-webhook-signature header"))
        })?;

    let payload = match state.cashfree.parse(&body) {
        Ok(payload) => payload,
        Err(e) => {
            record_webhook_event("cashfree", "unknown", "malformed_payload");
            return Err(e);
        }
    };

    if let Err(e) = state.cashfree.verify(&payload, signature) {
        record_webhook_event("cashfree", &payload.event_type, "invalid_signature");
        return Err(e);
    }

    tracing::info!(
        event_type = %payload.event_type,
        order_id = %payload.data.order.order_id,
        payment_status = %payload.data.payment.payment_status,
        "Processing Cashfree webhook"
    );
    record_webhook_event("cashfree", &payload.event_type, "accepted");

    dispatcher::apply(&state.db, payload.into_lifecycle()).await?;

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

/// Cashfree probes webhook URLs with a GET before enabling them; answer
/// with a liveness message.
pub async fn verify_ping() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "message": "Cashfree webhook endpoint is live"
        })),
    )
}
