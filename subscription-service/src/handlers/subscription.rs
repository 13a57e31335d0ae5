//! Subscription API handlers: checkout initiation, status, cancellation.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use service_core::error::AppError;
use uuid::Uuid;

use crate::middleware::SessionContext;
use crate::models::{CreateSubscription, Plan, Provider, Subscription};
use crate::services::{record_subscription_operation, status};
use crate::AppState;

/// Request to initiate a paid-plan checkout.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Plan name ("pro" or "enterprise").
    pub plan: String,
    /// Payment provider; defaults to Stripe.
    #[serde(default)]
    pub provider: Option<String>,
    /// Optional owning organization.
    #[serde(default)]
    pub organization_id: Option<Uuid>,
}

/// Response after checkout initiation.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub success: bool,
    pub subscription_id: Uuid,
    pub order_id: String,
    pub plan: Plan,
    pub provider: Provider,
}

/// Action request on the subscription resource.
#[derive(Debug, Deserialize)]
pub struct SubscriptionActionRequest {
    pub action: String,
    /// Optional explicit target; defaults to the caller's active row.
    #[serde(default)]
    pub subscription_id: Option<Uuid>,
}

/// Initiate a checkout: persist the pending subscription row that a later
/// payment-success webhook activates. The webhook never fabricates rows, so
/// this is the only place subscriptions are created.
pub async fn create_checkout(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), AppError> {
    let plan = Plan::parse(&payload.plan)
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown plan: {}", payload.plan)))?;

    if plan == Plan::Free {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "The free plan does not require checkout"
        )));
    }

    let provider = match payload.provider.as_deref() {
        None => Provider::Stripe,
        Some(name) => Provider::parse(name)
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Unknown provider: {}", name)))?,
    };

    let now = Utc::now();
    let order_id = format!("order_{}", Uuid::new_v4().simple());
    let input = CreateSubscription {
        user_id: session.user_id,
        organization_id: payload.organization_id.or(session.organization_id),
        plan,
        provider,
        provider_order_id: order_id.clone(),
        current_period_start: now,
        current_period_end: Some(now + Duration::days(30)),
    };

    let subscription = state.db.create_subscription(&input).await?;
    record_subscription_operation("checkout");

    tracing::info!(
        user_id = %session.user_id,
        subscription_id = %subscription.subscription_id,
        order_id = %order_id,
        plan = plan.as_str(),
        provider = provider.as_str(),
        "Checkout initiated"
    );

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            success: true,
            subscription_id: subscription.subscription_id,
            order_id,
            plan,
            provider,
        }),
    ))
}

/// Report the caller's effective plan, limits and renewal countdown.
pub async fn get_status(
    State(state): State<AppState>,
    session: SessionContext,
) -> Result<Json<Value>, AppError> {
    let report = status::effective_status(&state.db, session.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "subscription": report,
    })))
}

/// Apply an action to the caller's subscription. The only supported action
/// is `cancel`, which targets the caller's own active row.
pub async fn subscription_action(
    State(state): State<AppState>,
    session: SessionContext,
    Json(payload): Json<SubscriptionActionRequest>,
) -> Result<Json<Value>, AppError> {
    match payload.action.as_str() {
        "cancel" => {
            let canceled = state
                .db
                .cancel_by_user(session.user_id, payload.subscription_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(anyhow::anyhow!("No active subscription to cancel"))
                })?;
            record_subscription_operation("cancel");

            Ok(Json(json!({
                "success": true,
                "subscription": summary(&canceled),
            })))
        }
        other => Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported action: {}",
            other
        ))),
    }
}

fn summary(subscription: &Subscription) -> Value {
    json!({
        "subscription_id": subscription.subscription_id,
        "plan": subscription.plan,
        "status": subscription.status,
        "current_period_end": subscription.current_period_end,
    })
}
