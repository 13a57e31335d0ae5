//! Event dispatcher: applies provider-neutral lifecycle events to the
//! subscription store.
//!
//! Each transition is idempotent; redelivering the same event converges to
//! the same final state. Unknown order ids are logged and swallowed because
//! a provider retry cannot make a missing checkout row appear. Store errors
//! propagate so the receiver answers 500 and the provider redelivers.

use service_core::error::AppError;

use crate::services::metrics::record_subscription_operation;
use crate::services::Database;

/// Provider-neutral lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Payment settled; activate the checkout row and displace siblings.
    PaymentSucceeded {
        order_id: String,
        payment_id: String,
    },
    /// Payment failed after checkout; cancel with an audit trail.
    PaymentFailed {
        order_id: String,
        payment_id: Option<String>,
        reason: Option<String>,
    },
    /// User abandoned checkout before paying.
    CheckoutDropped { order_id: String },
    /// Forward-compatible no-op for event types this service does not know.
    Unrecognized {
        provider: &'static str,
        event_type: String,
    },
}

/// Apply a lifecycle event to the store.
pub async fn apply(db: &Database, event: LifecycleEvent) -> Result<(), AppError> {
    match event {
        LifecycleEvent::PaymentSucceeded {
            order_id,
            payment_id,
        } => {
            record_subscription_operation("activate");
            match db.activate(&order_id, &payment_id).await? {
                Some(subscription) => {
                    tracing::info!(
                        order_id = %order_id,
                        subscription_id = %subscription.subscription_id,
                        "Payment success applied"
                    );
                }
                None => {
                    // No checkout row for this order: log and swallow, the
                    // provider retrying would not help.
                    tracing::warn!(
                        order_id = %order_id,
                        "Payment success for unknown order id, ignoring"
                    );
                }
            }
        }
        LifecycleEvent::PaymentFailed {
            order_id,
            payment_id,
            reason,
        } => {
            record_subscription_operation("fail");
            let affected = db
                .mark_failed(&order_id, payment_id.as_deref(), reason.as_deref())
                .await?;
            if affected == 0 {
                tracing::warn!(
                    order_id = %order_id,
                    "Payment failure for unknown order id, ignoring"
                );
            } else {
                tracing::info!(order_id = %order_id, affected = affected, "Payment failure applied");
            }
        }
        LifecycleEvent::CheckoutDropped { order_id } => {
            record_subscription_operation("drop");
            let affected = db
                .mark_failed(&order_id, None, Some("checkout abandoned"))
                .await?;
            if affected == 0 {
                tracing::warn!(
                    order_id = %order_id,
                    "Checkout drop for unknown order id, ignoring"
                );
            } else {
                tracing::info!(order_id = %order_id, "Checkout drop applied");
            }
        }
        LifecycleEvent::Unrecognized {
            provider,
            event_type,
        } => {
            tracing::info!(
                provider = provider,
                event_type = %event_type,
                "Unrecognized webhook event type, ignoring"
            );
        }
    }

    Ok(())
}
