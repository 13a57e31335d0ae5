//! Status query service.
//!
//! Reconciles the most recent subscription row against wall-clock time and
//! reports the user's effective plan and entitlements. Expiry is lazy: an
//! expired-but-still-live row is written back to canceled here, on read,
//! not by a background sweep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use uuid::Uuid;

use crate::models::{Plan, PlanLimits, SubscriptionStatus};
use crate::services::metrics::record_subscription_operation;
use crate::services::Database;

/// Effective subscription state for one user. The limits always equal one of
/// the three static plan definitions, never a mixed combination.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionReport {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub features: &'static [&'static str],
    pub limits: PlanLimits,
    pub current_period_end: Option<DateTime<Utc>>,
    pub days_until_renewal: Option<i64>,
    pub is_active: bool,
    pub can_upgrade: bool,
    pub can_downgrade: bool,
}

impl SubscriptionReport {
    /// The implicit-FREE report used when no live paid subscription exists.
    fn free() -> Self {
        let def = Plan::Free.definition();
        Self {
            plan: Plan::Free,
            status: SubscriptionStatus::Active,
            features: def.features,
            limits: def.limits,
            current_period_end: None,
            days_until_renewal: None,
            is_active: true,
            can_upgrade: true,
            can_downgrade: false,
        }
    }

    fn for_plan(
        plan: Plan,
        status: SubscriptionStatus,
        period_end: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        let def = plan.definition();
        Self {
            plan,
            status,
            features: def.features,
            limits: def.limits,
            current_period_end: period_end,
            days_until_renewal: period_end.map(|end| days_until_renewal(end, now)),
            is_active: status.is_live(),
            can_upgrade: plan.can_upgrade(),
            can_downgrade: plan.can_downgrade(),
        }
    }
}

/// Compute the effective status for a user, applying the lazy expiry
/// write-back when the most recent row has outlived its period.
///
/// Only settled rows count: an unpaid pending checkout grants nothing
/// until its payment-success webhook arrives.
pub async fn effective_status(
    db: &Database,
    user_id: Uuid,
) -> Result<SubscriptionReport, AppError> {
    let Some(subscription) = db.latest_settled_for_user(user_id).await? else {
        return Ok(SubscriptionReport::free());
    };

    let status = subscription.status();
    if !status.is_live() {
        return Ok(SubscriptionReport::free());
    }

    let now = Utc::now();
    if let Some(end) = subscription.current_period_end {
        if end < now {
            record_subscription_operation("expire");
            let flipped = db.expire(subscription.subscription_id).await?;
            if flipped {
                tracing::info!(
                    subscription_id = %subscription.subscription_id,
                    user_id = %user_id,
                    "Expired subscription written back to canceled"
                );
            }
            return Ok(SubscriptionReport::free());
        }
    }

    Ok(SubscriptionReport::for_plan(
        subscription.plan(),
        status,
        subscription.current_period_end,
        now,
    ))
}

/// Whole days until the period ends, rounded up. `periodEnd = now + 5 days`
/// reports 5.
fn days_until_renewal(end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let seconds = (end - now).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    (seconds + 86_399) / 86_400
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn renewal_days_round_up() {
        let now = Utc::now();
        assert_eq!(days_until_renewal(now + Duration::days(5), now), 5);
        assert_eq!(days_until_renewal(now + Duration::hours(1), now), 1);
        assert_eq!(
            days_until_renewal(now + Duration::days(5) + Duration::hours(1), now),
            6
        );
        assert_eq!(days_until_renewal(now - Duration::hours(1), now), 0);
    }

    #[test]
    fn free_report_matches_free_definition() {
        let report = SubscriptionReport::free();
        assert_eq!(report.plan, Plan::Free);
        assert!(report.is_active);
        assert!(report.can_upgrade);
        assert!(!report.can_downgrade);
        assert_eq!(report.limits, Plan::Free.definition().limits);
        assert!(report.days_until_renewal.is_none());
    }

    #[test]
    fn plan_report_carries_static_limits() {
        let now = Utc::now();
        let report = SubscriptionReport::for_plan(
            Plan::Pro,
            SubscriptionStatus::Active,
            Some(now + Duration::days(5)),
            now,
        );
        assert_eq!(report.limits, Plan::Pro.definition().limits);
        assert_eq!(report.days_until_renewal, Some(5));
        assert!(report.can_upgrade);
        assert!(report.can_downgrade);
    }
}
