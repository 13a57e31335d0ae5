//! Domain models for subscription-service.

mod plan;
mod subscription;

pub use plan::{Plan, PlanDefinition, PlanLimits, UNLIMITED};
pub use subscription::{CreateSubscription, Provider, Subscription, SubscriptionStatus};
