//! Services module for subscription-service.

pub mod database;
pub mod dispatcher;
pub mod metrics;
pub mod status;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics, record_subscription_operation, record_webhook_event};
