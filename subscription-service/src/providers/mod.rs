//! Payment provider webhook verification and payload parsing.
//!
//! Each provider module owns its signature scheme and its event vocabulary,
//! and converts a verified payload into a provider-neutral
//! [`LifecycleEvent`](crate::services::dispatcher::LifecycleEvent).

pub mod cashfree;
pub mod stripe;

pub use cashfree::CashfreeWebhook;
pub use stripe::StripeWebhook;
