//! Subscription lifecycle service.
//!
//! Receives payment-provider webhooks (Stripe and Cashfree), verifies their
//! signatures, maps them to subscription lifecycle transitions, and answers
//! plan/limit status queries for session-authenticated callers.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod providers;
pub mod services;
pub mod startup;

pub use startup::{AppState, Application};
