use anyhow::Result;
use dotenvy::dotenv;
use secrecy::Secret;
use service_core::config::Config as CoreConfig;
use std::env;

#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    pub common: CoreConfig,
    pub service_name: String,
    pub log_level: String,
    pub database: DatabaseConfig,
    pub stripe: StripeConfig,
    pub cashfree: CashfreeConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone, Debug)]
pub struct StripeConfig {
    pub webhook_secret: Secret<String>,
    /// Maximum accepted age of the signed timestamp, in seconds.
    pub tolerance_seconds: i64,
}

#[derive(Clone, Debug)]
pub struct CashfreeConfig {
    pub webhook_secret: Secret<String>,
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let common = CoreConfig::load()?;

        let db_url = env::var("SUBSCRIPTION_DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("SUBSCRIPTION_DATABASE_URL must be set"))?;
        let max_connections = env::var("SUBSCRIPTION_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()?;
        let min_connections = env::var("SUBSCRIPTION_DATABASE_MIN_CONNECTIONS")
            .unwrap_or_else(|_| "1".to_string())
            .parse()?;

        let stripe_secret = env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| anyhow::anyhow!("STRIPE_WEBHOOK_SECRET must be set"))?;
        let tolerance_seconds = env::var("STRIPE_SIGNATURE_TOLERANCE_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()?;

        let cashfree_secret = env::var("CASHFREE_WEBHOOK_SECRET")
            .map_err(|_| anyhow::anyhow!("CASHFREE_WEBHOOK_SECRET must be set"))?;

        let log_level = env::var("SUBSCRIPTION_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            common,
            service_name: "subscription-service".to_string(),
            log_level,
            database: DatabaseConfig {
                url: db_url,
                max_connections,
                min_connections,
            },
            stripe: StripeConfig {
                webhook_secret: Secret::new(stripe_secret),
                tolerance_seconds,
            },
            cashfree: CashfreeConfig {
                webhook_secret: Secret::new(cashfree_secret),
            },
        })
    }
}
