//! Database service: the subscription store.
//!
//! All lifecycle transitions are plain status writes, so replaying the same
//! webhook converges to the same final state. Activation performs its two
//! writes (promote own row, cancel siblings) in one transaction.

use crate::models::{CreateSubscription, Subscription, SubscriptionStatus};
use crate::services::metrics::DB_QUERY_DURATION;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const SUBSCRIPTION_COLUMNS: &str = "subscription_id, user_id, organization_id, plan, status, provider, provider_order_id, provider_payment_id, failure_reason, current_period_start, current_period_end, created_utc, updated_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Subscription Store Operations
    // =========================================================================

    /// Persist a pending subscription at checkout initiation.
    ///
    /// The row starts as `trialing` and is promoted by the payment-success
    /// webhook; a webhook for an order id with no row here is a no-op.
    /// Pending rows carry no payment id and grant no entitlements, so any
    /// earlier unpaid pending row of the same user is canceled here: a
    /// re-initiated checkout supersedes the abandoned attempt.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_subscription(
        &self,
        input: &CreateSubscription,
    ) -> Result<Subscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_subscription"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let superseded = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', failure_reason = 'superseded by a newer checkout', updated_utc = NOW()
            WHERE user_id = $1
              AND status = 'trialing'
              AND provider_payment_id IS NULL
            "#,
        )
        .bind(input.user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to supersede pending rows: {}", e))
        })?;

        let subscription_id = Uuid::new_v4();
        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (subscription_id, user_id, organization_id, plan, status, provider, provider_order_id, current_period_start, current_period_end)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(subscription_id)
        .bind(input.user_id)
        .bind(input.organization_id)
        .bind(input.plan.as_str())
        .bind(SubscriptionStatus::Trialing.as_str())
        .bind(input.provider.as_str())
        .bind(&input.provider_order_id)
        .bind(input.current_period_start)
        .bind(input.current_period_end)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Duplicate provider order id"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create subscription: {}", e)),
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit checkout: {}", e))
        })?;

        timer.observe_duration();
        info!(
            subscription_id = %subscription.subscription_id,
            order_id = %subscription.provider_order_id,
            superseded = superseded.rows_affected(),
            "Subscription created"
        );

        Ok(subscription)
    }

    /// Look up a subscription by its provider order id.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["find_by_order_id"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE provider_order_id = $1
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to find subscription: {}", e)))?;

        timer.observe_duration();

        Ok(subscription)
    }

    /// Activate the subscription matching `order_id` and cancel every other
    /// active/trialing row of the same user, in one transaction.
    ///
    /// Returns `None` when no row matches the order id; a webhook must never
    /// fabricate a subscription.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn activate(
        &self,
        order_id: &str,
        payment_id: &str,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["activate"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = 'active', provider_payment_id = $2, failure_reason = NULL, updated_utc = NOW()
            WHERE provider_order_id = $1
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(order_id)
        .bind(payment_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to activate: {}", e)))?;

        let Some(subscription) = subscription else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        let displaced = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', updated_utc = NOW()
            WHERE user_id = $1
              AND subscription_id <> $2
              AND status IN ('active', 'trialing')
            "#,
        )
        .bind(subscription.user_id)
        .bind(subscription.subscription_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to cancel sibling rows: {}", e))
        })?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit activation: {}", e))
        })?;

        timer.observe_duration();
        info!(
            subscription_id = %subscription.subscription_id,
            user_id = %subscription.user_id,
            displaced = displaced.rows_affected(),
            "Subscription activated"
        );

        Ok(Some(subscription))
    }

    /// Cancel all rows matching `order_id` after a failed payment, recording
    /// the payment id and failure reason for audit.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn mark_failed(
        &self,
        order_id: &str,
        payment_id: Option<&str>,
        reason: Option<&str>,
    ) -> Result<u64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_failed"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled',
                provider_payment_id = COALESCE($2, provider_payment_id),
                failure_reason = COALESCE($3, failure_reason),
                updated_utc = NOW()
            WHERE provider_order_id = $1
            "#,
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to mark failed: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    /// Cancel the caller's own subscription. Only an active row owned by
    /// `user_id` qualifies; anything else reports not-found.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn cancel_by_user(
        &self,
        user_id: Uuid,
        subscription_id: Option<Uuid>,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["cancel_by_user"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', updated_utc = NOW()
            WHERE user_id = $1
              AND status = 'active'
              AND ($2::uuid IS NULL OR subscription_id = $2)
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to cancel: {}", e)))?;

        timer.observe_duration();

        if let Some(ref s) = subscription {
            info!(subscription_id = %s.subscription_id, "Subscription canceled by user");
        }

        Ok(subscription)
    }

    /// Fetch the most recent settled subscription row for a user.
    ///
    /// Unpaid pending rows (trialing with no payment id) are checkout
    /// attempts, not entitlements, so they never shadow a paid row here.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn latest_settled_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["latest_settled_for_user"])
            .start_timer();

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            SELECT {}
            FROM subscriptions
            WHERE user_id = $1
              AND NOT (status = 'trialing' AND provider_payment_id IS NULL)
            ORDER BY created_utc DESC
            LIMIT 1
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to fetch subscription: {}", e))
        })?;

        timer.observe_duration();

        Ok(subscription)
    }

    /// Lazy expiry write-back: flip a live row to canceled, but only if its
    /// period end has actually passed. The condition makes concurrent reads
    /// converge on a single effective flip.
    #[instrument(skip(self), fields(subscription_id = %subscription_id))]
    pub async fn expire(&self, subscription_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["expire"])
            .start_timer();

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = 'canceled', updated_utc = NOW()
            WHERE subscription_id = $1
              AND status IN ('active', 'trialing')
              AND current_period_end IS NOT NULL
              AND current_period_end < NOW()
            "#,
        )
        .bind(subscription_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to expire: {}", e)))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    /// Count a user's live (active/trialing) rows. Used by tests and
    /// diagnostics to check the single-live-subscription invariant.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn count_live_for_user(&self, user_id: Uuid) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["count_live_for_user"])
            .start_timer();

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM subscriptions
            WHERE user_id = $1 AND status IN ('active', 'trialing')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count: {}", e)))?;

        timer.observe_duration();

        Ok(count)
    }
}
