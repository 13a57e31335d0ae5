//! Session context extractor.
//!
//! The authenticating frontend (BFF) validates the session cookie and
//! forwards the resolved identity as headers. Requests without a user
//! identity are rejected before any handler logic runs.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;
use uuid::Uuid;

/// Authenticated caller identity for the subscription API routes.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user_id: Uuid,
    pub organization_id: Option<Uuid>,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!("Missing X-User-ID header (session required)"))
            })?;

        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-User-ID header")))?;

        let organization_id = parts
            .headers
            .get("X-Org-ID")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok());

        let span = tracing::Span::current();
        span.record("user_id", user_id.to_string().as_str());

        Ok(SessionContext {
            user_id,
            organization_id,
        })
    }
}
