use sqlx::SqlitePool;
use uuid::Uuid;

use super::resolver::resolve_effective_permissions;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;

/// The resolved session handed to business logic once the gate allows a call.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub principal_id: Uuid,
}

/// The authorization gate every sensitive operation runs through.
///
/// 1. No session at all -> `Unauthenticated`, checked before anything else.
/// 2. With a required permission, resolve the caller's effective set and
///    deny with `Forbidden` (naming the missing permission) if absent.
/// 3. Otherwise hand back the session context.
///
/// `required = None` is the authenticated-only tier. The effective set is
/// re-resolved on every call; the decision is deterministic for an unchanged
/// claim set. A soft-deleted principal is treated as having no session: a
/// still-valid JWT does not outlive deactivation.
pub async fn guard(
    pool: &SqlitePool,
    session: Option<Uuid>,
    required: Option<&str>,
) -> AppResult<SessionContext> {
    let principal_id =
        session.ok_or_else(|| AppError::unauthenticated("no principal attached to call"))?;

    let active: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM principals WHERE id = ? AND deleted_at IS NULL")
            .bind(principal_id)
            .fetch_optional(pool)
            .await?;
    if active.is_none() {
        tracing::debug!(%principal_id, "deactivated or unknown principal rejected");
        return Err(AppError::unauthenticated("account is not active"));
    }

    if let Some(permission) = required {
        let effective = resolve_effective_permissions(pool, principal_id).await?;
        if !effective.contains(permission) {
            tracing::debug!(%principal_id, permission, "permission denied");
            return Err(AppError::forbidden(format!("missing permission: {permission}")));
        }
        tracing::debug!(%principal_id, permission, "permission granted");
    }

    Ok(SessionContext { principal_id })
}

/// Handler-side shorthand: the bearer token already authenticated the
/// caller, so only the permission tier remains.
pub async fn require(pool: &SqlitePool, auth: &AuthUser, permission: &str) -> AppResult<SessionContext> {
    guard(pool, Some(auth.principal_id), Some(permission)).await
}
