use std::collections::HashSet;

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::AppResult;

/// Compute a principal's effective permission set.
///
/// Union of:
/// 1. actions of active permissions granted directly through active
///    permission claims, and
/// 2. actions of active permissions linked (active link) to active roles
///    named by the principal's active role claims.
///
/// A principal with zero claims resolves to an empty set; "no permissions"
/// is a normal state, not an error. Pure read, no caching.
///
/// A soft-deleted principal resolves to the empty set no matter what claims
/// it still holds: deactivation must revoke as immediately as a claim
/// revocation does, JWT lifetime notwithstanding.
pub async fn resolve_effective_permissions(
    pool: &SqlitePool,
    principal_id: Uuid,
) -> AppResult<HashSet<String>> {
    let direct: Vec<String> = sqlx::query_scalar(
        "SELECT p.action
         FROM claims c
         JOIN principals pr ON pr.id = c.principal_id AND pr.deleted_at IS NULL
         JOIN permissions p ON p.id = c.permission_id AND p.active = 1
         WHERE c.principal_id = ? AND c.claim_type = 'permission' AND c.active = 1",
    )
    .bind(principal_id)
    .fetch_all(pool)
    .await?;

    let via_roles: Vec<String> = sqlx::query_scalar(
        "SELECT p.action
         FROM claims c
         JOIN principals pr ON pr.id = c.principal_id AND pr.deleted_at IS NULL
         JOIN roles r ON r.name = c.role_name AND r.active = 1
         JOIN role_permissions rp ON rp.role_id = r.id AND rp.active = 1
         JOIN permissions p ON p.id = rp.permission_id AND p.active = 1
         WHERE c.principal_id = ? AND c.claim_type = 'role' AND c.active = 1",
    )
    .bind(principal_id)
    .fetch_all(pool)
    .await?;

    Ok(direct.into_iter().chain(via_roles).collect())
}
