//! Catalog of permissions, roles, and role-permission links.
//!
//! Upserts are keyed on natural identity (`(module, action)` for
//! permissions, `name` for roles), never on surrogate ids, so seeding can
//! run on every startup without creating duplicates.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{permissions, roles};
use crate::errors::{AppError, AppResult};

/// The full permission catalog as (module, action) pairs.
const PERMISSION_CATALOG: &[(&str, &str)] = &[
    ("invoices", permissions::MANAGE_ASSIGNED_INVOICES),
    ("invoices", permissions::APPROVE_INVOICES),
    ("invoices", permissions::VIEW_INVOICES),
    ("milestones", permissions::APPROVE_OR_EDIT_MILESTONES),
    ("milestones", permissions::COSIGN_MILESTONES),
    ("funding", permissions::REVIEW_FUNDING_REQUESTS),
    ("kyc", permissions::REVIEW_KYC_DOCUMENTS),
    ("pipeline", permissions::OVERSEE_CREDIT_OPERATIONS_PIPELINE),
    ("staff", permissions::MANAGE_STAFF),
    ("staff", permissions::VIEW_STAFF_WORKLOAD),
    ("roles", permissions::MANAGE_ROLES),
    ("users", permissions::MANAGE_USERS),
];

/// Built-in role bundles seeded alongside the catalog.
const ROLE_BUNDLES: &[(&str, &str, &[&str])] = &[
    (
        roles::HEAD_OF_CREDIT,
        "Owns the full credit pipeline and staff administration",
        &[
            permissions::MANAGE_ASSIGNED_INVOICES,
            permissions::APPROVE_INVOICES,
            permissions::VIEW_INVOICES,
            permissions::APPROVE_OR_EDIT_MILESTONES,
            permissions::COSIGN_MILESTONES,
            permissions::REVIEW_FUNDING_REQUESTS,
            permissions::REVIEW_KYC_DOCUMENTS,
            permissions::OVERSEE_CREDIT_OPERATIONS_PIPELINE,
            permissions::MANAGE_STAFF,
            permissions::VIEW_STAFF_WORKLOAD,
            permissions::MANAGE_ROLES,
            permissions::MANAGE_USERS,
        ],
    ),
    (
        roles::CREDIT_OPS_LEAD,
        "Reviews assigned invoices and co-signs milestone approvals",
        &[
            permissions::MANAGE_ASSIGNED_INVOICES,
            permissions::APPROVE_OR_EDIT_MILESTONES,
            permissions::COSIGN_MILESTONES,
            permissions::VIEW_STAFF_WORKLOAD,
        ],
    ),
    (
        roles::CREDIT_OPS_ANALYST,
        "Validates individual milestones",
        &[permissions::APPROVE_OR_EDIT_MILESTONES],
    ),
    (
        roles::FINANCE,
        "Reviews funding requests and KYC documents",
        &[permissions::REVIEW_FUNDING_REQUESTS, permissions::REVIEW_KYC_DOCUMENTS],
    ),
    (
        roles::COLLECTIONS,
        "Receives fully-delivered invoices for collection",
        &[permissions::VIEW_INVOICES],
    ),
];

/// Insert a permission if `(module, action)` is new; either way return its id.
pub async fn upsert_permission(pool: &SqlitePool, module: &str, action: &str) -> AppResult<Uuid> {
    let name = format!("{module}.{action}");
    sqlx::query(
        "INSERT INTO permissions (id, module, action, name, active, created_at)
         VALUES (?, ?, ?, ?, 1, ?)
         ON CONFLICT (module, action) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(module)
    .bind(action)
    .bind(&name)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let id: Uuid = sqlx::query_scalar("SELECT id FROM permissions WHERE module = ? AND action = ?")
        .bind(module)
        .bind(action)
        .fetch_one(pool)
        .await?;

    Ok(id)
}

/// Insert a role if the name is new, then link each listed permission,
/// skipping links that already exist. Returns the role id.
pub async fn upsert_role(
    pool: &SqlitePool,
    name: &str,
    description: Option<&str>,
    permission_ids: &[Uuid],
) -> AppResult<Uuid> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO roles (id, name, description, active, created_at, updated_at)
         VALUES (?, ?, ?, 1, ?, ?)
         ON CONFLICT (name) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(description)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let role_id: Uuid = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;

    for permission_id in permission_ids {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id, active, created_at)
             VALUES (?, ?, 1, ?)
             ON CONFLICT (role_id, permission_id) DO NOTHING",
        )
        .bind(role_id)
        .bind(permission_id)
        .bind(now)
        .execute(pool)
        .await?;
    }

    Ok(role_id)
}

/// Soft-disable a role. Claims referencing it keep resolving, to zero
/// permissions, instead of erroring.
pub async fn deactivate_role(pool: &SqlitePool, name: &str) -> AppResult<()> {
    let result = sqlx::query("UPDATE roles SET active = 0, updated_at = ? WHERE name = ?")
        .bind(Utc::now())
        .bind(name)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("role not found: {name}")));
    }

    Ok(())
}

/// Seed the permission catalog and built-in role bundles. Idempotent: a
/// second run changes nothing.
pub async fn seed_roles_and_permissions(pool: &SqlitePool) -> AppResult<()> {
    for (module, action) in PERMISSION_CATALOG {
        upsert_permission(pool, module, action).await?;
    }

    for (name, description, actions) in ROLE_BUNDLES {
        let mut permission_ids = Vec::with_capacity(actions.len());
        for action in *actions {
            let id: Uuid = sqlx::query_scalar("SELECT id FROM permissions WHERE action = ?")
                .bind(action)
                .fetch_one(pool)
                .await?;
            permission_ids.push(id);
        }
        upsert_role(pool, name, Some(description), &permission_ids).await?;
    }

    tracing::info!("role/permission catalog seeded");
    Ok(())
}

/// Grant a principal a role claim. The role must exist and be active.
pub async fn grant_role_claim(pool: &SqlitePool, principal_id: Uuid, role_name: &str) -> AppResult<Uuid> {
    let exists: Option<Uuid> = sqlx::query_scalar("SELECT id FROM roles WHERE name = ? AND active = 1")
        .bind(role_name)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found(format!("role not found: {role_name}")));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO claims (id, principal_id, claim_type, role_name, active, created_at)
         VALUES (?, ?, 'role', ?, 1, ?)",
    )
    .bind(id)
    .bind(principal_id)
    .bind(role_name)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Grant a principal a single permission directly.
pub async fn grant_permission_claim(
    pool: &SqlitePool,
    principal_id: Uuid,
    permission_id: Uuid,
) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO claims (id, principal_id, claim_type, permission_id, active, created_at)
         VALUES (?, ?, 'permission', ?, 1, ?)",
    )
    .bind(id)
    .bind(principal_id)
    .bind(permission_id)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(id)
}

/// Deactivate every active role claim a principal holds. Used when swapping
/// an admin to a different role.
pub async fn revoke_role_claims(pool: &SqlitePool, principal_id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        "UPDATE claims SET active = 0 WHERE principal_id = ? AND claim_type = 'role' AND active = 1",
    )
    .bind(principal_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
