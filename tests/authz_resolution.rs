mod common;

use anyhow::Result;

use crediflow::authz::{self, permissions, roles};

#[tokio::test]
async fn effective_set_is_union_of_role_and_direct_claims() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    // Analyst role carries only milestone approval.
    let analyst = common::staff_with_role(&pool, "ana@example.com", roles::CREDIT_OPS_ANALYST).await?;

    // Plus one direct permission grant on top.
    let view_invoices = authz::upsert_permission(&pool, "invoices", permissions::VIEW_INVOICES).await?;
    authz::grant_permission_claim(&pool, analyst, view_invoices).await?;

    let effective = authz::resolve_effective_permissions(&pool, analyst).await?;

    assert!(effective.contains(permissions::APPROVE_OR_EDIT_MILESTONES));
    assert!(effective.contains(permissions::VIEW_INVOICES));
    assert!(!effective.contains(permissions::MANAGE_STAFF));
    assert_eq!(effective.len(), 2);

    Ok(())
}

#[tokio::test]
async fn head_of_credit_gets_everything() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let head = common::staff_with_role(&pool, "head@example.com", roles::HEAD_OF_CREDIT).await?;
    let effective = authz::resolve_effective_permissions(&pool, head).await?;

    for permission in [
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
    ] {
        assert!(effective.contains(permission), "missing {permission}");
    }

    Ok(())
}

#[tokio::test]
async fn revoked_claims_stop_resolving_immediately() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    assert!(authz::resolve_effective_permissions(&pool, lead)
        .await?
        .contains(permissions::COSIGN_MILESTONES));

    let revoked = authz::revoke_role_claims(&pool, lead).await?;
    assert_eq!(revoked, 1);

    // No caching layer: the next resolution already sees the revocation.
    let effective = authz::resolve_effective_permissions(&pool, lead).await?;
    assert!(effective.is_empty());

    Ok(())
}

#[tokio::test]
async fn deactivated_role_resolves_to_nothing_without_erroring() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let finance = common::staff_with_role(&pool, "fin@example.com", roles::FINANCE).await?;
    authz::deactivate_role(&pool, roles::FINANCE).await?;

    let effective = authz::resolve_effective_permissions(&pool, finance).await?;
    assert!(effective.is_empty());

    Ok(())
}

#[tokio::test]
async fn soft_deleted_principal_resolves_to_nothing() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    assert!(authz::resolve_effective_permissions(&pool, lead)
        .await?
        .contains(permissions::MANAGE_ASSIGNED_INVOICES));

    // Deactivation soft-deletes the principal; the role claim stays put.
    sqlx::query("UPDATE principals SET deleted_at = ? WHERE id = ?")
        .bind(chrono::Utc::now())
        .bind(lead)
        .execute(&pool)
        .await?;

    let effective = authz::resolve_effective_permissions(&pool, lead).await?;
    assert!(effective.is_empty());

    Ok(())
}

#[tokio::test]
async fn unknown_principal_resolves_to_empty_set() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let effective = authz::resolve_effective_permissions(&pool, uuid::Uuid::new_v4()).await?;
    assert!(effective.is_empty());

    Ok(())
}
