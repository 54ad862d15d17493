mod common;

use anyhow::Result;

use crediflow::authz::{self, permissions, roles};
use crediflow::errors::AppError;

#[tokio::test]
async fn missing_session_is_unauthenticated_before_anything_else() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let err = authz::guard(&pool, None, Some(permissions::MANAGE_STAFF))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));

    // Even with no permission required, no session still fails.
    let err = authz::guard(&pool, None, None).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));

    Ok(())
}

#[tokio::test]
async fn denial_names_the_missing_permission() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    // An analyst trying to act on invoice status lacks manage_assigned_invoices.
    let analyst = common::staff_with_role(&pool, "ana@example.com", roles::CREDIT_OPS_ANALYST).await?;

    let err = authz::guard(&pool, Some(analyst), Some(permissions::MANAGE_ASSIGNED_INVOICES))
        .await
        .unwrap_err();

    match err {
        AppError::Forbidden(message) => {
            assert!(
                message.contains(permissions::MANAGE_ASSIGNED_INVOICES),
                "denial should name the permission, got: {message}"
            );
        }
        other => panic!("expected Forbidden, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn authenticated_tier_passes_without_permissions() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let session = authz::guard(&pool, Some(trader), None).await?;
    assert_eq!(session.principal_id, trader);

    Ok(())
}

#[tokio::test]
async fn holder_of_the_permission_gets_through() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let session = authz::guard(&pool, Some(lead), Some(permissions::MANAGE_ASSIGNED_INVOICES)).await?;
    assert_eq!(session.principal_id, lead);

    Ok(())
}

#[tokio::test]
async fn deactivation_revokes_access_despite_a_live_session() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    authz::guard(&pool, Some(lead), Some(permissions::MANAGE_ASSIGNED_INVOICES)).await?;

    sqlx::query("UPDATE principals SET deleted_at = ? WHERE id = ?")
        .bind(chrono::Utc::now())
        .bind(lead)
        .execute(&pool)
        .await?;

    // The session id is still valid JWT-wise; the gate must not honor it.
    let err = authz::guard(&pool, Some(lead), Some(permissions::MANAGE_ASSIGNED_INVOICES))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));

    let err = authz::guard(&pool, Some(lead), None).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthenticated(_)));

    Ok(())
}

#[tokio::test]
async fn decision_is_deterministic_for_an_unchanged_claim_set() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    for _ in 0..5 {
        authz::guard(&pool, Some(lead), Some(permissions::COSIGN_MILESTONES)).await?;
        let denied = authz::guard(&pool, Some(lead), Some(permissions::MANAGE_ROLES)).await;
        assert!(denied.is_err());
    }

    Ok(())
}
