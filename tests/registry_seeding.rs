mod common;

use anyhow::Result;
use uuid::Uuid;

use crediflow::authz::{self, roles};

async fn counts(pool: &sqlx::SqlitePool) -> Result<(i64, i64, i64)> {
    let permissions: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM permissions")
        .fetch_one(pool)
        .await?;
    let roles: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM roles").fetch_one(pool).await?;
    let links: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM role_permissions")
        .fetch_one(pool)
        .await?;
    Ok((permissions, roles, links))
}

#[tokio::test]
async fn seeding_twice_changes_nothing() -> Result<()> {
    // setup_pool already seeded once.
    let (_dir, pool) = common::setup_pool().await?;
    let before = counts(&pool).await?;

    authz::seed_roles_and_permissions(&pool).await?;
    authz::seed_roles_and_permissions(&pool).await?;

    assert_eq!(counts(&pool).await?, before);
    assert_eq!(before.0, 12, "full permission catalog");
    assert_eq!(before.1, 5, "built-in role bundles");

    Ok(())
}

#[tokio::test]
async fn permission_ids_are_stable_across_reseeds() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let before: Uuid =
        sqlx::query_scalar("SELECT id FROM permissions WHERE module = 'staff' AND action = 'manage_staff'")
            .fetch_one(&pool)
            .await?;

    authz::seed_roles_and_permissions(&pool).await?;

    let after: Uuid =
        sqlx::query_scalar("SELECT id FROM permissions WHERE module = 'staff' AND action = 'manage_staff'")
            .fetch_one(&pool)
            .await?;

    assert_eq!(before, after);
    Ok(())
}

#[tokio::test]
async fn dynamic_role_creation_links_only_new_permissions() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    let view: Uuid =
        sqlx::query_scalar("SELECT id FROM permissions WHERE action = 'view_invoices'")
            .fetch_one(&pool)
            .await?;
    let cosign: Uuid =
        sqlx::query_scalar("SELECT id FROM permissions WHERE action = 'cosign_milestones'")
            .fetch_one(&pool)
            .await?;

    let role_id = authz::upsert_role(&pool, "collections_supervisor", Some("supervises"), &[view]).await?;
    // Second upsert keeps the existing link and adds the new one.
    let again = authz::upsert_role(&pool, "collections_supervisor", None, &[view, cosign]).await?;
    assert_eq!(role_id, again);

    let links: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM role_permissions WHERE role_id = ?")
            .bind(role_id)
            .fetch_one(&pool)
            .await?;
    assert_eq!(links, 2);

    Ok(())
}

#[tokio::test]
async fn grant_rejects_unknown_or_inactive_roles() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    let staff = common::insert_principal(&pool, "staff", "s@example.com").await?;

    assert!(authz::grant_role_claim(&pool, staff, "no_such_role").await.is_err());

    authz::deactivate_role(&pool, roles::COLLECTIONS).await?;
    assert!(authz::grant_role_claim(&pool, staff, roles::COLLECTIONS).await.is_err());

    Ok(())
}
