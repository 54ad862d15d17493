mod common;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use crediflow::authz::roles;
use crediflow::create_app;
use crediflow::jwt::JwtConfig;

#[tokio::test]
async fn workload_groups_by_status_and_skips_soft_deleted_rows() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    let jwt = JwtConfig::from_env()?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;

    // Assigned invoices across three statuses, one of them soft-deleted.
    let pending = common::insert_invoice(&pool, trader, vendor, "INV-1", 100.0, "PENDING").await?;
    let approved = common::insert_invoice(&pool, trader, vendor, "INV-2", 200.0, "APPROVED").await?;
    let rejected = common::insert_invoice(&pool, trader, vendor, "INV-3", 50.0, "REJECTED").await?;
    let deleted = common::insert_invoice(&pool, trader, vendor, "INV-4", 300.0, "PENDING").await?;
    for id in [pending, approved, rejected, deleted] {
        sqlx::query("UPDATE invoices SET assigned_to = ? WHERE id = ?")
            .bind(lead)
            .bind(id)
            .execute(&pool)
            .await?;
    }
    sqlx::query("UPDATE invoices SET deleted_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(deleted)
        .execute(&pool)
        .await?;

    // One reviewed milestone and one reviewed funding request.
    let milestone = common::insert_milestone(&pool, approved, trader, 75.0, "APPROVED").await?;
    sqlx::query("UPDATE milestones SET reviewed_by = ? WHERE id = ?")
        .bind(lead)
        .bind(milestone)
        .execute(&pool)
        .await?;

    let now = Utc::now();
    sqlx::query(
        "INSERT INTO funding_requests (id, invoice_id, user_id, requested_amount, your_contribution, status, reviewed_by, created_at, updated_at)
         VALUES (?, ?, ?, 60.0, 10.0, 'REJECTED', ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(approved)
    .bind(trader)
    .bind(lead)
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await?;

    let token = jwt.encode(lead)?;
    let req = Request::builder()
        .method("GET")
        .uri("/admin/workload")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let page: serde_json::Value = serde_json::from_slice(&bytes)?;

    assert_eq!(page["total"], 1);
    let staffs = page["staffs"].as_array().context("staffs array")?;
    assert_eq!(staffs.len(), 1);

    let entry = &staffs[0];
    assert_eq!(entry["staff_id"], serde_json::json!(lead));
    assert_eq!(entry["roles"], serde_json::json!(["credit_ops_lead"]));

    let invoices = &entry["assigned_invoices"];
    assert_eq!(invoices["PENDING"]["count"], 1);
    assert_eq!(invoices["PENDING"]["total_amount"], 100.0);
    assert_eq!(invoices["APPROVED"]["total_amount"], 200.0);
    // REJECTED counts toward rejected, it is not silently excluded.
    assert_eq!(invoices["REJECTED"]["count"], 1);
    assert_eq!(invoices["REJECTED"]["total_amount"], 50.0);
    // The soft-deleted PENDING invoice must not inflate the bucket.
    assert_eq!(invoices["PENDING"]["count"], 1);

    assert_eq!(entry["reviewed_milestones"]["APPROVED"]["count"], 1);
    assert_eq!(entry["reviewed_milestones"]["APPROVED"]["total_amount"], 75.0);
    assert_eq!(entry["reviewed_funding_requests"]["REJECTED"]["total_amount"], 60.0);

    Ok(())
}

#[tokio::test]
async fn status_filter_narrows_every_bucket() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    let jwt = JwtConfig::from_env()?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let vendor = common::insert_vendor(&pool, "Acme").await?;

    for (n, status) in [("INV-1", "PENDING"), ("INV-2", "APPROVED")] {
        let id = common::insert_invoice(&pool, trader, vendor, n, 100.0, status).await?;
        sqlx::query("UPDATE invoices SET assigned_to = ? WHERE id = ?")
            .bind(lead)
            .bind(id)
            .execute(&pool)
            .await?;
    }

    let token = jwt.encode(lead)?;
    let req = Request::builder()
        .method("GET")
        .uri("/admin/workload?status=APPROVED")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let page: serde_json::Value = serde_json::from_slice(&bytes)?;
    let invoices = &page["staffs"][0]["assigned_invoices"];

    assert!(invoices.get("PENDING").is_none());
    assert_eq!(invoices["APPROVED"]["count"], 1);

    Ok(())
}

#[tokio::test]
async fn workload_needs_the_view_staff_workload_permission() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    let jwt = JwtConfig::from_env()?;

    // Analysts do not carry view_staff_workload.
    let analyst = common::staff_with_role(&pool, "ana@example.com", roles::CREDIT_OPS_ANALYST).await?;
    let token = jwt.encode(analyst)?;

    let req = Request::builder()
        .method("GET")
        .uri("/admin/workload")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // No token at all is unauthenticated, not forbidden.
    let req = Request::builder()
        .method("GET")
        .uri("/admin/workload")
        .body(Body::empty())?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    Ok(())
}
