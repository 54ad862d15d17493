mod common;

use anyhow::Result;
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt; // for `oneshot`
use uuid::Uuid;

use crediflow::authz::roles;
use crediflow::create_app;
use crediflow::jwt::JwtConfig;
use crediflow::workflow::{self, ReviewEntity, ReviewStatus};

async fn inbox(app: &axum::Router, token: &str) -> Result<serde_json::Value> {
    let req = Request::builder()
        .method("GET")
        .uri("/notifications")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn fan_out_to_many_recipients_shows_one_inbox_entry_each() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    let jwt = JwtConfig::from_env()?;

    let trader = common::insert_principal(&pool, "trader", "t@example.com").await?;
    let lead = common::staff_with_role(&pool, "lead@example.com", roles::CREDIT_OPS_LEAD).await?;
    let head = common::staff_with_role(&pool, "head@example.com", roles::HEAD_OF_CREDIT).await?;
    let col_a = common::staff_with_role(&pool, "col.a@example.com", roles::COLLECTIONS).await?;
    let col_b = common::staff_with_role(&pool, "col.b@example.com", roles::COLLECTIONS).await?;

    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let invoice = common::insert_invoice(&pool, trader, vendor, "INV-30", 400.0, "PENDING").await?;
    workflow::transition_review(&pool, ReviewEntity::Invoice, invoice, ReviewStatus::Approved, lead).await?;

    let handoff = workflow::complete_invoice(&pool, invoice, head).await?;
    assert_eq!(handoff.recipients.len(), 2);
    workflow::notify_collections(&pool, &handoff).await;

    // The trader sees the notification once, not once per recipient.
    let entries = inbox(&app, &jwt.encode(trader)?).await?;
    let entries = entries.as_array().expect("array body");
    assert_eq!(entries.len(), 1);
    assert!(entries[0]["message"]
        .as_str()
        .unwrap_or_default()
        .contains("INV-30"));

    // Each collections admin sees their own copy, with their own read state.
    for collector in [col_a, col_b] {
        let entries = inbox(&app, &jwt.encode(collector)?).await?;
        let entries = entries.as_array().expect("array body");
        assert_eq!(entries.len(), 1);
        assert!(entries[0]["read_at"].is_null());
    }

    // An uninvolved staff member sees nothing.
    let other: Uuid = lead;
    let entries = inbox(&app, &jwt.encode(other)?).await?;
    assert_eq!(entries.as_array().expect("array body").len(), 0);

    Ok(())
}
