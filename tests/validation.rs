mod common;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::util::ServiceExt; // for `oneshot`

use crediflow::create_app;

async fn violations(resp: axum::response::Response) -> Result<Vec<(String, String)>> {
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(value["error"], "validation");
    let list = value["violations"].as_array().context("violations array")?.clone();
    Ok(list
        .into_iter()
        .map(|v| {
            (
                v["field"].as_str().unwrap_or_default().to_string(),
                v["message"].as_str().unwrap_or_default().to_string(),
            )
        })
        .collect())
}

#[tokio::test]
async fn register_reports_every_violation_at_once() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool).await?;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"name": "  ", "email": "not-an-email", "password": "longenough1"}).to_string(),
        ))?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let violations = violations(resp).await?;
    let fields: Vec<&str> = violations.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(fields, vec!["name", "email"], "both failures reported together");

    Ok(())
}

#[tokio::test]
async fn short_passwords_are_rejected_with_the_field_named() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool).await?;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"name": "Ada", "email": "ada@example.com", "password": "short"}).to_string(),
        ))?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let violations = violations(resp).await?;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].0, "password");

    Ok(())
}

#[tokio::test]
async fn invoice_creation_enumerates_all_bad_fields() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    // Register a trader through the API to get a token.
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"name": "Ada", "email": "ada@example.com", "password": "longenough1"}).to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let auth: serde_json::Value = serde_json::from_slice(&bytes)?;
    let token = auth["token"].as_str().context("token")?.to_string();

    let vendor = common::insert_vendor(&pool, "Acme").await?;
    let req = Request::builder()
        .method("POST")
        .uri("/invoices")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            json!({
                "vendor_id": vendor,
                "invoice_number": "   ",
                "quantity": 0.0,
                "unit_price": -3.0,
                "due_date": "2026-10-01T00:00:00Z"
            })
            .to_string(),
        ))?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let violations = violations(resp).await?;
    let fields: Vec<&str> = violations.iter().map(|(f, _)| f.as_str()).collect();
    assert_eq!(fields, vec!["invoice_number", "quantity", "unit_price"]);

    Ok(())
}

#[tokio::test]
async fn admin_creation_with_unknown_role_leaves_no_account_behind() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    let head =
        common::staff_with_role(&pool, "head@example.com", crediflow::authz::roles::HEAD_OF_CREDIT)
            .await?;
    let token = crediflow::jwt::JwtConfig::from_env()?.encode(head)?;

    let req = Request::builder()
        .method("POST")
        .uri("/admin/admins")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            json!({"name": "Nia", "email": "nia@example.com", "password": "longenough1", "role": "no_such_role"})
                .to_string(),
        ))?;
    let resp = app.oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let violations = violations(resp).await?;
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].0, "role");

    // The rejected request must not have inserted a role-less principal.
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM principals WHERE email = ?")
        .bind("nia@example.com")
        .fetch_one(&pool)
        .await?;
    assert_eq!(orphans, 0);

    Ok(())
}

#[tokio::test]
async fn duplicate_registration_conflicts() -> Result<()> {
    let (_dir, pool) = common::setup_pool().await?;
    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool).await?;

    let payload = json!({"name": "Ada", "email": "ada@example.com", "password": "longenough1"});
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))?;
    assert_eq!(app.clone().oneshot(req).await?.status(), StatusCode::CREATED);

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))?;
    assert_eq!(app.oneshot(req).await?.status(), StatusCode::CONFLICT);

    Ok(())
}
