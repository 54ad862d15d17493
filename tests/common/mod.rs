#![allow(dead_code)]

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use uuid::Uuid;

use crediflow::authz;

/// File-backed temp database with migrations applied and the permission
/// catalog seeded. Keep the TempDir alive for the duration of the test.
pub async fn setup_pool() -> Result<(TempDir, SqlitePool)> {
    let dir = TempDir::new().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    crediflow::db::migrate(&pool).await?;
    authz::seed_roles_and_permissions(&pool)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    Ok((dir, pool))
}

pub async fn insert_principal(pool: &SqlitePool, kind: &str, email: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO principals (id, kind, name, email, password_hash, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'x', ?, ?)",
    )
    .bind(id)
    .bind(kind)
    .bind(email.split('@').next().unwrap_or("someone"))
    .bind(email)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn staff_with_role(pool: &SqlitePool, email: &str, role: &str) -> Result<Uuid> {
    let id = insert_principal(pool, "staff", email).await?;
    authz::grant_role_claim(pool, id, role)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(id)
}

pub async fn insert_vendor(pool: &SqlitePool, name: &str) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO vendors (id, name, contact_email, created_at) VALUES (?, ?, NULL, ?)")
        .bind(id)
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(id)
}

pub async fn insert_invoice(
    pool: &SqlitePool,
    user_id: Uuid,
    vendor_id: Uuid,
    number: &str,
    total: f64,
    status: &str,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO invoices (id, user_id, vendor_id, invoice_number, quantity, unit_price, total_amount, due_date, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(vendor_id)
    .bind(number)
    .bind(total)
    .bind(total)
    .bind(now)
    .bind(status)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn insert_milestone(
    pool: &SqlitePool,
    invoice_id: Uuid,
    user_id: Uuid,
    amount: f64,
    status: &str,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO milestones (id, invoice_id, user_id, description, payment_amount, due_date, status, created_at, updated_at)
         VALUES (?, ?, ?, 'delivery milestone', ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(invoice_id)
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .bind(status)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn invoice_status(pool: &SqlitePool, id: Uuid) -> Result<String> {
    Ok(sqlx::query_scalar("SELECT status FROM invoices WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?)
}

pub async fn milestone_status(pool: &SqlitePool, id: Uuid) -> Result<String> {
    Ok(sqlx::query_scalar("SELECT status FROM milestones WHERE id = ?")
        .bind(id)
        .fetch_one(pool)
        .await?)
}
