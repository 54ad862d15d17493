use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

/// Route an invoice to a Credit Ops Lead. Reassignment overwrites both
/// fields; prior assignees survive only in the activity log.
pub async fn assign_invoice_to_lead(
    pool: &SqlitePool,
    invoice_id: Uuid,
    lead_admin_id: Uuid,
    by_admin_id: Uuid,
) -> AppResult<()> {
    ensure_staff(pool, lead_admin_id).await?;
    assign(pool, "invoices", invoice_id, lead_admin_id, by_admin_id, "invoice").await
}

/// Route a milestone to a Credit Ops Analyst.
pub async fn assign_milestone_to_analyst(
    pool: &SqlitePool,
    milestone_id: Uuid,
    analyst_admin_id: Uuid,
    by_admin_id: Uuid,
) -> AppResult<()> {
    ensure_staff(pool, analyst_admin_id).await?;
    assign(pool, "milestones", milestone_id, analyst_admin_id, by_admin_id, "milestone").await
}

async fn assign(
    pool: &SqlitePool,
    table: &str,
    id: Uuid,
    assignee: Uuid,
    assigner: Uuid,
    label: &str,
) -> AppResult<()> {
    let sql = format!(
        "UPDATE {table} SET assigned_to = ?, assigned_by = ?, updated_at = ?
         WHERE id = ? AND deleted_at IS NULL"
    );

    let result = sqlx::query(&sql)
        .bind(assignee)
        .bind(assigner)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("{label} not found")));
    }

    tracing::info!(%id, %assignee, %assigner, entity = label, "assignment recorded");
    Ok(())
}

/// Assignees must be active staff principals.
async fn ensure_staff(pool: &SqlitePool, principal_id: Uuid) -> AppResult<()> {
    let kind: Option<String> = sqlx::query_scalar(
        "SELECT kind FROM principals WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(principal_id)
    .fetch_optional(pool)
    .await?;

    match kind.as_deref() {
        Some("staff") => Ok(()),
        Some(_) => Err(AppError::validation(vec![crate::errors::FieldViolation::new(
            "assignee_id",
            "assignee must be a staff principal",
        )])),
        None => Err(AppError::not_found("assignee not found")),
    }
}
