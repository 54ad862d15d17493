use sqlx::SqlitePool;
use uuid::Uuid;

use super::status::ReviewStatus;
use crate::authz::roles;
use crate::errors::{AppError, AppResult};
use crate::events::notifier::{self, NotificationDraft};

/// Everything the collections team needs to pick up a finished invoice.
#[derive(Debug, Clone)]
pub struct CollectionsHandoff {
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub invoice_number: String,
    pub vendor_name: String,
    pub total_amount: f64,
    pub milestone_amounts: Vec<f64>,
    pub recipients: Vec<Uuid>,
}

/// Move an APPROVED invoice to FULLY_DELIVERED.
///
/// Only legal when every non-deleted milestone under the invoice is
/// APPROVED; otherwise fails with a domain error and changes nothing. The
/// completing principal lands in `reviewed_by`/`review_date`; the earlier
/// approval reviewer survives in the activity log. The returned handoff
/// describes the fan-out owed to collections; emitting it is the caller's
/// post-commit concern (`notify_collections`).
pub async fn complete_invoice(
    pool: &SqlitePool,
    invoice_id: Uuid,
    actor: Uuid,
) -> AppResult<CollectionsHandoff> {
    let mut tx = pool.begin().await?;

    let status: Option<String> = sqlx::query_scalar(
        "SELECT status FROM invoices WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(invoice_id)
    .fetch_optional(&mut *tx)
    .await?;

    let status = match status {
        None => return Err(AppError::not_found("invoice not found")),
        Some(s) => ReviewStatus::parse(&s)?,
    };
    if status != ReviewStatus::Approved {
        return Err(AppError::invalid_transition(format!(
            "invoice is {status}, completion requires APPROVED"
        )));
    }

    let unapproved: i64 = sqlx::query_scalar(
        "SELECT COUNT(1) FROM milestones
         WHERE invoice_id = ? AND status != 'APPROVED' AND deleted_at IS NULL",
    )
    .bind(invoice_id)
    .fetch_one(&mut *tx)
    .await?;

    if unapproved > 0 {
        return Err(AppError::invalid_transition(format!(
            "invoice has {unapproved} milestone(s) not yet approved"
        )));
    }

    let now = chrono::Utc::now();
    let result = sqlx::query(
        "UPDATE invoices SET status = 'FULLY_DELIVERED', reviewed_by = ?, review_date = ?, updated_at = ?
         WHERE id = ? AND status = 'APPROVED' AND deleted_at IS NULL",
    )
    .bind(actor)
    .bind(now)
    .bind(now)
    .bind(invoice_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        // Raced with another completion inside the same window.
        return Err(AppError::conflict("invoice was concurrently transitioned"));
    }

    tx.commit().await?;
    tracing::info!(%invoice_id, "invoice fully delivered");

    build_handoff(pool, invoice_id).await
}

async fn build_handoff(pool: &SqlitePool, invoice_id: Uuid) -> AppResult<CollectionsHandoff> {
    let (user_id, invoice_number, vendor_name, total_amount): (Uuid, String, String, f64) =
        sqlx::query_as(
            "SELECT i.user_id, i.invoice_number, v.name, i.total_amount
             FROM invoices i JOIN vendors v ON v.id = i.vendor_id
             WHERE i.id = ?",
        )
        .bind(invoice_id)
        .fetch_one(pool)
        .await?;

    let milestone_amounts: Vec<f64> = sqlx::query_scalar(
        "SELECT payment_amount FROM milestones
         WHERE invoice_id = ? AND deleted_at IS NULL ORDER BY due_date",
    )
    .bind(invoice_id)
    .fetch_all(pool)
    .await?;

    let recipients: Vec<Uuid> = sqlx::query_scalar(
        "SELECT DISTINCT c.principal_id
         FROM claims c
         JOIN principals a ON a.id = c.principal_id AND a.kind = 'staff' AND a.deleted_at IS NULL
         WHERE c.claim_type = 'role' AND c.role_name = ? AND c.active = 1",
    )
    .bind(roles::COLLECTIONS)
    .fetch_all(pool)
    .await?;

    Ok(CollectionsHandoff {
        invoice_id,
        user_id,
        invoice_number,
        vendor_name,
        total_amount,
        milestone_amounts,
        recipients,
    })
}

/// Post-commit fan-out: one in-app notification for the collections team and
/// one queued email per recipient. Best-effort by contract; failures land in
/// the logs, never in the caller's result.
pub async fn notify_collections(pool: &SqlitePool, handoff: &CollectionsHandoff) {
    let link = format!("/admin/invoices/{}", handoff.invoice_id);
    let message = format!(
        "Invoice {} ({}) is fully delivered and ready for collections",
        handoff.invoice_number, handoff.vendor_name
    );

    let draft = NotificationDraft::new(message, "collections_handoff")
        .with_link(link)
        .about_user(handoff.user_id)
        .to_admins(handoff.recipients.iter().copied());

    if let Err(err) = notifier::notify(pool, draft).await {
        tracing::error!(invoice_id = %handoff.invoice_id, error = %err, "collections notification failed");
    }

    let subject = format!("Collections assignment: invoice {}", handoff.invoice_number);
    let body = collections_email_body(handoff);
    for admin_id in &handoff.recipients {
        if let Err(err) = notifier::queue_email(pool, *admin_id, &subject, &body).await {
            tracing::error!(%admin_id, error = %err, "collections email queue failed");
        }
    }
}

fn collections_email_body(handoff: &CollectionsHandoff) -> String {
    let mut body = format!(
        "Invoice {} from vendor {} is fully delivered.\nTotal amount: {:.2}\nMilestones:\n",
        handoff.invoice_number, handoff.vendor_name, handoff.total_amount
    );
    for (idx, amount) in handoff.milestone_amounts.iter().enumerate() {
        body.push_str(&format!("  {}. {:.2}\n", idx + 1, amount));
    }
    body
}
