use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::status::ReviewStatus;
use crate::errors::{AppError, AppResult};

/// The four entity kinds sharing the PENDING -> APPROVED/REJECTED review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewEntity {
    Invoice,
    Milestone,
    FundingRequest,
    KycDocument,
}

impl ReviewEntity {
    pub fn table(&self) -> &'static str {
        match self {
            ReviewEntity::Invoice => "invoices",
            ReviewEntity::Milestone => "milestones",
            ReviewEntity::FundingRequest => "funding_requests",
            ReviewEntity::KycDocument => "kyc_documents",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReviewEntity::Invoice => "invoice",
            ReviewEntity::Milestone => "milestone",
            ReviewEntity::FundingRequest => "funding request",
            ReviewEntity::KycDocument => "KYC document",
        }
    }
}

/// Apply an ordinary review transition: PENDING -> APPROVED or REJECTED.
///
/// `status`, `reviewed_by`, and `review_date` move in one UPDATE guarded by
/// the current status, so the change is all-or-nothing and a concurrent
/// reviewer that loses the race observes the entity already out of PENDING.
pub async fn transition_review(
    pool: &SqlitePool,
    entity: ReviewEntity,
    id: Uuid,
    target: ReviewStatus,
    reviewer: Uuid,
) -> AppResult<()> {
    if !target.is_review_target() {
        return Err(AppError::invalid_transition(format!(
            "{} cannot be reviewed into {target}",
            entity.label()
        )));
    }

    let now = Utc::now();
    let sql = format!(
        "UPDATE {} SET status = ?, reviewed_by = ?, review_date = ?, updated_at = ?
         WHERE id = ? AND status = 'PENDING' AND deleted_at IS NULL",
        entity.table()
    );

    let result = sqlx::query(&sql)
        .bind(target.as_str())
        .bind(reviewer)
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        // Distinguish a missing/deleted entity from one already reviewed.
        let current = fetch_status(pool, entity, id).await?;
        return match current {
            None => Err(AppError::not_found(format!("{} not found", entity.label()))),
            Some(status) => Err(AppError::invalid_transition(format!(
                "{} is {status}, expected PENDING",
                entity.label()
            ))),
        };
    }

    tracing::info!(entity = entity.label(), %id, status = %target, %reviewer, "review transition applied");
    Ok(())
}

/// Current status of a non-deleted row, or None if absent/soft-deleted.
pub async fn fetch_status(
    pool: &SqlitePool,
    entity: ReviewEntity,
    id: Uuid,
) -> AppResult<Option<ReviewStatus>> {
    let sql = format!(
        "SELECT status FROM {} WHERE id = ? AND deleted_at IS NULL",
        entity.table()
    );
    let status: Option<String> = sqlx::query_scalar(&sql).bind(id).fetch_optional(pool).await?;
    status.map(|s| ReviewStatus::parse(&s)).transpose()
}
