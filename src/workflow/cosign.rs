use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::review::{fetch_status, ReviewEntity};
use super::status::ReviewStatus;
use crate::errors::{AppError, AppResult};

/// Secondary staff approval on top of a milestone's primary approval.
///
/// Requires `status = APPROVED` and `is_cosigned = 0`; a second call fails
/// with `InvalidTransition` and leaves `cosigned_by` untouched.
pub async fn cosign_milestone(pool: &SqlitePool, milestone_id: Uuid, by_admin_id: Uuid) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE milestones SET is_cosigned = 1, cosigned_by = ?, updated_at = ?
         WHERE id = ? AND status = 'APPROVED' AND is_cosigned = 0 AND deleted_at IS NULL",
    )
    .bind(by_admin_id)
    .bind(Utc::now())
    .bind(milestone_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let current = fetch_status(pool, ReviewEntity::Milestone, milestone_id).await?;
        return match current {
            None => Err(AppError::not_found("milestone not found")),
            Some(ReviewStatus::Approved) => {
                Err(AppError::invalid_transition("milestone already co-signed"))
            }
            Some(status) => Err(AppError::invalid_transition(format!(
                "milestone is {status}, co-sign requires APPROVED"
            ))),
        };
    }

    tracing::info!(%milestone_id, %by_admin_id, "milestone co-signed");
    Ok(())
}
