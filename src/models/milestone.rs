use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::workflow::status::ReviewStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Milestone {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub payment_amount: f64,
    pub due_date: DateTime<Utc>,
    pub status: ReviewStatus,
    pub is_cosigned: bool,
    pub cosigned_by: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for Milestone {
    fn entity_type() -> &'static str {
        "milestone"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbMilestone {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
    pub payment_amount: f64,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub is_cosigned: bool,
    pub cosigned_by: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbMilestone> for Milestone {
    type Error = AppError;

    fn try_from(db: DbMilestone) -> Result<Self, Self::Error> {
        Ok(Milestone {
            id: db.id,
            invoice_id: db.invoice_id,
            user_id: db.user_id,
            description: db.description,
            payment_amount: db.payment_amount,
            due_date: db.due_date,
            status: ReviewStatus::parse(&db.status)?,
            is_cosigned: db.is_cosigned,
            cosigned_by: db.cosigned_by,
            assigned_to: db.assigned_to,
            assigned_by: db.assigned_by,
            reviewed_by: db.reviewed_by,
            review_date: db.review_date,
            created_at: db.created_at,
            updated_at: db.updated_at,
            deleted_at: db.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MilestoneCreateRequest {
    #[schema(example = "First container shipment delivered")]
    pub description: String,
    pub payment_amount: f64,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MilestoneUpdateRequest {
    pub description: Option<String>,
    pub payment_amount: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
}
