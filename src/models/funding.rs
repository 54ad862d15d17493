use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::workflow::status::ReviewStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FundingRequest {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub requested_amount: f64,
    pub your_contribution: f64,
    pub status: ReviewStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for FundingRequest {
    fn entity_type() -> &'static str {
        "funding_request"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbFundingRequest {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub user_id: Uuid,
    pub requested_amount: f64,
    pub your_contribution: f64,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbFundingRequest> for FundingRequest {
    type Error = AppError;

    fn try_from(db: DbFundingRequest) -> Result<Self, Self::Error> {
        Ok(FundingRequest {
            id: db.id,
            invoice_id: db.invoice_id,
            user_id: db.user_id,
            requested_amount: db.requested_amount,
            your_contribution: db.your_contribution,
            status: ReviewStatus::parse(&db.status)?,
            reviewed_by: db.reviewed_by,
            review_date: db.review_date,
            created_at: db.created_at,
            updated_at: db.updated_at,
            deleted_at: db.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FundingCreateRequest {
    pub invoice_id: Uuid,
    pub requested_amount: f64,
    pub your_contribution: f64,
}
