use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::workflow::status::ReviewStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KycDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    /// Opaque pointer into the storage provider; never fetched by the core.
    pub document_url: String,
    pub status: ReviewStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for KycDocument {
    fn entity_type() -> &'static str {
        "kyc_document"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbKycDocument {
    pub id: Uuid,
    pub user_id: Uuid,
    pub document_type: String,
    pub document_url: String,
    pub status: String,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbKycDocument> for KycDocument {
    type Error = AppError;

    fn try_from(db: DbKycDocument) -> Result<Self, Self::Error> {
        Ok(KycDocument {
            id: db.id,
            user_id: db.user_id,
            document_type: db.document_type,
            document_url: db.document_url,
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
pub struct KycSubmitRequest {
    #[schema(example = "passport")]
    pub document_type: String,
    pub document_url: String,
}
