use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// What a note can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoteEntityType {
    Invoice,
    Milestone,
    FundingRequest,
    Kyc,
}

impl NoteEntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteEntityType::Invoice => "invoice",
            NoteEntityType::Milestone => "milestone",
            NoteEntityType::FundingRequest => "funding_request",
            NoteEntityType::Kyc => "kyc",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "invoice" => Ok(NoteEntityType::Invoice),
            "milestone" => Ok(NoteEntityType::Milestone),
            "funding_request" => Ok(NoteEntityType::FundingRequest),
            "kyc" => Ok(NoteEntityType::Kyc),
            other => Err(AppError::internal(format!("unknown note entity type: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EntityNote {
    pub id: Uuid,
    pub entity_type: NoteEntityType,
    pub entity_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbEntityNote {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub author_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbEntityNote> for EntityNote {
    type Error = AppError;

    fn try_from(db: DbEntityNote) -> Result<Self, Self::Error> {
        Ok(EntityNote {
            id: db.id,
            entity_type: NoteEntityType::parse(&db.entity_type)?,
            entity_id: db.entity_id,
            author_id: db.author_id,
            body: db.body,
            created_at: db.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NoteCreateRequest {
    pub entity_type: NoteEntityType,
    pub entity_id: Uuid,
    pub body: String,
}
