use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;

/// Traders submit invoices; staff review them through the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Trader,
    Staff,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Trader => "trader",
            PrincipalKind::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Result<Self, AppError> {
        match s {
            "trader" => Ok(PrincipalKind::Trader),
            "staff" => Ok(PrincipalKind::Staff),
            other => Err(AppError::internal(format!("unknown principal kind: {other}"))),
        }
    }
}

/// Public view of a principal; never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for Principal {
    fn entity_type() -> &'static str {
        "principal"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPrincipal {
    pub id: Uuid,
    pub kind: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbPrincipal> for Principal {
    type Error = AppError;

    fn try_from(value: DbPrincipal) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: value.id,
            kind: PrincipalKind::parse(&value.kind)?,
            name: value.name,
            email: value.email,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub principal: Principal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminCreateRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// Role name the new staff member starts with
    #[schema(example = "credit_ops_analyst")]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminRoleUpdateRequest {
    #[schema(example = "credit_ops_lead")]
    pub role: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserStatusUpdateRequest {
    /// false soft-deletes the account; true reinstates it
    pub active: bool,
}

/// Returned exactly once from resetUserPassword; the hash is what persists.
#[derive(Debug, Serialize, ToSchema)]
pub struct PasswordResetResponse {
    pub temporary_password: String,
}

/// Staff listing entry with the role names currently claimed.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}
