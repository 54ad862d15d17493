use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

// =============================================================================
// PERMISSION
// =============================================================================

/// Immutable `(module, action)` tuple. `name` is the derived display form
/// `module.action`; the `action` string alone is the authorization token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Permission {
    pub id: Uuid,
    pub module: String,
    pub action: String,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Permission {
    fn entity_type() -> &'static str {
        "permission"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbPermission {
    pub id: Uuid,
    pub module: String,
    pub action: String,
    pub name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbPermission> for Permission {
    fn from(db: DbPermission) -> Self {
        Permission {
            id: db.id,
            module: db.module,
            action: db.action,
            name: db.name,
            active: db.active,
            created_at: db.created_at,
        }
    }
}

// =============================================================================
// ROLE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for Role {
    fn entity_type() -> &'static str {
        "role"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRole {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DbRole> for Role {
    fn from(db: DbRole) -> Self {
        Role {
            id: db.id,
            name: db.name,
            description: db.description,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "collections_supervisor")]
    pub name: String,
    pub description: Option<String>,
    /// Permission ids to bundle into the role
    pub permission_ids: Vec<Uuid>,
}

// =============================================================================
// CLAIM
// =============================================================================

/// What a claim grants: a whole role (by name) or one permission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClaimGrant {
    Role { role_name: String },
    Permission { permission_id: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claim {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub grant: ClaimGrant,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Loggable for Claim {
    fn entity_type() -> &'static str {
        "claim"
    }
    fn subject_id(&self) -> Uuid {
        self.principal_id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbClaim {
    pub id: Uuid,
    pub principal_id: Uuid,
    pub claim_type: String,
    pub role_name: Option<String>,
    pub permission_id: Option<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbClaim> for Claim {
    type Error = AppError;

    fn try_from(db: DbClaim) -> Result<Self, Self::Error> {
        let grant = match db.claim_type.as_str() {
            "role" => ClaimGrant::Role {
                role_name: db
                    .role_name
                    .ok_or_else(|| AppError::internal("role claim missing role_name"))?,
            },
            "permission" => ClaimGrant::Permission {
                permission_id: db
                    .permission_id
                    .ok_or_else(|| AppError::internal("permission claim missing permission_id"))?,
            },
            other => return Err(AppError::internal(format!("unknown claim type: {other}"))),
        };

        Ok(Claim {
            id: db.id,
            principal_id: db.principal_id,
            grant,
            active: db.active,
            created_at: db.created_at,
        })
    }
}

// =============================================================================
// EFFECTIVE PERMISSIONS (computed)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectivePermissions {
    pub principal_id: Uuid,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// The active grants the set was computed from
    pub claims: Vec<Claim>,
}
