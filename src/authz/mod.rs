//! Authorization core: permission resolver, gate, and the role/permission
//! registry.
//!
//! Permissions are opaque snake_case action strings. A principal's effective
//! set is the union of everything reachable from its active claims (direct
//! permission grants plus every active permission of every active role
//! claim). The gate re-resolves on every call: claims can be revoked at any
//! time and a stale allow decision is a security defect.

mod gate;
mod registry;
mod resolver;

pub use gate::{guard, require, SessionContext};
pub use registry::{
    deactivate_role, grant_permission_claim, grant_role_claim, revoke_role_claims,
    seed_roles_and_permissions, upsert_permission, upsert_role,
};
pub use resolver::resolve_effective_permissions;

/// Built-in role names seeded at startup. New roles can be created
/// dynamically; these are only the well-known ones.
pub mod roles {
    pub const HEAD_OF_CREDIT: &str = "head_of_credit";
    pub const CREDIT_OPS_LEAD: &str = "credit_ops_lead";
    pub const CREDIT_OPS_ANALYST: &str = "credit_ops_analyst";
    pub const FINANCE: &str = "finance";
    pub const COLLECTIONS: &str = "collections";
}

/// Well-known permission action strings.
pub mod permissions {
    // Invoices
    pub const MANAGE_ASSIGNED_INVOICES: &str = "manage_assigned_invoices";
    pub const APPROVE_INVOICES: &str = "approve_invoices";
    pub const VIEW_INVOICES: &str = "view_invoices";

    // Milestones
    pub const APPROVE_OR_EDIT_MILESTONES: &str = "approve_or_edit_milestones";
    pub const COSIGN_MILESTONES: &str = "cosign_milestones";

    // Funding requests
    pub const REVIEW_FUNDING_REQUESTS: &str = "review_funding_requests";

    // KYC
    pub const REVIEW_KYC_DOCUMENTS: &str = "review_kyc_documents";

    // Pipeline oversight
    pub const OVERSEE_CREDIT_OPERATIONS_PIPELINE: &str = "oversee_credit_operations_pipeline";

    // Staff administration
    pub const MANAGE_STAFF: &str = "manage_staff";
    pub const VIEW_STAFF_WORKLOAD: &str = "view_staff_workload";
    pub const MANAGE_ROLES: &str = "manage_roles";
    pub const MANAGE_USERS: &str = "manage_users";
}
