//! Read-side workload rollup for staff reporting.
//!
//! Groups each staff member's assigned invoices, reviewed milestones and
//! reviewed funding requests by status in a single pass. REJECTED rows
//! count toward `rejected` like any other status; soft-deleted rows never
//! count at all.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, permissions};
use crate::errors::AppResult;
use crate::jwt::AuthUser;

#[derive(Debug, Deserialize, IntoParams)]
pub struct WorkloadQuery {
    /// Restrict to one staff member
    pub staff_id: Option<Uuid>,
    /// Restrict to one status (e.g. PENDING)
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Count and amount sum for one status bucket.
#[derive(Debug, Default, Clone, Serialize, ToSchema)]
pub struct StatusBucket {
    pub count: i64,
    pub total_amount: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StaffWorkload {
    pub staff_id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub assigned_invoices: BTreeMap<String, StatusBucket>,
    pub reviewed_milestones: BTreeMap<String, StatusBucket>,
    pub reviewed_funding_requests: BTreeMap<String, StatusBucket>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkloadPage {
    pub staffs: Vec<StaffWorkload>,
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

#[derive(sqlx::FromRow)]
struct StaffRow {
    id: Uuid,
    name: String,
    email: String,
}

#[derive(sqlx::FromRow)]
struct BucketRow {
    status: String,
    count: i64,
    total_amount: Option<f64>,
}

async fn status_buckets(
    pool: &SqlitePool,
    table: &str,
    link_column: &str,
    amount_column: &str,
    staff_id: Uuid,
    status: Option<&str>,
) -> AppResult<BTreeMap<String, StatusBucket>> {
    let mut sql = format!(
        "SELECT status, COUNT(1) AS count, SUM({amount_column}) AS total_amount
         FROM {table}
         WHERE {link_column} = ? AND deleted_at IS NULL"
    );
    if status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" GROUP BY status");

    let mut query = sqlx::query_as::<_, BucketRow>(&sql).bind(staff_id);
    if let Some(status) = status {
        query = query.bind(status);
    }
    let rows = query.fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|r| {
            (
                r.status,
                StatusBucket {
                    count: r.count,
                    total_amount: r.total_amount.unwrap_or(0.0),
                },
            )
        })
        .collect())
}

#[utoipa::path(
    get,
    path = "/admin/workload",
    tag = "Admin",
    params(WorkloadQuery),
    responses((status = 200, description = "Per-staff workload rollup", body = WorkloadPage)),
    security(("bearerAuth" = []))
)]
pub async fn get_staffs_workload(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<WorkloadQuery>,
) -> AppResult<Json<WorkloadPage>> {
    authz::require(&state.pool, &auth, permissions::VIEW_STAFF_WORKLOAD).await?;

    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);
    let status = params.status.as_deref();

    let (total, staff_rows) = if let Some(staff_id) = params.staff_id {
        let rows = sqlx::query_as::<_, StaffRow>(
            "SELECT id, name, email FROM principals
             WHERE id = ? AND kind = 'staff' AND deleted_at IS NULL",
        )
        .bind(staff_id)
        .fetch_all(&state.pool)
        .await?;
        (rows.len() as i64, rows)
    } else {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM principals WHERE kind = 'staff' AND deleted_at IS NULL",
        )
        .fetch_one(&state.pool)
        .await?;
        let rows = sqlx::query_as::<_, StaffRow>(
            "SELECT id, name, email FROM principals
             WHERE kind = 'staff' AND deleted_at IS NULL
             ORDER BY name LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.pool)
        .await?;
        (total, rows)
    };

    let mut staffs = Vec::with_capacity(staff_rows.len());
    for staff in staff_rows {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT role_name FROM claims
             WHERE principal_id = ? AND claim_type = 'role' AND active = 1",
        )
        .bind(staff.id)
        .fetch_all(&state.pool)
        .await?;

        let assigned_invoices =
            status_buckets(&state.pool, "invoices", "assigned_to", "total_amount", staff.id, status)
                .await?;
        let reviewed_milestones =
            status_buckets(&state.pool, "milestones", "reviewed_by", "payment_amount", staff.id, status)
                .await?;
        let reviewed_funding_requests = status_buckets(
            &state.pool,
            "funding_requests",
            "reviewed_by",
            "requested_amount",
            staff.id,
            status,
        )
        .await?;

        staffs.push(StaffWorkload {
            staff_id: staff.id,
            name: staff.name,
            email: staff.email,
            roles,
            assigned_invoices,
            reviewed_milestones,
            reviewed_funding_requests,
        });
    }

    Ok(Json(WorkloadPage {
        staffs,
        limit,
        offset,
        total,
    }))
}
