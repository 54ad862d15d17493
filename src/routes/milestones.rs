use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, permissions};
use crate::errors::{AppError, AppResult, FieldViolation};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::invoice::AssignRequest;
use crate::models::milestone::{
    DbMilestone, Milestone, MilestoneCreateRequest, MilestoneUpdateRequest,
};
use crate::utils::utc_now;
use crate::workflow::{self, ReviewEntity, ReviewRequest, ReviewStatus};

#[utoipa::path(
    get,
    path = "/invoices/{invoice_id}/milestones",
    tag = "Milestones",
    params(("invoice_id" = Uuid, Path, description = "Invoice id")),
    responses((status = 200, description = "List milestones", body = [Milestone])),
    security(("bearerAuth" = []))
)]
pub async fn list_milestones(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
) -> AppResult<Json<Vec<Milestone>>> {
    let owner: Option<Uuid> =
        sqlx::query_scalar("SELECT user_id FROM invoices WHERE id = ? AND deleted_at IS NULL")
            .bind(invoice_id)
            .fetch_optional(&state.pool)
            .await?;
    let owner = owner.ok_or_else(|| AppError::not_found("invoice not found"))?;
    if owner != auth.principal_id {
        authz::require(&state.pool, &auth, permissions::VIEW_INVOICES).await?;
    }

    let milestones = sqlx::query_as::<_, DbMilestone>(
        "SELECT * FROM milestones WHERE invoice_id = ? AND deleted_at IS NULL ORDER BY due_date",
    )
    .bind(invoice_id)
    .fetch_all(&state.pool)
    .await?;

    let milestones: Vec<Milestone> = milestones
        .into_iter()
        .map(Milestone::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(milestones))
}

#[utoipa::path(
    post,
    path = "/invoices/{invoice_id}/milestones",
    tag = "Milestones",
    params(("invoice_id" = Uuid, Path, description = "Invoice id")),
    request_body = MilestoneCreateRequest,
    responses((status = 201, description = "Milestone created", body = Milestone)),
    security(("bearerAuth" = []))
)]
pub async fn create_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<MilestoneCreateRequest>,
) -> AppResult<(StatusCode, Json<Milestone>)> {
    // Milestones belong to the invoice owner.
    let owner: Option<Uuid> = sqlx::query_scalar(
        "SELECT user_id FROM invoices WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(invoice_id)
    .bind(auth.principal_id)
    .fetch_optional(&state.pool)
    .await?;
    if owner.is_none() {
        return Err(AppError::not_found("invoice not found"));
    }

    let mut violations = Vec::new();
    if payload.description.trim().is_empty() {
        violations.push(FieldViolation::new("description", "description is required"));
    }
    if payload.payment_amount <= 0.0 {
        violations.push(FieldViolation::new("payment_amount", "payment amount must be positive"));
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }

    let now = utc_now();
    let milestone_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO milestones (id, invoice_id, user_id, description, payment_amount, due_date, status, is_cosigned, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 'PENDING', 0, ?, ?)",
    )
    .bind(milestone_id)
    .bind(invoice_id)
    .bind(auth.principal_id)
    .bind(&payload.description)
    .bind(payload.payment_amount)
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let milestone: Milestone = fetch_milestone(&state.pool, milestone_id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "created", Some(auth.principal_id), &milestone, None, None);

    Ok((StatusCode::CREATED, Json(milestone)))
}

#[utoipa::path(
    put,
    path = "/milestones/{id}",
    tag = "Milestones",
    params(("id" = Uuid, Path, description = "Milestone id")),
    request_body = MilestoneUpdateRequest,
    responses((status = 200, description = "Milestone updated", body = Milestone)),
    security(("bearerAuth" = []))
)]
pub async fn update_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MilestoneUpdateRequest>,
) -> AppResult<Json<Milestone>> {
    let mut milestone = fetch_owned_milestone(&state.pool, auth.principal_id, id).await?;

    if milestone.status != "PENDING" {
        return Err(AppError::invalid_transition(format!(
            "milestone is {}, only PENDING milestones can be edited",
            milestone.status
        )));
    }

    let mut violations = Vec::new();
    if let Some(description) = payload.description {
        if description.trim().is_empty() {
            violations.push(FieldViolation::new("description", "description is required"));
        }
        milestone.description = description;
    }
    if let Some(payment_amount) = payload.payment_amount {
        if payment_amount <= 0.0 {
            violations.push(FieldViolation::new("payment_amount", "payment amount must be positive"));
        }
        milestone.payment_amount = payment_amount;
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }
    if let Some(due_date) = payload.due_date {
        milestone.due_date = due_date;
    }

    sqlx::query(
        "UPDATE milestones SET description = ?, payment_amount = ?, due_date = ?, updated_at = ?
         WHERE id = ? AND user_id = ? AND status = 'PENDING' AND deleted_at IS NULL",
    )
    .bind(&milestone.description)
    .bind(milestone.payment_amount)
    .bind(milestone.due_date)
    .bind(utc_now())
    .bind(id)
    .bind(auth.principal_id)
    .execute(&state.pool)
    .await?;

    let milestone: Milestone = fetch_milestone(&state.pool, id).await?.try_into()?;
    Ok(Json(milestone))
}

#[utoipa::path(
    delete,
    path = "/milestones/{id}",
    tag = "Milestones",
    params(("id" = Uuid, Path, description = "Milestone id")),
    responses((status = 204, description = "Milestone soft deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let now = utc_now();
    let affected = sqlx::query(
        "UPDATE milestones SET deleted_at = ?, updated_at = ? WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(auth.principal_id)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("milestone not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/milestones/{id}/status",
    tag = "Milestones",
    params(("id" = Uuid, Path, description = "Milestone id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Milestone reviewed", body = Milestone),
        (status = 403, description = "Missing approve_or_edit_milestones")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_milestone_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<Milestone>> {
    let session = authz::require(&state.pool, &auth, permissions::APPROVE_OR_EDIT_MILESTONES).await?;

    workflow::transition_review(&state.pool, ReviewEntity::Milestone, id, payload.status, session.principal_id)
        .await?;

    let milestone: Milestone = fetch_milestone(&state.pool, id).await?.try_into()?;
    let action = match payload.status {
        ReviewStatus::Approved => "approved",
        _ => "rejected",
    };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(session.principal_id),
        &milestone,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(milestone))
}

#[utoipa::path(
    post,
    path = "/milestones/{id}/cosign",
    tag = "Milestones",
    params(("id" = Uuid, Path, description = "Milestone id")),
    responses(
        (status = 200, description = "Milestone co-signed", body = Milestone),
        (status = 422, description = "Not APPROVED or already co-signed")
    ),
    security(("bearerAuth" = []))
)]
pub async fn cosign_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Milestone>> {
    let session = authz::require(&state.pool, &auth, permissions::COSIGN_MILESTONES).await?;

    workflow::cosign_milestone(&state.pool, id, session.principal_id).await?;

    let milestone: Milestone = fetch_milestone(&state.pool, id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "cosigned",
        Some(session.principal_id),
        &milestone,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(milestone))
}

#[utoipa::path(
    post,
    path = "/milestones/{id}/assign",
    tag = "Milestones",
    params(("id" = Uuid, Path, description = "Milestone id")),
    request_body = AssignRequest,
    responses((status = 200, description = "Milestone assigned", body = Milestone)),
    security(("bearerAuth" = []))
)]
pub async fn assign_milestone(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<Milestone>> {
    let session = authz::require(&state.pool, &auth, permissions::MANAGE_ASSIGNED_INVOICES).await?;

    workflow::assign_milestone_to_analyst(&state.pool, id, payload.assignee_id, session.principal_id)
        .await?;

    let milestone: Milestone = fetch_milestone(&state.pool, id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "assigned", Some(session.principal_id), &milestone, None, None);

    Ok(Json(milestone))
}

async fn fetch_milestone(pool: &SqlitePool, milestone_id: Uuid) -> AppResult<DbMilestone> {
    sqlx::query_as::<_, DbMilestone>("SELECT * FROM milestones WHERE id = ? AND deleted_at IS NULL")
        .bind(milestone_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("milestone not found"))
}

async fn fetch_owned_milestone(pool: &SqlitePool, user_id: Uuid, milestone_id: Uuid) -> AppResult<DbMilestone> {
    sqlx::query_as::<_, DbMilestone>(
        "SELECT * FROM milestones WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(milestone_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("milestone not found"))
}
