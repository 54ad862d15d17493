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
use crate::models::funding::{DbFundingRequest, FundingCreateRequest, FundingRequest};
use crate::utils::utc_now;
use crate::workflow::{self, ReviewEntity, ReviewRequest, ReviewStatus};

#[utoipa::path(
    get,
    path = "/funding-requests",
    tag = "Funding",
    responses((status = 200, description = "List own funding requests", body = [FundingRequest])),
    security(("bearerAuth" = []))
)]
pub async fn list_funding_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<FundingRequest>>> {
    let requests = sqlx::query_as::<_, DbFundingRequest>(
        "SELECT * FROM funding_requests WHERE user_id = ? AND deleted_at IS NULL ORDER BY created_at DESC",
    )
    .bind(auth.principal_id)
    .fetch_all(&state.pool)
    .await?;

    let requests: Vec<FundingRequest> = requests
        .into_iter()
        .map(FundingRequest::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(requests))
}

#[utoipa::path(
    post,
    path = "/funding-requests",
    tag = "Funding",
    request_body = FundingCreateRequest,
    responses((status = 201, description = "Funding request created", body = FundingRequest)),
    security(("bearerAuth" = []))
)]
pub async fn create_funding_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<FundingCreateRequest>,
) -> AppResult<(StatusCode, Json<FundingRequest>)> {
    let mut violations = Vec::new();
    if payload.requested_amount <= 0.0 {
        violations.push(FieldViolation::new("requested_amount", "requested amount must be positive"));
    }
    if payload.your_contribution < 0.0 {
        violations.push(FieldViolation::new("your_contribution", "contribution cannot be negative"));
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }

    let owner: Option<Uuid> = sqlx::query_scalar(
        "SELECT user_id FROM invoices WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(payload.invoice_id)
    .bind(auth.principal_id)
    .fetch_optional(&state.pool)
    .await?;
    if owner.is_none() {
        return Err(AppError::not_found("invoice not found"));
    }

    let now = utc_now();
    let request_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO funding_requests (id, invoice_id, user_id, requested_amount, your_contribution, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, 'PENDING', ?, ?)",
    )
    .bind(request_id)
    .bind(payload.invoice_id)
    .bind(auth.principal_id)
    .bind(payload.requested_amount)
    .bind(payload.your_contribution)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let request: FundingRequest = fetch_funding_request(&state.pool, request_id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "created", Some(auth.principal_id), &request, None, None);

    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    post,
    path = "/funding-requests/{id}/status",
    tag = "Funding",
    params(("id" = Uuid, Path, description = "Funding request id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Funding request reviewed", body = FundingRequest),
        (status = 403, description = "Missing review_funding_requests")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_funding_request(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<FundingRequest>> {
    let session = authz::require(&state.pool, &auth, permissions::REVIEW_FUNDING_REQUESTS).await?;

    workflow::transition_review(
        &state.pool,
        ReviewEntity::FundingRequest,
        id,
        payload.status,
        session.principal_id,
    )
    .await?;

    let request: FundingRequest = fetch_funding_request(&state.pool, id).await?.try_into()?;
    let action = match payload.status {
        ReviewStatus::Approved => "approved",
        _ => "rejected",
    };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(session.principal_id),
        &request,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(request))
}

async fn fetch_funding_request(pool: &SqlitePool, id: Uuid) -> AppResult<DbFundingRequest> {
    sqlx::query_as::<_, DbFundingRequest>(
        "SELECT * FROM funding_requests WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("funding request not found"))
}
