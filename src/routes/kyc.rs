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
use crate::models::kyc::{DbKycDocument, KycDocument, KycSubmitRequest};
use crate::utils::utc_now;
use crate::workflow::{self, ReviewEntity, ReviewRequest, ReviewStatus};

#[utoipa::path(
    get,
    path = "/kyc",
    tag = "KYC",
    responses((status = 200, description = "List own KYC documents", body = [KycDocument])),
    security(("bearerAuth" = []))
)]
pub async fn list_kyc_documents(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<KycDocument>>> {
    let documents = sqlx::query_as::<_, DbKycDocument>(
        "SELECT * FROM kyc_documents WHERE user_id = ? AND deleted_at IS NULL ORDER BY document_type",
    )
    .bind(auth.principal_id)
    .fetch_all(&state.pool)
    .await?;

    let documents: Vec<KycDocument> = documents
        .into_iter()
        .map(KycDocument::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(documents))
}

#[utoipa::path(
    post,
    path = "/kyc",
    tag = "KYC",
    request_body = KycSubmitRequest,
    responses((status = 201, description = "Document submitted", body = KycDocument)),
    security(("bearerAuth" = []))
)]
pub async fn submit_kyc_document(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<KycSubmitRequest>,
) -> AppResult<(StatusCode, Json<KycDocument>)> {
    let mut violations = Vec::new();
    if payload.document_type.trim().is_empty() {
        violations.push(FieldViolation::new("document_type", "document type is required"));
    }
    if payload.document_url.trim().is_empty() {
        violations.push(FieldViolation::new("document_url", "document url is required"));
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }

    let now = utc_now();

    // One document per (user, type): resubmission replaces the file and
    // drops the document back to PENDING for a fresh review.
    sqlx::query(
        "INSERT INTO kyc_documents (id, user_id, document_type, document_url, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'PENDING', ?, ?)
         ON CONFLICT (user_id, document_type) DO UPDATE SET
             document_url = excluded.document_url,
             status = 'PENDING',
             reviewed_by = NULL,
             review_date = NULL,
             deleted_at = NULL,
             updated_at = excluded.updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(auth.principal_id)
    .bind(&payload.document_type)
    .bind(&payload.document_url)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let document: KycDocument =
        fetch_kyc_by_type(&state.pool, auth.principal_id, &payload.document_type)
            .await?
            .try_into()?;
    log_activity_with_context(&state.event_bus, "submitted", Some(auth.principal_id), &document, None, None);

    Ok((StatusCode::CREATED, Json(document)))
}

#[utoipa::path(
    post,
    path = "/kyc/{id}/status",
    tag = "KYC",
    params(("id" = Uuid, Path, description = "KYC document id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "KYC document reviewed", body = KycDocument),
        (status = 403, description = "Missing review_kyc_documents")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_kyc_document(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<KycDocument>> {
    let session = authz::require(&state.pool, &auth, permissions::REVIEW_KYC_DOCUMENTS).await?;

    workflow::transition_review(
        &state.pool,
        ReviewEntity::KycDocument,
        id,
        payload.status,
        session.principal_id,
    )
    .await?;

    let document: KycDocument = fetch_kyc(&state.pool, id).await?.try_into()?;
    let action = match payload.status {
        ReviewStatus::Approved => "approved",
        _ => "rejected",
    };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(session.principal_id),
        &document,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(document))
}

async fn fetch_kyc(pool: &SqlitePool, id: Uuid) -> AppResult<DbKycDocument> {
    sqlx::query_as::<_, DbKycDocument>(
        "SELECT * FROM kyc_documents WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("KYC document not found"))
}

async fn fetch_kyc_by_type(pool: &SqlitePool, user_id: Uuid, document_type: &str) -> AppResult<DbKycDocument> {
    sqlx::query_as::<_, DbKycDocument>(
        "SELECT * FROM kyc_documents WHERE user_id = ? AND document_type = ? AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(document_type)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("KYC document not found"))
}
