use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult, FieldViolation};
use crate::jwt::AuthUser;
use crate::models::vendor::{Vendor, VendorCreateRequest};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/vendors",
    tag = "Vendors",
    responses((status = 200, description = "List vendors", body = [Vendor])),
    security(("bearerAuth" = []))
)]
pub async fn list_vendors(State(state): State<AppState>, _auth: AuthUser) -> AppResult<Json<Vec<Vendor>>> {
    let vendors = sqlx::query_as::<_, Vendor>(
        "SELECT id, name, contact_email, created_at, deleted_at FROM vendors WHERE deleted_at IS NULL ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(vendors))
}

#[utoipa::path(
    post,
    path = "/vendors",
    tag = "Vendors",
    request_body = VendorCreateRequest,
    responses((status = 201, description = "Vendor created", body = Vendor)),
    security(("bearerAuth" = []))
)]
pub async fn create_vendor(
    State(state): State<AppState>,
    _auth: AuthUser,
    Json(payload): Json<VendorCreateRequest>,
) -> AppResult<(StatusCode, Json<Vendor>)> {
    if payload.name.trim().is_empty() {
        return Err(AppError::validation(vec![FieldViolation::new("name", "name is required")]));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query("INSERT INTO vendors (id, name, contact_email, created_at) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(&payload.name)
        .bind(&payload.contact_email)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let vendor = Vendor {
        id,
        name: payload.name,
        contact_email: payload.contact_email,
        created_at: now,
        deleted_at: None,
    };

    Ok((StatusCode::CREATED, Json(vendor)))
}
