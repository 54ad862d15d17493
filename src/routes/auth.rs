use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult, FieldViolation};
use crate::events::log_activity;
use crate::jwt::AuthUser;
use crate::models::principal::{
    AuthResponse, DbPrincipal, LoginRequest, Principal, PrincipalKind, RegisterRequest,
};
use crate::utils::{hash_password, utc_now, verify_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Trader registered", body = AuthResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let mut violations = Vec::new();
    if payload.name.trim().is_empty() {
        violations.push(FieldViolation::new("name", "name is required"));
    }
    if !payload.email.contains('@') {
        violations.push(FieldViolation::new("email", "email is not valid"));
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }

    ensure_email_available(&state.pool, &payload.email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let principal_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO principals (id, kind, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(principal_id)
    .bind(PrincipalKind::Trader.as_str())
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let principal: Principal = fetch_principal_by_id(&state.pool, principal_id).await?.try_into()?;
    let token = state.jwt.encode(principal.id)?;

    log_activity(&state.event_bus, "registered", Some(principal.id), &principal);

    Ok((StatusCode::CREATED, Json(AuthResponse { token, principal })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let db_principal = sqlx::query_as::<_, DbPrincipal>(
        "SELECT id, kind, name, email, password_hash, created_at, updated_at, deleted_at FROM principals WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&payload.email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthenticated("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_principal.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthenticated("invalid credentials"));
    }

    let token = state.jwt.encode(db_principal.id)?;
    let principal: Principal = db_principal.try_into()?;

    Ok(Json(AuthResponse { token, principal }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current principal", body = Principal)),
    security(("bearerAuth" = []))
)]
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Principal>> {
    let principal: Principal = fetch_principal_by_id(&state.pool, auth.principal_id)
        .await?
        .try_into()?;
    Ok(Json(principal))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM principals WHERE email = ? AND deleted_at IS NULL")
            .bind(email)
            .fetch_one(pool)
            .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

pub(crate) async fn fetch_principal_by_id(pool: &SqlitePool, principal_id: Uuid) -> AppResult<DbPrincipal> {
    sqlx::query_as::<_, DbPrincipal>(
        "SELECT id, kind, name, email, password_hash, created_at, updated_at, deleted_at FROM principals WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(principal_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("principal not found"))
}
