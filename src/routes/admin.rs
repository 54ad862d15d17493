//! Staff administration: admin accounts, roles, user lifecycle.
//!
//! Every endpoint here runs through the authorization gate; RBAC changes are
//! logged with Critical severity.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{self, permissions};
use crate::errors::{AppError, AppResult, FieldViolation};
use crate::events::{log_activity_with_context, RequestContext};
use crate::jwt::AuthUser;
use crate::models::principal::{
    AdminCreateRequest, AdminRoleUpdateRequest, AdminSummary, DbPrincipal, PasswordResetResponse,
    Principal, PrincipalKind, UserStatusUpdateRequest,
};
use crate::models::rbac::{
    Claim, DbClaim, DbPermission, DbRole, EffectivePermissions, Permission, Role,
    RoleCreateRequest,
};
use crate::routes::auth::fetch_principal_by_id;
use crate::utils::{generate_temp_password, hash_password, utc_now};

#[utoipa::path(
    post,
    path = "/admin/admins",
    tag = "Admin",
    request_body = AdminCreateRequest,
    responses(
        (status = 201, description = "Staff account created", body = Principal),
        (status = 403, description = "Missing manage_staff")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<AdminCreateRequest>,
) -> AppResult<(StatusCode, Json<Principal>)> {
    let session = authz::require(&state.pool, &auth, permissions::MANAGE_STAFF).await?;

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

    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM principals WHERE email = ? AND deleted_at IS NULL")
            .bind(&payload.email)
            .fetch_one(&state.pool)
            .await?;
    if existing > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    // The role must exist before the account does, or a failed grant would
    // leave a role-less staff principal behind.
    let role_active: Option<i64> = sqlx::query_scalar("SELECT 1 FROM roles WHERE name = ? AND active = 1")
        .bind(&payload.role)
        .fetch_optional(&state.pool)
        .await?;
    if role_active.is_none() {
        return Err(AppError::validation(vec![FieldViolation::new(
            "role",
            "unknown or inactive role",
        )]));
    }

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let admin_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO principals (id, kind, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(admin_id)
    .bind(PrincipalKind::Staff.as_str())
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    authz::grant_role_claim(&state.pool, admin_id, &payload.role).await?;

    let principal: Principal = fetch_principal_by_id(&state.pool, admin_id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(session.principal_id),
        &principal,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(principal)))
}

#[utoipa::path(
    post,
    path = "/admin/roles",
    tag = "Admin",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = Role),
        (status = 403, description = "Missing manage_roles")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Json(payload): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    let session = authz::require(&state.pool, &auth, permissions::MANAGE_ROLES).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::validation(vec![FieldViolation::new("name", "role name is required")]));
    }

    let role_id = authz::upsert_role(
        &state.pool,
        &payload.name,
        payload.description.as_deref(),
        &payload.permission_ids,
    )
    .await?;

    let role: Role = sqlx::query_as::<_, DbRole>("SELECT * FROM roles WHERE id = ?")
        .bind(role_id)
        .fetch_one(&state.pool)
        .await?
        .into();

    log_activity_with_context(
        &state.event_bus,
        "created",
        Some(session.principal_id),
        &role,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/admin/roles",
    tag = "Admin",
    responses((status = 200, description = "List roles", body = [Role])),
    security(("bearerAuth" = []))
)]
pub async fn list_roles(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Role>>> {
    authz::require(&state.pool, &auth, permissions::MANAGE_ROLES).await?;

    let roles = sqlx::query_as::<_, DbRole>("SELECT * FROM roles ORDER BY name")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(roles.into_iter().map(Role::from).collect()))
}

#[utoipa::path(
    get,
    path = "/admin/permissions",
    tag = "Admin",
    responses((status = 200, description = "List permissions", body = [Permission])),
    security(("bearerAuth" = []))
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<Permission>>> {
    authz::require(&state.pool, &auth, permissions::MANAGE_ROLES).await?;

    let perms = sqlx::query_as::<_, DbPermission>("SELECT * FROM permissions ORDER BY module, action")
        .fetch_all(&state.pool)
        .await?;

    Ok(Json(perms.into_iter().map(Permission::from).collect()))
}

#[utoipa::path(
    put,
    path = "/admin/admins/{id}/role",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Admin id")),
    request_body = AdminRoleUpdateRequest,
    responses((status = 200, description = "Role swapped", body = Principal)),
    security(("bearerAuth" = []))
)]
pub async fn update_admin_role(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdminRoleUpdateRequest>,
) -> AppResult<Json<Principal>> {
    let session = authz::require(&state.pool, &auth, permissions::MANAGE_STAFF).await?;

    let target = fetch_principal_by_id(&state.pool, id).await?;
    if target.kind != PrincipalKind::Staff.as_str() {
        return Err(AppError::validation(vec![FieldViolation::new(
            "id",
            "role assignment applies to staff principals only",
        )]));
    }

    // Swap, not stack: previous role claims go inactive, new one is granted.
    authz::revoke_role_claims(&state.pool, id).await?;
    authz::grant_role_claim(&state.pool, id, &payload.role).await?;

    let principal: Principal = fetch_principal_by_id(&state.pool, id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "role_changed",
        Some(session.principal_id),
        &principal,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(principal))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/status",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserStatusUpdateRequest,
    responses((status = 200, description = "User status updated", body = Principal)),
    security(("bearerAuth" = []))
)]
pub async fn update_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UserStatusUpdateRequest>,
) -> AppResult<Json<Principal>> {
    let session = authz::require(&state.pool, &auth, permissions::MANAGE_USERS).await?;

    let now = utc_now();
    let affected = if payload.active {
        sqlx::query("UPDATE principals SET deleted_at = NULL, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&state.pool)
            .await?
    } else {
        sqlx::query("UPDATE principals SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&state.pool)
            .await?
    };

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    let row = sqlx::query_as::<_, DbPrincipal>("SELECT * FROM principals WHERE id = ?")
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    let principal: Principal = row.try_into()?;

    log_activity_with_context(
        &state.event_bus,
        if payload.active { "reinstated" } else { "deactivated" },
        Some(session.principal_id),
        &principal,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(principal))
}

#[utoipa::path(
    post,
    path = "/admin/users/{id}/reset-password",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, description = "Temporary password issued", body = PasswordResetResponse)),
    security(("bearerAuth" = []))
)]
pub async fn reset_user_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PasswordResetResponse>> {
    authz::require(&state.pool, &auth, permissions::MANAGE_USERS).await?;

    let temporary_password = generate_temp_password();
    let password_hash = hash_password(&temporary_password)?;

    let affected = sqlx::query(
        "UPDATE principals SET password_hash = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(password_hash)
    .bind(utc_now())
    .bind(id)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("user not found"));
    }

    Ok(Json(PasswordResetResponse { temporary_password }))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    responses((status = 200, description = "All trader accounts", body = [Principal])),
    security(("bearerAuth" = []))
)]
pub async fn get_all_users(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Principal>>> {
    authz::require(&state.pool, &auth, permissions::MANAGE_USERS).await?;

    let rows = sqlx::query_as::<_, DbPrincipal>(
        "SELECT * FROM principals WHERE kind = 'trader' ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let users: Vec<Principal> = rows
        .into_iter()
        .map(Principal::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(users))
}

#[utoipa::path(
    get,
    path = "/admin/admins",
    tag = "Admin",
    responses((status = 200, description = "All staff accounts with roles", body = [AdminSummary])),
    security(("bearerAuth" = []))
)]
pub async fn get_all_admins(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<AdminSummary>>> {
    authz::require(&state.pool, &auth, permissions::MANAGE_STAFF).await?;

    let rows = sqlx::query_as::<_, DbPrincipal>(
        "SELECT * FROM principals WHERE kind = 'staff' AND deleted_at IS NULL ORDER BY created_at",
    )
    .fetch_all(&state.pool)
    .await?;

    let mut admins = Vec::with_capacity(rows.len());
    for row in rows {
        let roles: Vec<String> = sqlx::query_scalar(
            "SELECT role_name FROM claims WHERE principal_id = ? AND claim_type = 'role' AND active = 1",
        )
        .bind(row.id)
        .fetch_all(&state.pool)
        .await?;

        admins.push(AdminSummary {
            id: row.id,
            name: row.name,
            email: row.email,
            roles,
            created_at: row.created_at,
        });
    }

    Ok(Json(admins))
}

#[utoipa::path(
    get,
    path = "/admin/admins/{id}/effective-permissions",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Principal id")),
    responses((status = 200, description = "Computed effective permission set", body = EffectivePermissions)),
    security(("bearerAuth" = []))
)]
pub async fn get_effective_permissions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EffectivePermissions>> {
    authz::require(&state.pool, &auth, permissions::MANAGE_STAFF).await?;

    let roles: Vec<String> = sqlx::query_scalar(
        "SELECT role_name FROM claims WHERE principal_id = ? AND claim_type = 'role' AND active = 1",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    let mut permissions: Vec<String> = authz::resolve_effective_permissions(&state.pool, id)
        .await?
        .into_iter()
        .collect();
    permissions.sort();

    // The raw grants behind the computed set, so an operator can see where
    // each permission comes from.
    let claim_rows = sqlx::query_as::<_, DbClaim>(
        "SELECT * FROM claims WHERE principal_id = ? AND active = 1 ORDER BY created_at",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;
    let claims: Vec<Claim> = claim_rows
        .into_iter()
        .map(Claim::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(EffectivePermissions {
        principal_id: id,
        roles,
        permissions,
        claims,
    }))
}
