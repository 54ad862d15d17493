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
use crate::models::invoice::{
    AssignRequest, DbInvoice, Invoice, InvoiceCreateRequest, InvoiceUpdateRequest,
};
use crate::utils::utc_now;
use crate::workflow::{self, ReviewEntity, ReviewRequest, ReviewStatus};

#[utoipa::path(
    get,
    path = "/invoices",
    tag = "Invoices",
    responses((status = 200, description = "List own invoices", body = [Invoice])),
    security(("bearerAuth" = []))
)]
pub async fn list_invoices(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<Invoice>>> {
    let invoices = sqlx::query_as::<_, DbInvoice>(
        "SELECT * FROM invoices WHERE user_id = ? AND deleted_at IS NULL ORDER BY created_at DESC",
    )
    .bind(auth.principal_id)
    .fetch_all(&state.pool)
    .await?;

    let invoices: Vec<Invoice> = invoices
        .into_iter()
        .map(Invoice::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(invoices))
}

#[utoipa::path(
    post,
    path = "/invoices",
    tag = "Invoices",
    request_body = InvoiceCreateRequest,
    responses(
        (status = 201, description = "Invoice created", body = Invoice),
        (status = 400, description = "Validation failure")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<InvoiceCreateRequest>,
) -> AppResult<(StatusCode, Json<Invoice>)> {
    let mut violations = Vec::new();
    if payload.invoice_number.trim().is_empty() {
        violations.push(FieldViolation::new("invoice_number", "invoice number is required"));
    }
    if payload.quantity <= 0.0 {
        violations.push(FieldViolation::new("quantity", "quantity must be positive"));
    }
    if payload.unit_price <= 0.0 {
        violations.push(FieldViolation::new("unit_price", "unit price must be positive"));
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }

    let vendor_exists: i64 =
        sqlx::query_scalar("SELECT COUNT(1) FROM vendors WHERE id = ? AND deleted_at IS NULL")
            .bind(payload.vendor_id)
            .fetch_one(&state.pool)
            .await?;
    if vendor_exists == 0 {
        return Err(AppError::not_found("vendor not found"));
    }

    let now = utc_now();
    let invoice_id = Uuid::new_v4();
    let total_amount = payload.quantity * payload.unit_price;

    sqlx::query(
        "INSERT INTO invoices (id, user_id, vendor_id, invoice_number, quantity, unit_price, total_amount, due_date, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'PENDING', ?, ?)",
    )
    .bind(invoice_id)
    .bind(auth.principal_id)
    .bind(payload.vendor_id)
    .bind(&payload.invoice_number)
    .bind(payload.quantity)
    .bind(payload.unit_price)
    .bind(total_amount)
    .bind(payload.due_date)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let invoice: Invoice = fetch_invoice(&state.pool, invoice_id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "created", Some(auth.principal_id), &invoice, None, None);

    Ok((StatusCode::CREATED, Json(invoice)))
}

#[utoipa::path(
    get,
    path = "/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 200, description = "Invoice detail", body = Invoice)),
    security(("bearerAuth" = []))
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    let invoice: Invoice = fetch_invoice(&state.pool, id).await?.try_into()?;

    // Owners see their own invoices; anyone else needs the view permission.
    if invoice.user_id != auth.principal_id {
        authz::require(&state.pool, &auth, permissions::VIEW_INVOICES).await?;
    }

    Ok(Json(invoice))
}

#[utoipa::path(
    put,
    path = "/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = InvoiceUpdateRequest,
    responses((status = 200, description = "Invoice updated", body = Invoice)),
    security(("bearerAuth" = []))
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<InvoiceUpdateRequest>,
) -> AppResult<Json<Invoice>> {
    let mut invoice = fetch_owned_invoice(&state.pool, auth.principal_id, id).await?;

    if invoice.status != "PENDING" {
        return Err(AppError::invalid_transition(format!(
            "invoice is {}, only PENDING invoices can be edited",
            invoice.status
        )));
    }

    let mut violations = Vec::new();
    if let Some(quantity) = payload.quantity {
        if quantity <= 0.0 {
            violations.push(FieldViolation::new("quantity", "quantity must be positive"));
        }
        invoice.quantity = quantity;
    }
    if let Some(unit_price) = payload.unit_price {
        if unit_price <= 0.0 {
            violations.push(FieldViolation::new("unit_price", "unit price must be positive"));
        }
        invoice.unit_price = unit_price;
    }
    if !violations.is_empty() {
        return Err(AppError::validation(violations));
    }
    if let Some(due_date) = payload.due_date {
        invoice.due_date = due_date;
    }

    let now = utc_now();
    let total_amount = invoice.quantity * invoice.unit_price;

    sqlx::query(
        "UPDATE invoices SET quantity = ?, unit_price = ?, total_amount = ?, due_date = ?, updated_at = ?
         WHERE id = ? AND user_id = ? AND status = 'PENDING' AND deleted_at IS NULL",
    )
    .bind(invoice.quantity)
    .bind(invoice.unit_price)
    .bind(total_amount)
    .bind(invoice.due_date)
    .bind(now)
    .bind(id)
    .bind(auth.principal_id)
    .execute(&state.pool)
    .await?;

    let invoice: Invoice = fetch_invoice(&state.pool, id).await?.try_into()?;
    Ok(Json(invoice))
}

#[utoipa::path(
    delete,
    path = "/invoices/{id}",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses((status = 204, description = "Invoice soft deleted")),
    security(("bearerAuth" = []))
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let now = utc_now();
    let affected = sqlx::query(
        "UPDATE invoices SET deleted_at = ?, updated_at = ? WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(auth.principal_id)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("invoice not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/status",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Invoice reviewed", body = Invoice),
        (status = 403, description = "Missing manage_assigned_invoices"),
        (status = 422, description = "Invoice not PENDING")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReviewRequest>,
) -> AppResult<Json<Invoice>> {
    let session = authz::require(&state.pool, &auth, permissions::MANAGE_ASSIGNED_INVOICES).await?;

    workflow::transition_review(&state.pool, ReviewEntity::Invoice, id, payload.status, session.principal_id)
        .await?;

    let invoice: Invoice = fetch_invoice(&state.pool, id).await?.try_into()?;
    let action = match payload.status {
        ReviewStatus::Approved => "approved",
        _ => "rejected",
    };
    log_activity_with_context(
        &state.event_bus,
        action,
        Some(session.principal_id),
        &invoice,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(invoice))
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/complete",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice fully delivered, collections notified", body = Invoice),
        (status = 422, description = "Milestones not all approved")
    ),
    security(("bearerAuth" = []))
)]
pub async fn complete_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Invoice>> {
    let session =
        authz::require(&state.pool, &auth, permissions::OVERSEE_CREDIT_OPERATIONS_PIPELINE).await?;

    let handoff = workflow::complete_invoice(&state.pool, id, session.principal_id).await?;

    // State change is durable; fan-out failures only reach the logs.
    workflow::notify_collections(&state.pool, &handoff).await;

    let invoice: Invoice = fetch_invoice(&state.pool, id).await?.try_into()?;
    log_activity_with_context(
        &state.event_bus,
        "completed",
        Some(session.principal_id),
        &invoice,
        None,
        Some(RequestContext::from_headers(&headers)),
    );

    Ok(Json(invoice))
}

#[utoipa::path(
    post,
    path = "/invoices/{id}/assign",
    tag = "Invoices",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = AssignRequest,
    responses((status = 200, description = "Invoice assigned", body = Invoice)),
    security(("bearerAuth" = []))
)]
pub async fn assign_invoice(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignRequest>,
) -> AppResult<Json<Invoice>> {
    let session =
        authz::require(&state.pool, &auth, permissions::OVERSEE_CREDIT_OPERATIONS_PIPELINE).await?;

    workflow::assign_invoice_to_lead(&state.pool, id, payload.assignee_id, session.principal_id).await?;

    let invoice: Invoice = fetch_invoice(&state.pool, id).await?.try_into()?;
    log_activity_with_context(&state.event_bus, "assigned", Some(session.principal_id), &invoice, None, None);

    Ok(Json(invoice))
}

pub(crate) async fn fetch_invoice(pool: &SqlitePool, invoice_id: Uuid) -> AppResult<DbInvoice> {
    sqlx::query_as::<_, DbInvoice>("SELECT * FROM invoices WHERE id = ? AND deleted_at IS NULL")
        .bind(invoice_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("invoice not found"))
}

async fn fetch_owned_invoice(pool: &SqlitePool, user_id: Uuid, invoice_id: Uuid) -> AppResult<DbInvoice> {
    sqlx::query_as::<_, DbInvoice>(
        "SELECT * FROM invoices WHERE id = ? AND user_id = ? AND deleted_at IS NULL",
    )
    .bind(invoice_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("invoice not found"))
}
