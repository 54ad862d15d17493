use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::{AppError, AppResult, FieldViolation};
use crate::jwt::AuthUser;
use crate::models::note::{DbEntityNote, EntityNote, NoteCreateRequest, NoteEntityType};
use crate::utils::utc_now;

#[utoipa::path(
    post,
    path = "/notes",
    tag = "Notes",
    request_body = NoteCreateRequest,
    responses((status = 201, description = "Note attached", body = EntityNote)),
    security(("bearerAuth" = []))
)]
pub async fn create_note(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<NoteCreateRequest>,
) -> AppResult<(StatusCode, Json<EntityNote>)> {
    if payload.body.trim().is_empty() {
        return Err(AppError::validation(vec![FieldViolation::new("body", "note body is required")]));
    }

    let id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO entity_notes (id, entity_type, entity_id, author_id, body, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(payload.entity_type.as_str())
    .bind(payload.entity_id)
    .bind(auth.principal_id)
    .bind(&payload.body)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let note = EntityNote {
        id,
        entity_type: payload.entity_type,
        entity_id: payload.entity_id,
        author_id: auth.principal_id,
        body: payload.body,
        created_at: now,
    };

    Ok((StatusCode::CREATED, Json(note)))
}

#[utoipa::path(
    get,
    path = "/notes/{entity_type}/{entity_id}",
    tag = "Notes",
    params(
        ("entity_type" = String, Path, description = "invoice | milestone | funding_request | kyc"),
        ("entity_id" = Uuid, Path, description = "Entity id")
    ),
    responses((status = 200, description = "Notes for entity", body = [EntityNote])),
    security(("bearerAuth" = []))
)]
pub async fn list_notes(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path((entity_type, entity_id)): Path<(String, Uuid)>,
) -> AppResult<Json<Vec<EntityNote>>> {
    let entity_type = NoteEntityType::parse(&entity_type)
        .map_err(|_| AppError::validation(vec![FieldViolation::new("entity_type", "unknown entity type")]))?;

    let notes = sqlx::query_as::<_, DbEntityNote>(
        "SELECT * FROM entity_notes WHERE entity_type = ? AND entity_id = ? AND deleted_at IS NULL ORDER BY created_at",
    )
    .bind(entity_type.as_str())
    .bind(entity_id)
    .fetch_all(&state.pool)
    .await?;

    let notes: Vec<EntityNote> = notes
        .into_iter()
        .map(EntityNote::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(notes))
}
