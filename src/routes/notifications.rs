use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::notification::InboxEntry;

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "Notifications",
    responses((status = 200, description = "Notifications addressed to the caller", body = [InboxEntry])),
    security(("bearerAuth" = []))
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<Vec<InboxEntry>>> {
    // Staff see what was fanned out to them; traders see notifications about
    // their own records. The join is constrained to the caller so other
    // recipients never multiply the rows.
    let entries = sqlx::query_as::<_, InboxEntry>(
        "SELECT n.id, n.message, n.kind, n.link, n.created_at, r.read_at
         FROM notifications n
         LEFT JOIN notification_recipients r
           ON r.notification_id = n.id AND r.admin_id = ?
         WHERE r.admin_id IS NOT NULL OR n.user_id = ?
         ORDER BY n.created_at DESC",
    )
    .bind(auth.principal_id)
    .bind(auth.principal_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(entries))
}
