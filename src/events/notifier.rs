//! In-app notification fan-out and the email outbox.
//!
//! Actual email transport lives outside this service; we only append to
//! `email_outbox` and let a delivery worker drain it (at-least-once).

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub message: String,
    pub kind: String,
    pub link: Option<String>,
    /// The trader the notification is primarily about, if any.
    pub user_id: Option<Uuid>,
    /// Admin recipients; one recipient row is created per id.
    pub recipients: Vec<Uuid>,
}

impl NotificationDraft {
    pub fn new(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            link: None,
            user_id: None,
            recipients: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn about_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn to_admins(mut self, recipients: impl IntoIterator<Item = Uuid>) -> Self {
        self.recipients = recipients.into_iter().collect();
        self
    }
}

/// Create one notification row and fan out a recipient row per admin.
pub async fn notify(pool: &SqlitePool, draft: NotificationDraft) -> AppResult<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO notifications (id, message, kind, link, user_id, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&draft.message)
    .bind(&draft.kind)
    .bind(&draft.link)
    .bind(draft.user_id)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| AppError::dependency(format!("notification insert failed: {err}")))?;

    for admin_id in &draft.recipients {
        sqlx::query(
            "INSERT INTO notification_recipients (notification_id, admin_id) VALUES (?, ?)",
        )
        .bind(id)
        .bind(admin_id)
        .execute(pool)
        .await
        .map_err(|err| AppError::dependency(format!("notification recipient insert failed: {err}")))?;
    }

    Ok(id)
}

/// Queue an email for a staff recipient. Delivery happens elsewhere.
pub async fn queue_email(
    pool: &SqlitePool,
    recipient_id: Uuid,
    subject: &str,
    body: &str,
) -> AppResult<()> {
    sqlx::query(
        "INSERT INTO email_outbox (id, recipient_id, subject, body, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4())
    .bind(recipient_id)
    .bind(subject)
    .bind(body)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|err| AppError::dependency(format!("email outbox insert failed: {err}")))?;

    Ok(())
}
