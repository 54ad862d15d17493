use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::workflow::status::ReviewStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vendor_id: Uuid,
    pub invoice_number: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Derived at write time: quantity * unit_price
    pub total_amount: f64,
    pub due_date: DateTime<Utc>,
    pub status: ReviewStatus,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl crate::events::Loggable for Invoice {
    fn entity_type() -> &'static str {
        "invoice"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbInvoice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub vendor_id: Uuid,
    pub invoice_number: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_amount: f64,
    pub due_date: DateTime<Utc>,
    pub status: String,
    pub assigned_to: Option<Uuid>,
    pub assigned_by: Option<Uuid>,
    pub reviewed_by: Option<Uuid>,
    pub review_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbInvoice> for Invoice {
    type Error = AppError;

    fn try_from(db: DbInvoice) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: db.id,
            user_id: db.user_id,
            vendor_id: db.vendor_id,
            invoice_number: db.invoice_number,
            quantity: db.quantity,
            unit_price: db.unit_price,
            total_amount: db.total_amount,
            due_date: db.due_date,
            status: ReviewStatus::parse(&db.status)?,
            assigned_to: db.assigned_to,
            assigned_by: db.assigned_by,
            reviewed_by: db.reviewed_by,
            review_date: db.review_date,
            created_at: db.created_at,
            updated_at: db.updated_at,
            deleted_at: db.deleted_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvoiceCreateRequest {
    pub vendor_id: Uuid,
    #[schema(example = "INV-2026-0042")]
    pub invoice_number: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub due_date: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InvoiceUpdateRequest {
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRequest {
    pub assignee_id: Uuid,
}
