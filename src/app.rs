use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{
    admin, auth, funding, health, invoices, kyc, milestones, notes, notifications, vendors,
    workload,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();

    // Background listener persists activity_log and event_store rows.
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me));

    let vendor_routes = Router::new()
        .route("/", get(vendors::list_vendors))
        .route("/", post(vendors::create_vendor));

    let invoice_routes = Router::new()
        .route("/", get(invoices::list_invoices))
        .route("/", post(invoices::create_invoice))
        .route("/:id", get(invoices::get_invoice))
        .route("/:id", put(invoices::update_invoice))
        .route("/:id", delete(invoices::delete_invoice))
        .route("/:id/status", post(invoices::update_invoice_status))
        .route("/:id/complete", post(invoices::complete_invoice))
        .route("/:id/assign", post(invoices::assign_invoice));

    // Milestones are created in invoice scope, then addressed directly.
    let invoice_milestone_routes = Router::new()
        .route("/", get(milestones::list_milestones))
        .route("/", post(milestones::create_milestone));

    let milestone_routes = Router::new()
        .route("/:id", put(milestones::update_milestone))
        .route("/:id", delete(milestones::delete_milestone))
        .route("/:id/status", post(milestones::update_milestone_status))
        .route("/:id/cosign", post(milestones::cosign_milestone))
        .route("/:id/assign", post(milestones::assign_milestone));

    let funding_routes = Router::new()
        .route("/", get(funding::list_funding_requests))
        .route("/", post(funding::create_funding_request))
        .route("/:id/status", post(funding::update_funding_request));

    let kyc_routes = Router::new()
        .route("/", get(kyc::list_kyc_documents))
        .route("/", post(kyc::submit_kyc_document))
        .route("/:id/status", post(kyc::update_kyc_document));

    let note_routes = Router::new()
        .route("/", post(notes::create_note))
        .route("/:entity_type/:entity_id", get(notes::list_notes));

    let admin_routes = Router::new()
        .route("/admins", get(admin::get_all_admins))
        .route("/admins", post(admin::create_admin))
        .route("/admins/:id/role", put(admin::update_admin_role))
        .route(
            "/admins/:id/effective-permissions",
            get(admin::get_effective_permissions),
        )
        .route("/roles", get(admin::list_roles))
        .route("/roles", post(admin::create_role))
        .route("/permissions", get(admin::list_permissions))
        .route("/users", get(admin::get_all_users))
        .route("/users/:id/status", put(admin::update_user_status))
        .route("/users/:id/reset-password", post(admin::reset_user_password))
        .route("/workload", get(workload::get_staffs_workload));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/vendors", vendor_routes)
        .nest("/invoices", invoice_routes)
        .nest("/invoices/:invoice_id/milestones", invoice_milestone_routes)
        .nest("/milestones", milestone_routes)
        .nest("/funding-requests", funding_routes)
        .nest("/kyc", kyc_routes)
        .nest("/notes", note_routes)
        .route("/notifications", get(notifications::list_notifications))
        .nest("/admin", admin_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
