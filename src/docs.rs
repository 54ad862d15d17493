use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;
use crate::workflow;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::health::health,
        routes::auth::register,
        routes::auth::login,
        routes::auth::me,
        routes::vendors::list_vendors,
        routes::vendors::create_vendor,
        routes::invoices::list_invoices,
        routes::invoices::create_invoice,
        routes::invoices::get_invoice,
        routes::invoices::update_invoice,
        routes::invoices::delete_invoice,
        routes::invoices::update_invoice_status,
        routes::invoices::complete_invoice,
        routes::invoices::assign_invoice,
        routes::milestones::list_milestones,
        routes::milestones::create_milestone,
        routes::milestones::update_milestone,
        routes::milestones::delete_milestone,
        routes::milestones::update_milestone_status,
        routes::milestones::cosign_milestone,
        routes::milestones::assign_milestone,
        routes::funding::list_funding_requests,
        routes::funding::create_funding_request,
        routes::funding::update_funding_request,
        routes::kyc::list_kyc_documents,
        routes::kyc::submit_kyc_document,
        routes::kyc::update_kyc_document,
        routes::notes::create_note,
        routes::notes::list_notes,
        routes::notifications::list_notifications,
        routes::admin::create_admin,
        routes::admin::create_role,
        routes::admin::list_roles,
        routes::admin::list_permissions,
        routes::admin::update_admin_role,
        routes::admin::update_user_status,
        routes::admin::reset_user_password,
        routes::admin::get_all_users,
        routes::admin::get_all_admins,
        routes::admin::get_effective_permissions,
        routes::workload::get_staffs_workload
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            models::principal::Principal,
            models::principal::PrincipalKind,
            models::principal::RegisterRequest,
            models::principal::LoginRequest,
            models::principal::AuthResponse,
            models::principal::AdminCreateRequest,
            models::principal::AdminRoleUpdateRequest,
            models::principal::UserStatusUpdateRequest,
            models::principal::PasswordResetResponse,
            models::principal::AdminSummary,
            models::rbac::Permission,
            models::rbac::Role,
            models::rbac::RoleCreateRequest,
            models::rbac::ClaimGrant,
            models::rbac::Claim,
            models::rbac::EffectivePermissions,
            models::vendor::Vendor,
            models::vendor::VendorCreateRequest,
            models::invoice::Invoice,
            models::invoice::InvoiceCreateRequest,
            models::invoice::InvoiceUpdateRequest,
            models::invoice::AssignRequest,
            models::milestone::Milestone,
            models::milestone::MilestoneCreateRequest,
            models::milestone::MilestoneUpdateRequest,
            models::funding::FundingRequest,
            models::funding::FundingCreateRequest,
            models::kyc::KycDocument,
            models::kyc::KycSubmitRequest,
            models::note::EntityNote,
            models::note::NoteCreateRequest,
            models::note::NoteEntityType,
            models::notification::Notification,
            models::notification::InboxEntry,
            workflow::status::ReviewStatus,
            workflow::status::ReviewRequest,
            routes::workload::StatusBucket,
            routes::workload::StaffWorkload,
            routes::workload::WorkloadPage
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Vendors", description = "Vendor directory"),
        (name = "Invoices", description = "Invoice lifecycle and review"),
        (name = "Milestones", description = "Milestone review and co-signing"),
        (name = "Funding", description = "Funding request review"),
        (name = "KYC", description = "KYC document review"),
        (name = "Notes", description = "Internal review notes"),
        (name = "Notifications", description = "Notification inbox"),
        (name = "Admin", description = "Staff, role and user administration")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
    let mut doc = serde_json::to_value(ApiDoc::openapi())?;
    ensure_servers(&mut doc, port);
    Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> Router {
    let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
        .try_it_out_enabled(true)
        .with_credentials(true)
        .persist_authorization(true);

    let doc_json = Arc::new(serde_json::to_value(&doc).expect("OpenAPI serialization must succeed"));

    let json_route = {
        let doc_json = Arc::clone(&doc_json);
        get(move || {
            let doc_json = Arc::clone(&doc_json);
            async move { Json((*doc_json).clone()) }
        })
    };

    Router::new()
        .route("/api-docs/openapi.json", json_route)
        .merge(SwaggerUi::new("/docs").config(swagger_config))
}

fn ensure_servers(doc: &mut Value, port: u16) {
    let server_url = format!("http://localhost:{port}");

    match doc.get_mut("servers") {
        Some(Value::Array(arr)) => {
            let has = arr
                .iter()
                .any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
            if !has {
                arr.push(json!({ "url": server_url }));
            }
        }
        _ => {
            doc["servers"] = json!([{ "url": server_url }]);
        }
    }
}
