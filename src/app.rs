// Router assembly: the three handler tiers, their middleware stacks and the
// global layers.

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, StatusCode},
    middleware::from_fn,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::database::manager::DatabaseManager;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, root_auth_middleware, validate_tenant_middleware, validate_user_middleware};

pub fn app() -> Router {
    let cfg = config::config();

    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(public_routes())
        .merge(protected_routes())
        .merge(elevated_routes())
        .layer(DefaultBodyLimit::max(cfg.api.max_request_size_bytes));

    if cfg.security.enable_cors {
        router = router.layer(cors_layer(&cfg.security.cors_origins));
    }
    if cfg.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

fn public_routes() -> Router {
    Router::new()
        .route("/auth/login", post(public::login_post))
        .route("/auth/signup", post(public::signup_post))
        .route("/auth/check-subdomain/:subdomain", get(public::check_subdomain_get))
}

fn protected_routes() -> Router {
    use protected::*;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        // Vehicles
        .route("/api/vehicles", get(vehicles::vehicle_list).post(vehicles::vehicle_create))
        .route(
            "/api/vehicles/:id",
            get(vehicles::vehicle_get)
                .put(vehicles::vehicle_update)
                .delete(vehicles::vehicle_delete),
        )
        // Employees
        .route("/api/employees", get(employees::employee_list).post(employees::employee_create))
        .route(
            "/api/employees/:id",
            get(employees::employee_get)
                .put(employees::employee_update)
                .delete(employees::employee_delete),
        )
        // Assignments
        .route(
            "/api/assignments",
            get(assignments::assignment_list).post(assignments::assignment_create),
        )
        .route("/api/assignments/:id", get(assignments::assignment_get))
        .route("/api/assignments/:id/return", post(assignments::assignment_return))
        // Fuel
        .route("/api/fuel", get(fuel::fuel_list).post(fuel::fuel_create))
        .route("/api/fuel/:id", delete(fuel::fuel_delete))
        // Maintenance
        .route(
            "/api/maintenance",
            get(maintenance::maintenance_list).post(maintenance::maintenance_create),
        )
        .route("/api/maintenance/notifications", get(maintenance::maintenance_notifications))
        .route(
            "/api/maintenance/:id",
            get(maintenance::maintenance_get).delete(maintenance::maintenance_delete),
        )
        // Job cards
        .route("/api/job-cards", get(job_cards::job_card_list).post(job_cards::job_card_create))
        .route(
            "/api/job-cards/:id",
            get(job_cards::job_card_get)
                .put(job_cards::job_card_update)
                .delete(job_cards::job_card_delete),
        )
        .route("/api/job-cards/:id/items", post(job_cards::job_card_item_create))
        .route("/api/job-cards/:id/items/:item_id", delete(job_cards::job_card_item_delete))
        // Requisitions
        .route(
            "/api/requisitions",
            get(requisitions::requisition_list).post(requisitions::requisition_create),
        )
        .route("/api/requisitions/:id", get(requisitions::requisition_get))
        .route("/api/requisitions/:id/review", post(requisitions::requisition_review))
        .route("/api/requisitions/:id/approve", post(requisitions::requisition_approve))
        // Roles and permissions
        .route("/api/roles", get(roles::role_list).post(roles::role_create))
        .route(
            "/api/roles/:id",
            get(roles::role_get).put(roles::role_update).delete(roles::role_delete),
        )
        .route("/api/permissions", get(roles::permission_catalog))
        // Settings
        .route("/api/settings", get(settings::settings_get).put(settings::settings_put))
        .route("/api/settings/test-email", post(settings::settings_test_email))
        // Analytics
        .route("/api/analytics/dashboard", get(analytics::dashboard_get))
        .route("/api/analytics/kpis", get(analytics::kpis_get))
        .route("/api/analytics/report", post(analytics::report_post))
        .route("/api/analytics/export/excel", post(analytics::export_excel_post))
        .route("/api/analytics/export/pdf", post(analytics::export_pdf_post))
        // Scheduled reports
        .route(
            "/api/scheduled-reports",
            get(scheduled_reports::scheduled_report_list).post(scheduled_reports::scheduled_report_create),
        )
        .route("/api/scheduled-reports/:id", delete(scheduled_reports::scheduled_report_delete))
        .route("/api/scheduled-reports/:id/toggle", post(scheduled_reports::scheduled_report_toggle))
        .route("/api/scheduled-reports/:id/run", post(scheduled_reports::scheduled_report_run))
        .route("/api/scheduled-reports/:id/history", get(scheduled_reports::scheduled_report_history))
        // Audit trail
        .route("/api/audit", get(audit::audit_list))
        .route("/api/audit/summary", get(audit::audit_summary))
        .route("/api/audit/export", get(audit::audit_export))
        .route("/api/audit/employees/:id", get(audit::audit_user_activity))
        // JWT first, then company, then employee
        .route_layer(
            ServiceBuilder::new()
                .layer(from_fn(jwt_auth_middleware))
                .layer(from_fn(validate_tenant_middleware))
                .layer(from_fn(validate_user_middleware)),
        )
}

fn elevated_routes() -> Router {
    use elevated::companies;

    Router::new()
        .route("/api/root/companies", get(companies::company_list))
        .route(
            "/api/root/companies/:id",
            get(companies::company_get).put(companies::company_update),
        )
        .route_layer(from_fn(root_auth_middleware))
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "Fleet API (Rust)",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Multi-tenant fleet management API",
            "endpoints": {
                "public": "/auth/login, /auth/signup, /auth/check-subdomain/:subdomain",
                "fleet": "/api/vehicles, /api/employees, /api/assignments, /api/fuel, /api/maintenance",
                "workshop": "/api/job-cards, /api/requisitions",
                "admin": "/api/roles, /api/permissions, /api/settings",
                "analytics": "/api/analytics/*, /api/scheduled-reports, /api/audit",
                "root": "/api/root/companies (root token)",
            }
        }
    }))
}

async fn health() -> impl IntoResponse {
    let now = chrono::Utc::now();

    match DatabaseManager::health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "data": { "status": "degraded", "timestamp": now, "database": "unavailable" }
                })),
            )
        }
    }
}
