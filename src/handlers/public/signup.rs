use axum::{extract::Path, Json};

use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::tenant_service::{self, SignupOutcome, SignupRequest, SubdomainCheck, TenantService};

/// POST /auth/signup - register a company and provision its database
pub async fn signup_post(Json(body): Json<SignupRequest>) -> ApiResult<SignupOutcome> {
    // Reject bad forms before touching the registry
    let reserved = &config::config().tenancy.reserved_subdomains;
    tenant_service::validate_signup(&body, reserved)
        .map_err(|fields| ApiError::validation_error("Signup validation failed", Some(fields)))?;

    let outcome = TenantService::new().await?.signup(&body).await?;
    tracing::info!(
        "Company '{}' signed up as '{}'",
        outcome.company.name,
        outcome.company.subdomain
    );
    Ok(ApiResponse::created(outcome))
}

/// GET /auth/check-subdomain/:subdomain
pub async fn check_subdomain_get(Path(subdomain): Path<String>) -> ApiResult<SubdomainCheck> {
    let normalized = subdomain.trim().to_lowercase();
    let reserved = &config::config().tenancy.reserved_subdomains;
    if let Err(reason) = tenant_service::validate_subdomain(&normalized, reserved) {
        return Ok(ApiResponse::success(SubdomainCheck {
            subdomain: normalized,
            available: false,
            reason: Some(reason),
        }));
    }

    Ok(ApiResponse::success(TenantService::new().await?.check_subdomain(&normalized).await?))
}
