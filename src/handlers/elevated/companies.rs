use axum::{extract::Path, Extension, Json};

use crate::database::models::Company;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::tenant_service::{CompanyUpdate, TenantService};

/// GET /api/root/companies
pub async fn company_list() -> ApiResult<Vec<Company>> {
    Ok(ApiResponse::success(TenantService::new().await?.list_companies().await?))
}

/// GET /api/root/companies/:id
pub async fn company_get(Path(id): Path<i64>) -> ApiResult<Company> {
    TenantService::new()
        .await?
        .get_company(id)
        .await?
        .map(ApiResponse::success)
        .ok_or_else(|| ApiError::not_found("Company not found"))
}

/// PUT /api/root/companies/:id - status, plan, limits, subscription end
pub async fn company_update(
    Extension(operator): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<CompanyUpdate>,
) -> ApiResult<Company> {
    let company = TenantService::new().await?.update_company(id, &body).await?;
    tracing::info!(
        "Company '{}' updated by root '{}': status={} plan={}",
        company.subdomain,
        operator.username,
        company.status,
        company.plan
    );
    Ok(ApiResponse::success(company))
}
