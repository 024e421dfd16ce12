use axum::Extension;
use serde::Serialize;

use crate::database::models::Employee;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser};
use crate::tenant::CompanyContext;

#[derive(Debug, Serialize)]
pub struct WhoAmI {
    pub employee: Employee,
    pub company: CompanyContext,
    pub role: String,
    pub permissions: Vec<String>,
}

/// GET /api/auth/whoami
pub async fn whoami_get(
    Extension(user): Extension<CurrentUser>,
    Extension(company): Extension<CompanyContext>,
) -> ApiResult<WhoAmI> {
    let permissions = user.permissions.keys().map(str::to_string).collect();
    Ok(ApiResponse::success(WhoAmI {
        role: user.permissions.role().to_string(),
        employee: user.employee,
        company,
        permissions,
    }))
}
