use axum::{http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{self, Claims};
use crate::database::manager::DatabaseManager;
use crate::database::models::Employee;
use crate::error::ApiError;
use crate::middleware::{resolve_company, ApiResponse, ApiResult, SessionHint};
use crate::permissions;
use crate::services::employee_service::EmployeeService;
use crate::tenant::CompanyContext;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Subdomain, for clients that cannot use a company host
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: i64,
    pub employee: Employee,
    pub company: CompanyContext,
    pub permissions: Vec<String>,
}

const INVALID_LOGIN: &str = "Invalid username or password";

/// POST /auth/login - verify credentials in the company database and issue a JWT
pub async fn login_post(headers: HeaderMap, Json(body): Json<LoginRequest>) -> ApiResult<LoginResponse> {
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return Err(ApiError::bad_request("Username and password are required"));
    }

    let main_pool = DatabaseManager::main_pool().await?;
    let hint = match body.company.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(sub) => SessionHint::Subdomain(sub),
        None => SessionHint::None,
    };
    let company = resolve_company(&main_pool, crate::middleware::validate_tenant::request_host(&headers), hint).await?;
    let pool = DatabaseManager::tenant_pool(&company.database_name).await?;

    let employee = EmployeeService::new(pool.clone())
        .find_by_username(username)
        .await?
        .filter(|e| e.status == "active")
        .filter(|e| auth::verify_password(&body.password, &e.password_hash));

    let Some(employee) = employee else {
        tracing::warn!("Failed login for '{}' at '{}'", username, company.subdomain);
        return Err(ApiError::unauthorized(INVALID_LOGIN));
    };

    let permissions = permissions::load_permissions_or_fallback(&pool, &employee.role).await;
    let claims = Claims::new(
        company.id,
        company.subdomain.clone(),
        company.database_name.clone(),
        employee.id,
        employee.username.clone(),
        employee.role.clone(),
    );
    let token = auth::generate_jwt(&claims)?;

    tracing::info!("Login: '{}' ({}) at '{}'", employee.username, employee.role, company.subdomain);
    Ok(ApiResponse::success(LoginResponse {
        token,
        expires_in: claims.expires_in(),
        permissions: permissions.keys().map(str::to_string).collect(),
        employee,
        company: CompanyContext::from(company),
    }))
}
