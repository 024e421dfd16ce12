use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;

use super::auth::AuthUser;
use super::validate_tenant::TenantPool;
use crate::audit::AuditLogger;
use crate::database::models::Employee;
use crate::error::ApiError;
use crate::permissions::{self, PermissionSet};
use crate::services::employee_service::EmployeeService;

/// The active employee behind a request, with the permissions of their role
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub employee: Employee,
    pub permissions: PermissionSet,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.employee.id
    }

    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        self.permissions.require(permission)
    }
}

/// First address of X-Forwarded-For, else the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| peer.map(|p| p.ip().to_string()))
}

/// Middleware that loads the employee named by the token from the tenant
/// database, then their permission set and a request-scoped audit logger.
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before user validation"))?
        .clone();

    let TenantPool(tenant_pool) = request
        .extensions()
        .get::<TenantPool>()
        .ok_or_else(|| ApiError::internal_server_error("Tenant pool required before user validation"))?
        .clone();

    let employee = match EmployeeService::new(tenant_pool.clone()).get(auth_user.employee_id).await {
        Ok(employee) => employee,
        Err(crate::services::ServiceError::NotFound(_)) => {
            tracing::warn!(
                "User validation failed: employee {} not found in '{}'",
                auth_user.employee_id,
                auth_user.database
            );
            return Err(ApiError::unauthorized("User no longer exists"));
        }
        Err(e) => return Err(e.into()),
    };

    if employee.status != "active" {
        tracing::warn!("User validation failed: '{}' is {}", employee.username, employee.status);
        return Err(ApiError::forbidden("User account is not active"));
    }

    // Role comes from the database, not the token, so role edits apply at once
    let permissions = permissions::load_permissions_or_fallback(&tenant_pool, &employee.role).await;

    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let ip = client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::debug!(
        "User validation successful: {} ({}) with {} permissions in tenant '{}'",
        employee.username,
        employee.role,
        permissions.len(),
        auth_user.subdomain
    );

    let audit = AuditLogger::new(tenant_pool, Some(employee.id), ip, user_agent);
    request.extensions_mut().insert(audit);
    request.extensions_mut().insert(CurrentUser { employee, permissions });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_wins_over_peer() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.9"));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.7"));
        assert_eq!(client_ip(&HeaderMap::new(), None), None);
    }
}
