use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use sqlx::MySqlPool;

use super::auth::AuthUser;
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::models::Company;
use crate::error::ApiError;
use crate::tenant::{self, CompanyContext, HostLookup};

/// Tenant database pool, injected by middleware
#[derive(Clone)]
pub struct TenantPool(pub MySqlPool);

/// What the caller brings besides the Host header
#[derive(Debug, Clone, Copy)]
pub enum SessionHint<'a> {
    /// Company of a verified token
    Company(i64),
    /// Subdomain named in a login body
    Subdomain(&'a str),
    None,
}

pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::HOST).and_then(|h| h.to_str().ok())
}

/// Host lookup chain, then the session hint, then the localhost fallback.
/// The result has passed the standing check.
pub async fn resolve_company(main: &MySqlPool, host: Option<&str>, session: SessionHint<'_>) -> Result<Company, ApiError> {
    let tenancy = &config::config().tenancy;
    let lookup = host.and_then(|h| HostLookup::from_host(h, &tenancy.main_domain));

    let host_company = match &lookup {
        Some(l @ (HostLookup::Subdomain(_) | HostLookup::CustomDomain(_))) => tenant::resolve_host(main, l, false).await?,
        _ => None,
    };

    let company = match host_company {
        Some(company) => {
            if let SessionHint::Company(id) = session {
                if id != company.id {
                    tracing::warn!("Token for company {} used on host of company {}", id, company.id);
                    return Err(ApiError::forbidden("Token does not belong to this company"));
                }
            }
            tracing::debug!("Company '{}' resolved from host", company.subdomain);
            Some(company)
        }
        None => {
            let from_session = match session {
                SessionHint::Company(id) => tenant::find_by_id(main, id).await?,
                SessionHint::Subdomain(sub) => tenant::find_by_subdomain(main, &sub.trim().to_ascii_lowercase()).await?,
                SessionHint::None => None,
            };
            match (from_session, &lookup) {
                (Some(company), _) => Some(company),
                (None, Some(HostLookup::Local)) => {
                    tenant::resolve_host(main, &HostLookup::Local, tenancy.allow_localhost_fallback).await?
                }
                (None, _) => None,
            }
        }
    };

    let company = company.ok_or_else(|| ApiError::not_found("Company not found"))?;
    tenant::check_standing(&company, Utc::now().naive_utc()).map_err(|reason| {
        tracing::warn!("Company '{}' refused: {}", company.subdomain, reason);
        ApiError::forbidden(reason)
    })?;
    Ok(company)
}

/// Middleware that resolves the caller's company and attaches its pool.
/// Runs after `jwt_auth_middleware`.
pub async fn validate_tenant_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant validation"))?
        .clone();

    let main_pool = DatabaseManager::main_pool().await?;
    let company = resolve_company(
        &main_pool,
        request_host(request.headers()),
        SessionHint::Company(auth_user.company_id),
    )
    .await?;

    if company.database_name != auth_user.database {
        tracing::warn!(
            "Token database '{}' does not match company database '{}'",
            auth_user.database,
            company.database_name
        );
        return Err(ApiError::forbidden("Token does not belong to this company"));
    }

    let tenant_pool = DatabaseManager::tenant_pool(&company.database_name).await.map_err(|e| {
        tracing::error!("Failed to get database pool for tenant '{}': {}", company.database_name, e);
        ApiError::from(e)
    })?;

    tracing::debug!("Tenant database pool acquired for: {}", company.database_name);
    request.extensions_mut().insert(CompanyContext::from(company));
    request.extensions_mut().insert(TenantPool(tenant_pool));

    Ok(next.run(request).await)
}
