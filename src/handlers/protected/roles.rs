use std::collections::BTreeMap;

use axum::{extract::Path, Extension, Json};

use crate::database::models::Permission;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::role_service::{NewRole, RoleDetail, RoleService, RoleSummary, RoleUpdate};

/// GET /api/roles - with permission and employee counts
pub async fn role_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<Vec<RoleSummary>> {
    user.require("manage_roles")?;
    Ok(ApiResponse::success(RoleService::new(pool).list().await?))
}

pub async fn role_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<RoleDetail> {
    user.require("manage_roles")?;
    Ok(ApiResponse::success(RoleService::new(pool).get(id).await?))
}

pub async fn role_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewRole>,
) -> ApiResult<RoleDetail> {
    user.require("manage_roles")?;
    let role = RoleService::new(pool).create(&body).await?;
    tracing::info!("Role '{}' created by {}", role.role.role_key, user.employee.username);
    Ok(ApiResponse::created(role))
}

pub async fn role_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<RoleUpdate>,
) -> ApiResult<RoleDetail> {
    user.require("manage_roles")?;
    Ok(ApiResponse::success(RoleService::new(pool).update(id, &body).await?))
}

pub async fn role_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("manage_roles")?;
    RoleService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/permissions - the catalog grouped by module
pub async fn permission_catalog(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<BTreeMap<String, Vec<Permission>>> {
    user.require("manage_roles")?;
    Ok(ApiResponse::success(RoleService::new(pool).catalog().await?))
}
