use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::database::models::ServiceRecord;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::maintenance_service::{MaintenanceService, NewServiceRecord, NotificationReport};

#[derive(Debug, Deserialize)]
pub struct MaintenanceQuery {
    pub vehicle_id: Option<i64>,
}

/// GET /api/maintenance
pub async fn maintenance_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<MaintenanceQuery>,
) -> ApiResult<Vec<ServiceRecord>> {
    user.require("view_service_records")?;
    Ok(ApiResponse::success(MaintenanceService::new(pool).list(query.vehicle_id).await?))
}

/// GET /api/maintenance/:id
pub async fn maintenance_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<ServiceRecord> {
    user.require("view_service_records")?;
    Ok(ApiResponse::success(MaintenanceService::new(pool).get(id).await?))
}

/// POST /api/maintenance
pub async fn maintenance_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewServiceRecord>,
) -> ApiResult<ServiceRecord> {
    user.require("add_service_record")?;
    Ok(ApiResponse::created(MaintenanceService::new(pool).create(&body).await?))
}

/// DELETE /api/maintenance/:id
pub async fn maintenance_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("delete_service_record")?;
    MaintenanceService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /api/maintenance/notifications
pub async fn maintenance_notifications(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<NotificationReport> {
    user.require("view_service_notifications")?;
    let today = Utc::now().date_naive();
    Ok(ApiResponse::success(MaintenanceService::new(pool).notifications(today).await?))
}
