use axum::{
    extract::{Path, Query},
    Extension, Json,
};

use crate::config;
use crate::database::models::FuelRecord;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::fuel_service::{FuelEntry, FuelFilter, FuelService, NewFuelRecord};
use crate::services::settings_service::SettingsService;

/// GET /api/fuel?vehicle_id=&employee_id=
pub async fn fuel_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(filter): Query<FuelFilter>,
) -> ApiResult<Vec<FuelRecord>> {
    let scope = user
        .permissions
        .listing_scope("view_all_fuel_records", "view_own_fuel_records", user.id())
        .ok_or_else(|| ApiError::forbidden("Permission denied: view_all_fuel_records"))?;
    Ok(ApiResponse::success(FuelService::new(pool).list(&filter, scope).await?))
}

/// POST /api/fuel - the response flags prices above the tenant's alert threshold
pub async fn fuel_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewFuelRecord>,
) -> ApiResult<FuelEntry> {
    user.require("add_fuel_record")?;
    let threshold = SettingsService::new(pool.clone())
        .get_f64("fuel_price_alert_threshold", config::config().reports.fuel_price_alert)
        .await?;
    let entry = FuelService::new(pool).create(&body, user.id(), threshold).await?;
    Ok(ApiResponse::created(entry))
}

/// DELETE /api/fuel/:id
pub async fn fuel_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("delete_fuel_record")?;
    FuelService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
