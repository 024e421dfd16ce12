use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::Vehicle;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::vehicle_service::{NewVehicle, VehicleService, VehicleUpdate};
use crate::tenant::CompanyContext;

#[derive(Debug, Deserialize)]
pub struct VehicleQuery {
    pub status: Option<String>,
}

/// GET /api/vehicles
pub async fn vehicle_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<VehicleQuery>,
) -> ApiResult<Vec<Vehicle>> {
    user.require("view_vehicles")?;
    let vehicles = VehicleService::new(pool).list(query.status.as_deref()).await?;
    Ok(ApiResponse::success(vehicles))
}

/// GET /api/vehicles/:id
pub async fn vehicle_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<Vehicle> {
    user.require("view_vehicles")?;
    Ok(ApiResponse::success(VehicleService::new(pool).get(id).await?))
}

/// POST /api/vehicles - subject to the company's vehicle limit
pub async fn vehicle_create(
    Extension(user): Extension<CurrentUser>,
    Extension(company): Extension<CompanyContext>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewVehicle>,
) -> ApiResult<Vehicle> {
    user.require("add_vehicle")?;
    let vehicle = VehicleService::new(pool)
        .create(&body, user.id(), company.max_vehicles)
        .await?;
    tracing::info!("Vehicle {} added by {}", vehicle.vehicle_number, user.employee.username);
    Ok(ApiResponse::created(vehicle))
}

/// PUT /api/vehicles/:id
pub async fn vehicle_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<VehicleUpdate>,
) -> ApiResult<Vehicle> {
    user.require("edit_vehicle")?;
    Ok(ApiResponse::success(VehicleService::new(pool).update(id, &body).await?))
}

/// DELETE /api/vehicles/:id
pub async fn vehicle_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("delete_vehicle")?;
    VehicleService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}
