use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::Assignment;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::assignment_service::{AssignmentService, NewAssignment, ReturnVehicle};

#[derive(Debug, Deserialize)]
pub struct AssignmentQuery {
    pub status: Option<String>,
}

/// GET /api/assignments - everyone's with `view_assignments`, else the caller's own
pub async fn assignment_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<AssignmentQuery>,
) -> ApiResult<Vec<Assignment>> {
    let scope = user
        .permissions
        .listing_scope("view_assignments", "view_own_assignments", user.id())
        .ok_or_else(|| ApiError::forbidden("Permission denied: view_assignments"))?;
    let assignments = AssignmentService::new(pool).list(query.status.as_deref(), scope).await?;
    Ok(ApiResponse::success(assignments))
}

/// GET /api/assignments/:id
pub async fn assignment_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<Assignment> {
    let assignment = AssignmentService::new(pool).get(id).await?;
    if !user.permissions.has("view_assignments") {
        user.require("view_own_assignments")?;
        if assignment.employee_id != user.id() {
            return Err(ApiError::forbidden("Permission denied: view_assignments"));
        }
    }
    Ok(ApiResponse::success(assignment))
}

/// POST /api/assignments
pub async fn assignment_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewAssignment>,
) -> ApiResult<Assignment> {
    user.require("create_assignment")?;
    let assignment = AssignmentService::new(pool).assign(&body, user.id()).await?;
    tracing::info!(
        "Vehicle {} assigned to employee {} by {}",
        assignment.vehicle_id,
        assignment.employee_id,
        user.employee.username
    );
    Ok(ApiResponse::created(assignment))
}

/// POST /api/assignments/:id/return
pub async fn assignment_return(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<ReturnVehicle>,
) -> ApiResult<Assignment> {
    user.require("return_vehicle")?;
    Ok(ApiResponse::success(AssignmentService::new(pool).return_vehicle(id, &body).await?))
}
