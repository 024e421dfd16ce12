use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::Requisition;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::requisition_service::{NewRequisition, RequisitionService, Review};

#[derive(Debug, Deserialize)]
pub struct RequisitionQuery {
    pub status: Option<String>,
}

/// GET /api/requisitions?status=
pub async fn requisition_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<RequisitionQuery>,
) -> ApiResult<Vec<Requisition>> {
    user.require("view_requisitions")?;
    Ok(ApiResponse::success(RequisitionService::new(pool).list(query.status.as_deref()).await?))
}

/// GET /api/requisitions/:id
pub async fn requisition_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<Requisition> {
    user.require("view_requisitions")?;
    Ok(ApiResponse::success(RequisitionService::new(pool).get(id).await?))
}

/// POST /api/requisitions
pub async fn requisition_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewRequisition>,
) -> ApiResult<Requisition> {
    user.require("create_requisition")?;
    let requisition = RequisitionService::new(pool).create(&body, user.id()).await?;
    tracing::info!(
        "Requisition {} raised by {}",
        requisition.requisition_number,
        user.employee.username
    );
    Ok(ApiResponse::created(requisition))
}

/// POST /api/requisitions/:id/review - line manager decision
pub async fn requisition_review(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<Review>,
) -> ApiResult<Requisition> {
    user.require("review_requisition")?;
    Ok(ApiResponse::success(RequisitionService::new(pool).review(id, user.id(), &body).await?))
}

/// POST /api/requisitions/:id/approve - director decision
pub async fn requisition_approve(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<Review>,
) -> ApiResult<Requisition> {
    user.require("approve_requisition")?;
    Ok(ApiResponse::success(RequisitionService::new(pool).approve(id, user.id(), &body).await?))
}
