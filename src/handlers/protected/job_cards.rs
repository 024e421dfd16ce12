use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;

use crate::database::models::JobCard;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::job_card_service::{JobCardDetail, JobCardService, JobCardUpdate, NewJobCard, NewJobCardItem};

#[derive(Debug, Deserialize)]
pub struct JobCardQuery {
    pub status: Option<String>,
}

/// GET /api/job-cards
pub async fn job_card_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<JobCardQuery>,
) -> ApiResult<Vec<JobCard>> {
    user.require("view_job_cards")?;
    Ok(ApiResponse::success(JobCardService::new(pool).list(query.status.as_deref()).await?))
}

/// GET /api/job-cards/:id - the card with its items
pub async fn job_card_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<JobCardDetail> {
    user.require("view_job_cards")?;
    Ok(ApiResponse::success(JobCardService::new(pool).get(id).await?))
}

/// POST /api/job-cards
pub async fn job_card_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewJobCard>,
) -> ApiResult<JobCardDetail> {
    user.require("create_job_card")?;
    let detail = JobCardService::new(pool).create(&body, user.id()).await?;
    tracing::info!("Job card {} opened by {}", detail.card.job_card_number, user.employee.username);
    Ok(ApiResponse::created(detail))
}

/// PUT /api/job-cards/:id - completing a card also writes its service record
pub async fn job_card_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<JobCardUpdate>,
) -> ApiResult<JobCardDetail> {
    user.require("edit_job_card")?;
    Ok(ApiResponse::success(JobCardService::new(pool).update(id, &body).await?))
}

/// DELETE /api/job-cards/:id
pub async fn job_card_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("delete_job_card")?;
    JobCardService::new(pool).delete(id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /api/job-cards/:id/items
pub async fn job_card_item_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
    Json(body): Json<NewJobCardItem>,
) -> ApiResult<JobCardDetail> {
    user.require("edit_job_card")?;
    Ok(ApiResponse::created(JobCardService::new(pool).add_item(id, &body).await?))
}

/// DELETE /api/job-cards/:id/items/:item_id
pub async fn job_card_item_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path((id, item_id)): Path<(i64, i64)>,
) -> ApiResult<JobCardDetail> {
    user.require("edit_job_card")?;
    Ok(ApiResponse::success(JobCardService::new(pool).delete_item(id, item_id).await?))
}
