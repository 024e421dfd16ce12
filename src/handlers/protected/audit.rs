use axum::{
    extract::{Path, Query},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;

use crate::audit::{self, AuditPage, AuditQuery, AuditSummary};
use crate::database::models::AuditEntry;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, FileDownload, TenantPool};
use crate::reports::{excel, file_name, ReportFormat};

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<u32>,
    pub limit: Option<u32>,
}

/// GET /api/audit?page=&page_size=&start_date=&end_date=&action_type=&employee_id=
pub async fn audit_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<AuditPage> {
    user.require("view_audit_trail")?;
    Ok(ApiResponse::success(audit::fetch_page(&pool, &query).await?))
}

/// GET /api/audit/summary?days=
pub async fn audit_summary(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(window): Query<WindowQuery>,
) -> ApiResult<AuditSummary> {
    user.require("view_audit_trail")?;
    let days = window.days.unwrap_or(30).clamp(1, 365);
    Ok(ApiResponse::success(audit::summary(&pool, days).await?))
}

/// GET /api/audit/employees/:id?days=&limit=
pub async fn audit_user_activity(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(employee_id): Path<i64>,
    Query(window): Query<WindowQuery>,
) -> ApiResult<Vec<AuditEntry>> {
    user.require("view_audit_trail")?;
    let days = window.days.unwrap_or(30).clamp(1, 365);
    let limit = window.limit.unwrap_or(100);
    Ok(ApiResponse::success(
        audit::user_activity(&pool, employee_id, days, limit).await?,
    ))
}

/// GET /api/audit/export - the filtered log as an Excel download
pub async fn audit_export(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(query): Query<AuditQuery>,
) -> Result<FileDownload, ApiError> {
    user.require("view_audit_trail")?;
    let table = audit::export_table(&pool, &query).await?;
    let bytes = excel::render(&table)?;
    Ok(FileDownload {
        filename: file_name("Audit Trail", ReportFormat::Excel, Utc::now().naive_utc()),
        content_type: ReportFormat::Excel.mime_type(),
        bytes,
    })
}
