use std::time::Instant;

use axum::{Extension, Json};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::analytics::{self, DashboardStats, Kpis};
use crate::audit::{AuditEvent, AuditLogger};
use crate::database::models::report::ReportFilters;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, FileDownload, TenantPool};
use crate::reports::{self, excel, pdf, ReportFormat, ReportKind, ReportQuery, ReportTable};

/// Permission check that leaves an `unauthorized_access` row behind
async fn guard(user: &CurrentUser, audit: &AuditLogger, permission: &str) -> Result<(), ApiError> {
    if let Err(denied) = user.require(permission) {
        tracing::warn!("'{}' denied {}", user.employee.username, permission);
        audit
            .log(AuditEvent::new("unauthorized_access").details(json!({ "required_permission": permission })))
            .await;
        return Err(denied);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub report_type: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub vehicle_ids: Vec<i64>,
    #[serde(default)]
    pub employee_ids: Vec<i64>,
}

impl ReportRequest {
    /// Defaults to the last 30 days
    fn query(&self, user: &CurrentUser) -> Result<ReportQuery, ApiError> {
        let kind: ReportKind = self.report_type.parse()?;
        let end = self.end_date.unwrap_or_else(|| Utc::now().date_naive());
        let start = self.start_date.unwrap_or(end - chrono::Duration::days(30));
        Ok(ReportQuery::new(kind, start, end)?
            .with_filters(ReportFilters {
                vehicle_ids: self.vehicle_ids.clone(),
                employee_ids: self.employee_ids.clone(),
            })
            .with_scope(user.permissions.report_scope(user.id())))
    }
}

#[derive(Debug, Serialize)]
pub struct ReportData {
    pub report_type: ReportKind,
    pub title: &'static str,
    pub period: String,
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub count: usize,
}

/// GET /api/analytics/dashboard
pub async fn dashboard_get(
    Extension(user): Extension<CurrentUser>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<DashboardStats> {
    guard(&user, &audit, "view_dashboard").await?;
    let scope = user.permissions.report_scope(user.id());
    Ok(ApiResponse::success(analytics::dashboard(&pool, scope).await?))
}

/// GET /api/analytics/kpis
pub async fn kpis_get(
    Extension(user): Extension<CurrentUser>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<Kpis> {
    guard(&user, &audit, "view_kpis").await?;
    Ok(ApiResponse::success(analytics::kpis(&pool).await?))
}

/// POST /api/analytics/report
pub async fn report_post(
    Extension(user): Extension<CurrentUser>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<ReportRequest>,
) -> ApiResult<ReportData> {
    guard(&user, &audit, "view_reports").await?;
    let started = Instant::now();
    let query = body.query(&user)?;
    let table = query.fetch(&pool).await?;

    audit
        .log(
            AuditEvent::new("view_report")
                .resource("report", Some(query.kind.as_str().to_string()))
                .details(json!({
                    "start_date": query.start,
                    "end_date": query.end,
                    "rows": table.len(),
                }))
                .timed(started),
        )
        .await;

    Ok(ApiResponse::success(ReportData {
        report_type: query.kind,
        title: query.kind.title(),
        period: reports::period_label(query.start, query.end),
        columns: table.columns.clone(),
        rows: table.to_records(),
        count: table.len(),
    }))
}

async fn export(
    user: CurrentUser,
    audit: AuditLogger,
    pool: sqlx::MySqlPool,
    body: ReportRequest,
    format: ReportFormat,
) -> Result<FileDownload, ApiError> {
    let action = match format {
        ReportFormat::Excel => "export_excel",
        ReportFormat::Pdf => "export_pdf",
    };
    guard(&user, &audit, action).await?;

    let started = Instant::now();
    let query = body.query(&user)?;
    let table: ReportTable = query.fetch(&pool).await?;
    let bytes = match format {
        ReportFormat::Excel => excel::render(&table)?,
        ReportFormat::Pdf => pdf::render(
            query.kind.title(),
            &reports::period_label(query.start, query.end),
            &table,
        )?,
    };

    audit
        .log(
            AuditEvent::new(action)
                .resource("report", Some(query.kind.as_str().to_string()))
                .details(json!({ "rows": table.len(), "bytes": bytes.len() }))
                .timed(started),
        )
        .await;

    Ok(FileDownload {
        filename: reports::file_name(query.kind.title(), format, Utc::now().naive_utc()),
        content_type: format.mime_type(),
        bytes,
    })
}

/// POST /api/analytics/export/excel
pub async fn export_excel_post(
    Extension(user): Extension<CurrentUser>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<ReportRequest>,
) -> Result<FileDownload, ApiError> {
    export(user, audit, pool, body, ReportFormat::Excel).await
}

/// POST /api/analytics/export/pdf
pub async fn export_pdf_post(
    Extension(user): Extension<CurrentUser>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<ReportRequest>,
) -> Result<FileDownload, ApiError> {
    export(user, audit, pool, body, ReportFormat::Pdf).await
}
