use axum::{extract::Path, Extension, Json};
use serde_json::json;

use crate::audit::{AuditEvent, AuditLogger};
use crate::config;
use crate::database::models::{ReportExecution, ScheduledReport};
use crate::mail::SmtpMailer;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::scheduler::{self, ExecutionOutcome};
use crate::services::scheduled_report_service::{NewScheduledReport, ScheduledReportService};
use crate::tenant::CompanyContext;

/// GET /api/scheduled-reports
pub async fn scheduled_report_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<Vec<ScheduledReport>> {
    user.require("view_reports")?;
    Ok(ApiResponse::success(ScheduledReportService::new(pool).list().await?))
}

/// POST /api/scheduled-reports - stores the report and schedules its job
pub async fn scheduled_report_create(
    Extension(user): Extension<CurrentUser>,
    Extension(company): Extension<CompanyContext>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(body): Json<NewScheduledReport>,
) -> ApiResult<ScheduledReport> {
    user.require("create_scheduled_reports")?;
    let send_hour = config::config().reports.send_hour;
    let report = ScheduledReportService::new(pool)
        .create(&body, user.id(), send_hour)
        .await?;
    scheduler::sync_report(&company.database_name, &report).await;

    audit
        .log(
            AuditEvent::new("create_scheduled_report")
                .resource("scheduled_report", Some(report.id.to_string()))
                .details(json!({
                    "report_name": report.report_name,
                    "report_type": report.report_type,
                    "frequency": report.frequency,
                })),
        )
        .await;
    Ok(ApiResponse::created(report))
}

/// POST /api/scheduled-reports/:id/toggle
pub async fn scheduled_report_toggle(
    Extension(user): Extension<CurrentUser>,
    Extension(company): Extension<CompanyContext>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<ScheduledReport> {
    user.require("create_scheduled_reports")?;
    let report = ScheduledReportService::new(pool).toggle(id).await?;
    scheduler::sync_report(&company.database_name, &report).await;
    Ok(ApiResponse::success(report))
}

/// DELETE /api/scheduled-reports/:id
pub async fn scheduled_report_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(company): Extension<CompanyContext>,
    Extension(audit): Extension<AuditLogger>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    user.require("delete_scheduled_reports")?;
    let report = ScheduledReportService::new(pool).delete(id).await?;
    scheduler::forget_report(&company.database_name, id).await;

    audit
        .log(
            AuditEvent::new("delete_scheduled_report")
                .resource("scheduled_report", Some(id.to_string()))
                .details(json!({ "report_name": report.report_name })),
        )
        .await;
    Ok(ApiResponse::no_content())
}

/// POST /api/scheduled-reports/:id/run - execute now, outside the schedule
pub async fn scheduled_report_run(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<ExecutionOutcome> {
    user.require("create_scheduled_reports")?;
    let mailer = SmtpMailer::from_config();
    let outcome = scheduler::execute_report(&pool, id, &mailer, config::config().reports.send_hour).await?;
    Ok(ApiResponse::success(outcome))
}

/// GET /api/scheduled-reports/:id/history - last 50 runs
pub async fn scheduled_report_history(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<ReportExecution>> {
    user.require("view_reports")?;
    Ok(ApiResponse::success(ScheduledReportService::new(pool).history(id).await?))
}
