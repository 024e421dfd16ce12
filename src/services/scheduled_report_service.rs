use std::collections::HashMap;

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::MySqlPool;

use super::{check_fields, ServiceError, ServiceResult};
use crate::database::models::report::{ReportExecution, ReportFilters, ScheduledReport};
use crate::mail::{looks_like_email, parse_recipients};
use crate::reports::{ReportFormat, ReportKind};
use crate::scheduler::{next_run_after, Frequency};

pub const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledReport {
    pub report_name: String,
    pub report_type: String,
    pub frequency: String,
    #[serde(default = "default_format")]
    pub report_format: String,
    pub recipients: String,
    #[serde(default)]
    pub filters: ReportFilters,
}

fn default_format() -> String {
    ReportFormat::Excel.as_str().to_string()
}

/// Field errors for a new scheduled report; the parsed frequency when valid
pub fn validate(input: &NewScheduledReport) -> ServiceResult<Frequency> {
    let mut errors = HashMap::new();
    if input.report_name.trim().is_empty() {
        errors.insert("report_name".to_string(), "Report name is required".to_string());
    }
    if input.report_type.parse::<ReportKind>().is_err() {
        errors.insert("report_type".to_string(), format!("Unknown report type '{}'", input.report_type));
    }
    let frequency = input.frequency.parse::<Frequency>();
    if let Err(msg) = &frequency {
        errors.insert("frequency".to_string(), msg.clone());
    }
    if let Err(msg) = input.report_format.parse::<ReportFormat>() {
        errors.insert("report_format".to_string(), msg);
    }
    let recipients = parse_recipients(&input.recipients);
    if recipients.is_empty() {
        errors.insert("recipients".to_string(), "At least one recipient is required".to_string());
    } else if let Some(bad) = recipients.iter().find(|r| !looks_like_email(r)) {
        errors.insert("recipients".to_string(), format!("Invalid email address '{}'", bad));
    }
    check_fields(errors)?;
    frequency.map_err(ServiceError::invalid)
}

const SELECT: &str = "SELECT id, report_name, report_type, frequency, report_format, recipients, filters, is_active, \
     next_run_date, last_run_date, execution_count, created_by, created_at FROM scheduled_reports";

pub struct ScheduledReportService {
    pool: MySqlPool,
}

impl ScheduledReportService {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> ServiceResult<Vec<ScheduledReport>> {
        Ok(sqlx::query_as::<_, ScheduledReport>(&format!("{} ORDER BY created_at DESC", SELECT))
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn list_active(&self) -> ServiceResult<Vec<ScheduledReport>> {
        Ok(sqlx::query_as::<_, ScheduledReport>(&format!("{} WHERE is_active = TRUE ORDER BY id", SELECT))
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<ScheduledReport> {
        sqlx::query_as::<_, ScheduledReport>(&format!("{} WHERE id = ?", SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Scheduled report"))
    }

    pub async fn create(&self, input: &NewScheduledReport, created_by: i64, send_hour: u32) -> ServiceResult<ScheduledReport> {
        let frequency = validate(input)?;
        let next_run: NaiveDateTime = next_run_after(frequency, Utc::now().naive_utc(), send_hour);

        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_reports
                (report_name, report_type, frequency, report_format, recipients, filters, is_active, next_run_date, created_by)
            VALUES (?, ?, ?, ?, ?, ?, TRUE, ?, ?)
            "#,
        )
        .bind(input.report_name.trim())
        .bind(&input.report_type)
        .bind(&input.frequency)
        .bind(&input.report_format)
        .bind(parse_recipients(&input.recipients).join(","))
        .bind(Json(&input.filters))
        .bind(next_run)
        .bind(created_by)
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_id() as i64).await
    }

    /// Flip `is_active`; returns the updated row
    pub async fn toggle(&self, id: i64) -> ServiceResult<ScheduledReport> {
        let result = sqlx::query("UPDATE scheduled_reports SET is_active = NOT is_active WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("Scheduled report"));
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<ScheduledReport> {
        let report = self.get(id).await?;
        sqlx::query("DELETE FROM scheduled_reports WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(report)
    }

    pub async fn history(&self, id: i64) -> ServiceResult<Vec<ReportExecution>> {
        self.get(id).await?;
        Ok(sqlx::query_as::<_, ReportExecution>(
            r#"
            SELECT id, scheduled_report_id, executed_at, status, records_count, recipients_count,
                   execution_time_ms, error_message
            FROM report_execution_log
            WHERE scheduled_report_id = ?
            ORDER BY executed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(HISTORY_LIMIT)
        .fetch_all(&self.pool)
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewScheduledReport {
        NewScheduledReport {
            report_name: "Weekly fuel".into(),
            report_type: "fuel_analysis".into(),
            frequency: "weekly".into(),
            report_format: "pdf".into(),
            recipients: "ops@acme.test, cfo@acme.test".into(),
            filters: ReportFilters::default(),
        }
    }

    #[test]
    fn valid_report_yields_frequency() {
        assert_eq!(validate(&input()).unwrap(), Frequency::Weekly);
    }

    #[test]
    fn every_bad_field_is_reported() {
        let bad = NewScheduledReport {
            report_name: " ".into(),
            report_type: "payroll".into(),
            frequency: "hourly".into(),
            report_format: "csv".into(),
            recipients: "ops@acme.test, nobody".into(),
            ..input()
        };
        match validate(&bad) {
            Err(ServiceError::Fields(f)) => {
                assert_eq!(f.len(), 5);
                assert!(f["recipients"].contains("nobody"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
