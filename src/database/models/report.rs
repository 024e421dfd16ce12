use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Vehicle/employee restriction stored with a scheduled report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilters {
    #[serde(default)]
    pub vehicle_ids: Vec<i64>,
    #[serde(default)]
    pub employee_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledReport {
    pub id: i64,
    pub report_name: String,
    pub report_type: String,
    pub frequency: String,
    pub report_format: String,
    pub recipients: String,
    pub filters: Option<Json<ReportFilters>>,
    pub is_active: bool,
    pub next_run_date: Option<NaiveDateTime>,
    pub last_run_date: Option<NaiveDateTime>,
    pub execution_count: i32,
    pub created_by: i64,
    pub created_at: NaiveDateTime,
}

impl ScheduledReport {
    pub fn filters(&self) -> ReportFilters {
        self.filters.as_ref().map(|f| f.0.clone()).unwrap_or_default()
    }
}

/// Row of `report_execution_log`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReportExecution {
    pub id: i64,
    pub scheduled_report_id: i64,
    pub executed_at: NaiveDateTime,
    pub status: String,
    pub records_count: i32,
    pub recipients_count: i32,
    pub execution_time_ms: Option<i64>,
    pub error_message: Option<String>,
}
