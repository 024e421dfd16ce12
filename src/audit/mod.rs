// Audit trail for analytics and report actions. Writes are best effort:
// a failed insert is logged and never reaches the caller.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::MySqlPool;

use crate::database::models::audit::AuditEntry;
use crate::reports::{Cell, ReportTable};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;
const EXPORT_LIMIT: i64 = 10_000;

/// One audited action
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action_type: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: Option<Value>,
    pub execution_time_ms: Option<i64>,
}

impl AuditEvent {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            resource_type: None,
            resource_id: None,
            details: None,
            execution_time_ms: None,
        }
    }

    pub fn resource(mut self, resource_type: &str, resource_id: Option<String>) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self.resource_id = resource_id;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn timed(mut self, started: Instant) -> Self {
        self.execution_time_ms = Some(started.elapsed().as_millis() as i64);
        self
    }
}

/// Request-scoped audit writer
#[derive(Clone)]
pub struct AuditLogger {
    pool: MySqlPool,
    employee_id: Option<i64>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    enabled: bool,
}

impl AuditLogger {
    pub fn new(pool: MySqlPool, employee_id: Option<i64>, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            pool,
            employee_id,
            ip_address,
            user_agent,
            enabled: crate::config::config().security.enable_audit_logging,
        }
    }

    /// Logger for background work (scheduled runs) with no request metadata
    pub fn system(pool: MySqlPool, employee_id: i64) -> Self {
        Self::new(pool, Some(employee_id), None, None)
    }

    pub async fn log(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }
        let Some(employee_id) = self.employee_id else {
            return;
        };

        let result = sqlx::query(
            r#"
            INSERT INTO analytics_audit_log
                (employee_id, action_type, resource_type, resource_id, details, ip_address, user_agent, execution_time_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id)
        .bind(&event.action_type)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(event.details.as_ref().map(sqlx::types::Json))
        .bind(&self.ip_address)
        .bind(self.user_agent.as_deref().map(|ua| truncate(ua, 500)))
        .bind(event.execution_time_ms)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!("Audit log insert failed for '{}': {}", event.action_type, e);
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub action_type: Option<String>,
    pub employee_id: Option<i64>,
}

impl AuditQuery {
    /// (page, page_size) with page ≥ 1 and size in 1..=200
    pub fn paging(&self) -> (u32, u32) {
        let page = self.page.unwrap_or(1).max(1);
        let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        (page, size)
    }

    fn where_clause(&self) -> (String, Vec<FilterValue>) {
        let mut sql = String::from(" WHERE 1 = 1");
        let mut binds = Vec::new();
        if let Some(d) = self.start_date {
            sql.push_str(" AND DATE(a.created_at) >= ?");
            binds.push(FilterValue::Date(d));
        }
        if let Some(d) = self.end_date {
            sql.push_str(" AND DATE(a.created_at) <= ?");
            binds.push(FilterValue::Date(d));
        }
        if let Some(action) = self.action_type.as_deref().filter(|a| !a.is_empty()) {
            sql.push_str(" AND a.action_type = ?");
            binds.push(FilterValue::Text(action.to_string()));
        }
        if let Some(id) = self.employee_id {
            sql.push_str(" AND a.employee_id = ?");
            binds.push(FilterValue::Int(id));
        }
        (sql, binds)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
    Date(NaiveDate),
    Text(String),
    Int(i64),
}

macro_rules! bind_filters {
    ($query:expr, $binds:expr) => {{
        let mut q = $query;
        for value in $binds {
            q = match value {
                FilterValue::Date(d) => q.bind(*d),
                FilterValue::Text(s) => q.bind(s.clone()),
                FilterValue::Int(i) => q.bind(*i),
            };
        }
        q
    }};
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditPage {
    pub entries: Vec<AuditEntry>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ActiveUser {
    pub username: String,
    pub email: String,
    pub activity_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub days: u32,
    pub total_actions: i64,
    pub unique_users: i64,
    pub avg_execution_time: f64,
    pub today_actions: i64,
    pub by_action_type: BTreeMap<String, i64>,
    pub top_users: Vec<ActiveUser>,
}

const SELECT: &str = "SELECT a.id, a.employee_id, e.username, a.action_type, a.resource_type, a.resource_id, \
     a.details, a.ip_address, a.user_agent, a.execution_time_ms, a.created_at \
     FROM analytics_audit_log a LEFT JOIN employees e ON e.id = a.employee_id";

pub fn total_pages(total: i64, page_size: u32) -> u32 {
    if total <= 0 {
        return 0;
    }
    ((total as u64 + page_size as u64 - 1) / page_size as u64) as u32
}

pub async fn fetch_page(pool: &MySqlPool, query: &AuditQuery) -> Result<AuditPage, sqlx::Error> {
    let (page, page_size) = query.paging();
    let (filter, binds) = query.where_clause();

    let count_sql = format!("SELECT COUNT(*) FROM analytics_audit_log a{}", filter);
    let (total,): (i64,) = bind_filters!(sqlx::query_as(&count_sql), &binds).fetch_one(pool).await?;

    let sql = format!("{}{} ORDER BY a.created_at DESC, a.id DESC LIMIT ? OFFSET ?", SELECT, filter);
    let entries = bind_filters!(sqlx::query_as::<_, AuditEntry>(&sql), &binds)
        .bind(page_size as i64)
        .bind(((page - 1) as i64) * page_size as i64)
        .fetch_all(pool)
        .await?;

    Ok(AuditPage {
        entries,
        total,
        page,
        page_size,
        total_pages: total_pages(total, page_size),
    })
}

pub async fn summary(pool: &MySqlPool, days: u32) -> Result<AuditSummary, sqlx::Error> {
    let (total_actions, unique_users, avg): (i64, i64, Option<f64>) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(DISTINCT employee_id), CAST(AVG(execution_time_ms) AS DOUBLE)
        FROM analytics_audit_log
        WHERE created_at >= DATE_SUB(NOW(), INTERVAL ? DAY)
        "#,
    )
    .bind(days)
    .fetch_one(pool)
    .await?;

    let (today_actions,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM analytics_audit_log WHERE DATE(created_at) = CURDATE()")
            .fetch_one(pool)
            .await?;

    let by_action: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT action_type, COUNT(*) AS n
        FROM analytics_audit_log
        WHERE created_at >= DATE_SUB(NOW(), INTERVAL ? DAY)
        GROUP BY action_type
        ORDER BY n DESC
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    let top_users = sqlx::query_as::<_, ActiveUser>(
        r#"
        SELECT e.username, e.email, COUNT(*) AS activity_count
        FROM analytics_audit_log a
        JOIN employees e ON a.employee_id = e.id
        WHERE a.created_at >= DATE_SUB(NOW(), INTERVAL ? DAY)
        GROUP BY a.employee_id, e.username, e.email
        ORDER BY activity_count DESC
        LIMIT 10
        "#,
    )
    .bind(days)
    .fetch_all(pool)
    .await?;

    Ok(AuditSummary {
        days,
        total_actions,
        unique_users,
        avg_execution_time: avg.unwrap_or(0.0),
        today_actions,
        by_action_type: by_action.into_iter().collect(),
        top_users,
    })
}

pub async fn user_activity(pool: &MySqlPool, employee_id: i64, days: u32, limit: u32) -> Result<Vec<AuditEntry>, sqlx::Error> {
    sqlx::query_as::<_, AuditEntry>(&format!(
        "{} WHERE a.employee_id = ? AND a.created_at >= DATE_SUB(NOW(), INTERVAL ? DAY) \
         ORDER BY a.created_at DESC LIMIT ?",
        SELECT
    ))
    .bind(employee_id)
    .bind(days)
    .bind(limit.min(MAX_PAGE_SIZE * 5))
    .fetch_all(pool)
    .await
}

/// The filtered log as a table for Excel export
pub async fn export_table(pool: &MySqlPool, query: &AuditQuery) -> Result<ReportTable, sqlx::Error> {
    let (filter, binds) = query.where_clause();
    let sql = format!("{}{} ORDER BY a.created_at DESC LIMIT ?", SELECT, filter);
    let entries = bind_filters!(sqlx::query_as::<_, AuditEntry>(&sql), &binds)
        .bind(EXPORT_LIMIT)
        .fetch_all(pool)
        .await?;
    Ok(entries_table(&entries))
}

fn entries_table(entries: &[AuditEntry]) -> ReportTable {
    let mut table = ReportTable::new(&[
        "timestamp",
        "user",
        "action",
        "resource_type",
        "resource_id",
        "ip_address",
        "execution_time_ms",
        "details",
    ]);
    for e in entries {
        table.push(vec![
            e.created_at.into(),
            e.username.clone().into(),
            e.action_type.clone().into(),
            e.resource_type.clone().into(),
            e.resource_id.clone().into(),
            e.ip_address.clone().into(),
            e.execution_time_ms.into(),
            e.details.as_ref().map(|d| d.to_string()).map(Cell::Text).unwrap_or(Cell::Empty),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    #[test]
    fn paging_is_clamped() {
        assert_eq!(AuditQuery::default().paging(), (1, 50));
        let q = AuditQuery {
            page: Some(0),
            page_size: Some(5000),
            ..Default::default()
        };
        assert_eq!(q.paging(), (1, 200));
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 50), 0);
        assert_eq!(total_pages(50, 50), 1);
        assert_eq!(total_pages(51, 50), 2);
    }

    #[test]
    fn filters_bind_in_clause_order() {
        let q = AuditQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            action_type: Some("export_pdf".into()),
            employee_id: Some(4),
            ..Default::default()
        };
        let (sql, binds) = q.where_clause();
        assert!(sql.contains("DATE(a.created_at) >= ?"));
        assert!(!sql.contains("<= ?"));
        assert_eq!(binds.len(), 3);
        assert_eq!(binds[2], FilterValue::Int(4));
    }

    #[test]
    fn export_rows_flatten_details() {
        let entry = AuditEntry {
            id: 1,
            employee_id: 2,
            username: Some("amina".into()),
            action_type: "view_report".into(),
            resource_type: Some("custom_report".into()),
            resource_id: None,
            details: Some(json!({"rows": 3})),
            ip_address: None,
            user_agent: None,
            execution_time_ms: Some(12),
            created_at: Utc::now().naive_utc(),
        };
        let table = entries_table(&[entry]);
        assert_eq!(table.rows[0][7], Cell::Text("{\"rows\":3}".into()));
        assert_eq!(table.rows[0][6], Cell::Number(12.0));
    }

    #[test]
    fn long_user_agents_are_cut() {
        assert_eq!(truncate("abc", 2), "ab");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
