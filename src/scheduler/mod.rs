// Recurring report delivery. One cron job per active scheduled report of
// every usable tenant, keyed `report_{tenant}_{id}`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use once_cell::sync::OnceCell;
use serde::Serialize;
use sqlx::MySqlPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::database::models::company::Company;
use crate::database::models::report::ScheduledReport;
use crate::database::{DatabaseError, DatabaseManager};
use crate::mail::{self, parse_recipients, Mailer, SmtpMailer};
use crate::reports::{self, excel, pdf, ReportError, ReportFormat, ReportKind, ReportQuery};
use crate::services::scheduled_report_service::ScheduledReportService;
use crate::services::tenant_service::{TenantError, TenantService};
use crate::services::ServiceError;
use crate::tenant;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler error: {0:?}")]
    Cron(JobSchedulerError),
    #[error("unknown frequency '{0}'")]
    Frequency(String),
    #[error("scheduled report {0} not found")]
    NotFound(i64),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Tenant(#[from] TenantError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("database error: {0}")]
    Sql(#[from] sqlx::Error),
}

impl From<JobSchedulerError> for SchedulerError {
    fn from(err: JobSchedulerError) -> Self {
        SchedulerError::Cron(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    fn window_days(&self) -> i64 {
        match self {
            Frequency::Daily => 1,
            Frequency::Weekly => 7,
            Frequency::Monthly => 30,
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(format!("Frequency must be daily, weekly or monthly, got '{}'", other)),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Six-field cron expression (sec min hour dom mon dow), UTC
pub fn cron_expression(frequency: Frequency, hour: u32) -> String {
    match frequency {
        Frequency::Daily => format!("0 0 {} * * *", hour),
        Frequency::Weekly => format!("0 0 {} * * Mon", hour),
        Frequency::Monthly => format!("0 0 {} 1 * *", hour),
    }
}

/// Reporting window ending today
pub fn report_window(frequency: Frequency, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (today - Duration::days(frequency.window_days()), today)
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (y, m) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(y, m, 1)
        .and_then(|first| first.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// Next delivery after `now`, always at `hour`:00:00.
/// Monthly keeps the day of month, clamped to the end of a shorter month.
pub fn next_run_after(frequency: Frequency, now: NaiveDateTime, hour: u32) -> NaiveDateTime {
    let today = now.date();
    let date = match frequency {
        Frequency::Daily => today + Duration::days(1),
        Frequency::Weekly => today + Duration::days(7),
        Frequency::Monthly => {
            let (year, month) = if today.month() == 12 {
                (today.year() + 1, 1)
            } else {
                (today.year(), today.month() + 1)
            };
            let day = today.day().min(last_day_of_month(year, month));
            NaiveDate::from_ymd_opt(year, month, day).unwrap_or(today + Duration::days(30))
        }
    };
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time)
}

pub fn job_key(database: &str, report_id: i64) -> String {
    format!("report_{}_{}", database, report_id)
}

/// Whether `key` is a job of `database`. `fleet_acme` does not own the jobs of `fleet_acme_co`.
pub fn key_belongs_to(key: &str, database: &str) -> bool {
    key.strip_prefix("report_")
        .and_then(|rest| rest.strip_prefix(database))
        .and_then(|rest| rest.strip_prefix('_'))
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// Whether the company owning `database` may still receive reports.
/// A failed lookup skips the run.
async fn company_in_standing(database: &str) -> bool {
    let main = match DatabaseManager::main_pool().await {
        Ok(pool) => pool,
        Err(e) => {
            warn!("Cannot check standing of {}: {}", database, e);
            return false;
        }
    };
    match tenant::find_by_database(&main, database).await {
        Ok(Some(company)) => match tenant::check_standing(&company, Utc::now().naive_utc()) {
            Ok(()) => true,
            Err(reason) => {
                info!("Skipping reports of {}: {}", company.subdomain, reason);
                false
            }
        },
        Ok(None) => {
            info!("Skipping reports of {}: company no longer registered", database);
            false
        }
        Err(e) => {
            warn!("Cannot check standing of {}: {}", database, e);
            false
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub report_id: i64,
    pub status: String,
    pub records_count: usize,
    pub recipients_count: usize,
    pub execution_time_ms: i64,
    pub message: Option<String>,
}

/// Render the report in its configured format
pub fn render(
    kind: ReportKind,
    format: ReportFormat,
    start: NaiveDate,
    end: NaiveDate,
    table: &reports::ReportTable,
) -> Result<Vec<u8>, ReportError> {
    match format {
        ReportFormat::Excel => excel::render(table),
        ReportFormat::Pdf => pdf::render(kind.title(), &reports::period_label(start, end), table),
    }
}

/// Run one scheduled report now and record the outcome in
/// `report_execution_log`.
pub async fn execute_report(
    pool: &MySqlPool,
    report_id: i64,
    mailer: &dyn Mailer,
    send_hour: u32,
) -> Result<ExecutionOutcome, SchedulerError> {
    let report = match ScheduledReportService::new(pool.clone()).get(report_id).await {
        Ok(report) => report,
        Err(ServiceError::NotFound(_)) => return Err(SchedulerError::NotFound(report_id)),
        Err(e) => return Err(e.into()),
    };

    let started = Instant::now();
    let recipients = parse_recipients(&report.recipients);
    let now = Utc::now().naive_utc();

    let (status, records, message) = match deliver(pool, &report, &recipients, mailer, now).await {
        Ok(Delivery::Empty) => ("completed", 0, Some("No data available".to_string())),
        Ok(Delivery::Sent(n)) => ("completed", n, None),
        Ok(Delivery::MailFailed(n, err)) => {
            warn!("Report {} email failed: {}", report.id, err);
            ("failed", n, Some("Email delivery failed".to_string()))
        }
        Err(err) => {
            error!("Report {} failed: {}", report.id, err);
            ("failed", 0, Some(err.to_string()))
        }
    };
    let elapsed = started.elapsed().as_millis() as i64;

    sqlx::query(
        r#"
        INSERT INTO report_execution_log
            (scheduled_report_id, status, records_count, recipients_count, execution_time_ms, error_message)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.id)
    .bind(status)
    .bind(records as i64)
    .bind(recipients.len() as i64)
    .bind(elapsed)
    .bind(&message)
    .execute(pool)
    .await?;

    if let Ok(frequency) = report.frequency.parse::<Frequency>() {
        sqlx::query(
            r#"
            UPDATE scheduled_reports
            SET next_run_date = ?, last_run_date = ?, execution_count = execution_count + 1
            WHERE id = ?
            "#,
        )
        .bind(next_run_after(frequency, now, send_hour))
        .bind(now)
        .bind(report.id)
        .execute(pool)
        .await?;
    }

    info!("Report {} ({}) finished: {} with {} rows", report.id, report.report_name, status, records);
    Ok(ExecutionOutcome {
        report_id: report.id,
        status: status.to_string(),
        records_count: records,
        recipients_count: recipients.len(),
        execution_time_ms: elapsed,
        message,
    })
}

enum Delivery {
    Empty,
    Sent(usize),
    MailFailed(usize, mail::MailError),
}

async fn deliver(
    pool: &MySqlPool,
    report: &ScheduledReport,
    recipients: &[String],
    mailer: &dyn Mailer,
    now: NaiveDateTime,
) -> Result<Delivery, SchedulerError> {
    let kind: ReportKind = report.report_type.parse()?;
    let format: ReportFormat = report
        .report_format
        .parse()
        .map_err(|msg: String| SchedulerError::Report(ReportError::InvalidType(msg)))?;
    let frequency: Frequency = report
        .frequency
        .parse()
        .map_err(|_| SchedulerError::Frequency(report.frequency.clone()))?;

    let (start, end) = report_window(frequency, now.date());
    let table = ReportQuery::new(kind, start, end)?
        .with_filters(report.filters())
        .fetch(pool)
        .await?;
    if table.is_empty() {
        return Ok(Delivery::Empty);
    }

    let bytes = render(kind, format, start, end, &table)?;
    let email = mail::report_email(recipients.to_vec(), &report.report_name, format, bytes, now);
    match mailer.send(email).await {
        Ok(()) => Ok(Delivery::Sent(table.len())),
        Err(err) => Ok(Delivery::MailFailed(table.len(), err)),
    }
}

static SCHEDULER: OnceCell<Arc<ReportScheduler>> = OnceCell::new();

pub struct ReportScheduler {
    scheduler: JobScheduler,
    mailer: Arc<dyn Mailer>,
    send_hour: u32,
    jobs: Mutex<HashMap<String, Uuid>>,
}

impl ReportScheduler {
    pub async fn new(mailer: Arc<dyn Mailer>, send_hour: u32) -> Result<Self, SchedulerError> {
        Ok(Self {
            scheduler: JobScheduler::new().await?,
            mailer,
            send_hour,
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Build from configuration, load every tenant's reports and start
    /// ticking. The instance is kept for the request handlers.
    pub async fn start_global() -> Result<Arc<Self>, SchedulerError> {
        let send_hour = crate::config::config().reports.send_hour;
        let scheduler = Arc::new(Self::new(Arc::new(SmtpMailer::from_config()), send_hour).await?);
        let loaded = scheduler.load_all().await?;
        scheduler.scheduler.start().await?;
        info!("Report scheduler started with {} jobs", loaded);
        let _ = SCHEDULER.set(scheduler.clone());
        Ok(scheduler)
    }

    pub fn global() -> Option<Arc<Self>> {
        SCHEDULER.get().cloned()
    }

    pub async fn load_all(&self) -> Result<usize, SchedulerError> {
        let tenants = TenantService::new().await?;
        let mut loaded = 0;
        for company in tenants.usable_companies().await? {
            loaded += self.load_company(&company).await;
        }
        Ok(loaded)
    }

    /// Schedule every active report of one company; returns how many were registered
    pub async fn load_company(&self, company: &Company) -> usize {
        let pool = match DatabaseManager::tenant_pool(&company.database_name).await {
            Ok(pool) => pool,
            Err(e) => {
                warn!("Skipping reports of {}: {}", company.subdomain, e);
                return 0;
            }
        };
        let reports = match ScheduledReportService::new(pool).list_active().await {
            Ok(reports) => reports,
            Err(e) => {
                warn!("Skipping reports of {}: {}", company.subdomain, e);
                return 0;
            }
        };
        let mut loaded = 0;
        for report in &reports {
            match self.register(&company.database_name, report).await {
                Ok(()) => loaded += 1,
                Err(e) => warn!("Could not schedule report {} of {}: {}", report.id, company.subdomain, e),
            }
        }
        loaded
    }

    /// Add (or replace) the cron job for one report
    pub async fn register(&self, database: &str, report: &ScheduledReport) -> Result<(), SchedulerError> {
        self.unregister(database, report.id).await?;
        if !report.is_active {
            return Ok(());
        }

        let frequency: Frequency = report
            .frequency
            .parse()
            .map_err(|_| SchedulerError::Frequency(report.frequency.clone()))?;
        let cron = cron_expression(frequency, self.send_hour);

        let database_name = database.to_string();
        let report_id = report.id;
        let mailer = self.mailer.clone();
        let send_hour = self.send_hour;
        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let database_name = database_name.clone();
            let mailer = mailer.clone();
            Box::pin(async move {
                if !company_in_standing(&database_name).await {
                    return;
                }
                let pool = match DatabaseManager::tenant_pool(&database_name).await {
                    Ok(pool) => pool,
                    Err(e) => {
                        error!("Report {} of {}: {}", report_id, database_name, e);
                        return;
                    }
                };
                if let Err(e) = execute_report(&pool, report_id, mailer.as_ref(), send_hour).await {
                    error!("Report {} of {}: {}", report_id, database_name, e);
                }
            })
        })?;

        let uuid = self.scheduler.add(job).await?;
        let key = job_key(database, report.id);
        info!("Scheduled {} ({}) at '{}'", key, frequency, cron);
        self.jobs.lock().await.insert(key, uuid);
        Ok(())
    }

    pub async fn unregister(&self, database: &str, report_id: i64) -> Result<(), SchedulerError> {
        let removed = self.jobs.lock().await.remove(&job_key(database, report_id));
        if let Some(uuid) = removed {
            self.scheduler.remove(&uuid).await?;
        }
        Ok(())
    }

    /// Drop every job of one tenant database; returns how many were removed
    pub async fn unregister_company(&self, database: &str) -> Result<usize, SchedulerError> {
        let removed: Vec<Uuid> = {
            let mut jobs = self.jobs.lock().await;
            let keys: Vec<String> = jobs.keys().filter(|k| key_belongs_to(k, database)).cloned().collect();
            keys.iter().filter_map(|k| jobs.remove(k)).collect()
        };
        for uuid in &removed {
            self.scheduler.remove(uuid).await?;
        }
        Ok(removed.len())
    }

    pub async fn shutdown(&self) {
        let mut scheduler = self.scheduler.clone();
        if let Err(e) = scheduler.shutdown().await {
            warn!("Scheduler shutdown: {:?}", e);
        }
    }
}

/// Keep the running scheduler in step with a report row. No-op when the
/// scheduler is disabled.
pub async fn sync_report(database: &str, report: &ScheduledReport) {
    if let Some(scheduler) = ReportScheduler::global() {
        if let Err(e) = scheduler.register(database, report).await {
            warn!("Could not reschedule report {}: {}", report.id, e);
        }
    }
}

pub async fn forget_report(database: &str, report_id: i64) {
    if let Some(scheduler) = ReportScheduler::global() {
        if let Err(e) = scheduler.unregister(database, report_id).await {
            warn!("Could not unschedule report {}: {}", report_id, e);
        }
    }
}

/// Follow a change of company standing: a company in good standing gets its
/// reports (re)scheduled, anything else loses them.
pub async fn refresh_company(company: &Company) {
    let Some(scheduler) = ReportScheduler::global() else {
        return;
    };
    match tenant::check_standing(company, Utc::now().naive_utc()) {
        Ok(()) => {
            let loaded = scheduler.load_company(company).await;
            info!("Scheduled {} reports of {}", loaded, company.subdomain);
        }
        Err(reason) => match scheduler.unregister_company(&company.database_name).await {
            Ok(removed) => info!("Unscheduled {} reports of {}: {}", removed, company.subdomain, reason),
            Err(e) => warn!("Could not unschedule reports of {}: {}", company.subdomain, e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 17, 5).unwrap()
    }

    fn on_hour(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn cron_fires_at_the_send_hour() {
        assert_eq!(cron_expression(Frequency::Daily, 8), "0 0 8 * * *");
        assert_eq!(cron_expression(Frequency::Weekly, 8), "0 0 8 * * Mon");
        assert_eq!(cron_expression(Frequency::Monthly, 6), "0 0 6 1 * *");
    }

    #[test]
    fn window_ends_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(report_window(Frequency::Daily, today).0, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert_eq!(report_window(Frequency::Weekly, today).0, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(report_window(Frequency::Monthly, today), (NaiveDate::from_ymd_opt(2024, 2, 8).unwrap(), today));
    }

    #[test]
    fn next_run_lands_on_the_hour() {
        assert_eq!(next_run_after(Frequency::Daily, at(2024, 3, 9, 14), 8), on_hour(2024, 3, 10, 8));
        assert_eq!(next_run_after(Frequency::Weekly, at(2024, 12, 28, 1), 8), on_hour(2025, 1, 4, 8));
    }

    #[test]
    fn monthly_next_run_clamps_to_month_end() {
        assert_eq!(next_run_after(Frequency::Monthly, at(2024, 1, 31, 9), 8), on_hour(2024, 2, 29, 8));
        assert_eq!(next_run_after(Frequency::Monthly, at(2023, 1, 31, 9), 8), on_hour(2023, 2, 28, 8));
        assert_eq!(next_run_after(Frequency::Monthly, at(2024, 12, 15, 9), 8), on_hour(2025, 1, 15, 8));
    }

    #[test]
    fn frequency_parsing() {
        assert_eq!("monthly".parse::<Frequency>(), Ok(Frequency::Monthly));
        assert!("hourly".parse::<Frequency>().is_err());
        assert_eq!(job_key("fleet_acme", 7), "report_fleet_acme_7");
    }

    #[test]
    fn company_jobs_match_their_own_database_only() {
        assert!(key_belongs_to(&job_key("fleet_acme", 7), "fleet_acme"));
        assert!(!key_belongs_to(&job_key("fleet_acme_co", 7), "fleet_acme"));
        assert!(!key_belongs_to(&job_key("fleet_acme", 7), "fleet_acm"));
        assert!(!key_belongs_to("report_fleet_acme_", "fleet_acme"));
    }
}
