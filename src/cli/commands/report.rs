use clap::Subcommand;
use serde_json::json;

use crate::audit::{AuditEvent, AuditLogger};
use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::DatabaseManager;
use crate::mail::SmtpMailer;
use crate::scheduler::execute_report;
use crate::services::scheduled_report_service::ScheduledReportService;
use crate::services::tenant_service::TenantService;

#[derive(Subcommand)]
pub enum ReportCommands {
    #[command(about = "List a company's scheduled reports")]
    List {
        #[arg(help = "Company subdomain")]
        subdomain: String,
    },

    #[command(about = "Run one scheduled report now and email it")]
    Run {
        #[arg(help = "Company subdomain")]
        subdomain: String,
        #[arg(help = "Scheduled report id")]
        id: i64,
    },
}

pub async fn handle(cmd: ReportCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ReportCommands::List { subdomain } => {
            let service = ScheduledReportService::new(company_pool(&subdomain).await?);
            let reports = service.list().await?;
            if reports.is_empty() {
                return output_empty_collection(&output_format, "reports", "No scheduled reports");
            }

            match output_format {
                OutputFormat::Json => output_json(&json!({ "reports": reports }))?,
                OutputFormat::Text => {
                    println!("{:<5} {:<25} {:<20} {:<8} {:<7} {}", "ID", "NAME", "TYPE", "FREQ", "ACTIVE", "NEXT RUN");
                    println!("{}", "-".repeat(90));
                    for report in &reports {
                        let next = report
                            .next_run_date
                            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        println!(
                            "{:<5} {:<25} {:<20} {:<8} {:<7} {}",
                            report.id,
                            truncate(&report.report_name, 25),
                            report.report_type,
                            report.frequency,
                            if report.is_active { "yes" } else { "no" },
                            next,
                        );
                    }
                }
            }
            Ok(())
        }
        ReportCommands::Run { subdomain, id } => {
            let pool = company_pool(&subdomain).await?;
            let report = ScheduledReportService::new(pool.clone()).get(id).await?;
            let mailer = SmtpMailer::from_config();
            let outcome = execute_report(&pool, id, &mailer, config::config().reports.send_hour).await?;

            AuditLogger::system(pool, report.created_by)
                .log(
                    AuditEvent::new("run_scheduled_report")
                        .resource("scheduled_report", Some(id.to_string()))
                        .details(json!({ "status": outcome.status, "source": "cli" })),
                )
                .await;

            output_success(
                &output_format,
                &format!("Report '{}' {}: {}", report.report_name, outcome.status, outcome.message.as_deref().unwrap_or("done")),
                Some(json!({ "outcome": outcome })),
            )
        }
    }
}

async fn company_pool(subdomain: &str) -> anyhow::Result<sqlx::MySqlPool> {
    let company = TenantService::new().await?.get_by_subdomain(subdomain).await?;
    Ok(DatabaseManager::tenant_pool(&company.database_name).await?)
}
