use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::*;
use crate::cli::OutputFormat;
use crate::services::tenant_service::{CompanyUpdate, SignupRequest, TenantService};

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all companies")]
    List,

    #[command(about = "Register a company and provision its database")]
    Create {
        #[arg(help = "Company display name")]
        name: String,
        #[arg(help = "Subdomain, also used for the database name")]
        subdomain: String,
        #[arg(long, help = "Company contact email")]
        email: String,
        #[arg(long, default_value = "admin", help = "Username of the first administrator")]
        admin: String,
        #[arg(long, env = "FLEET_ADMIN_PASSWORD", help = "Password of the first administrator")]
        password: String,
    },

    #[command(about = "Suspend a company; its users can no longer sign in")]
    Suspend {
        #[arg(help = "Company subdomain")]
        subdomain: String,
    },

    #[command(about = "Reactivate a suspended or expired company")]
    Activate {
        #[arg(help = "Company subdomain")]
        subdomain: String,
    },

    #[command(about = "Apply the current schema and seed data to every company database")]
    Migrate,
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new().await?;

    match cmd {
        TenantCommands::List => {
            let companies = service.list_companies().await?;
            if companies.is_empty() {
                return output_empty_collection(&output_format, "companies", "No companies registered");
            }

            match output_format {
                OutputFormat::Json => output_json(&json!({ "companies": companies }))?,
                OutputFormat::Text => {
                    println!("{:<5} {:<20} {:<25} {:<12} {:<10} {}", "ID", "SUBDOMAIN", "NAME", "PLAN", "STATUS", "CREATED");
                    println!("{}", "-".repeat(90));
                    for company in &companies {
                        println!(
                            "{:<5} {:<20} {:<25} {:<12} {:<10} {}",
                            company.id,
                            truncate(&company.subdomain, 20),
                            truncate(&company.name, 25),
                            company.plan,
                            company.status,
                            company.created_at.format("%Y-%m-%d %H:%M"),
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Create { name, subdomain, email, admin, password } => {
            let request = SignupRequest {
                company_name: name,
                subdomain,
                email,
                phone: None,
                address: None,
                admin_username: admin,
                admin_email: None,
                confirm_password: password.clone(),
                password,
            };
            let outcome = service.signup(&request).await?;

            output_success(
                &output_format,
                &format!(
                    "Company '{}' created in database {}",
                    outcome.company.subdomain, outcome.company.database_name
                ),
                Some(json!({
                    "company": outcome.company,
                    "admin_employee_code": outcome.admin_employee_code,
                })),
            )
        }
        TenantCommands::Suspend { subdomain } => set_status(&service, &subdomain, "suspended", &output_format).await,
        TenantCommands::Activate { subdomain } => set_status(&service, &subdomain, "active", &output_format).await,
        TenantCommands::Migrate => {
            let outcomes = service.migrate_all().await?;
            let failed = outcomes.iter().filter(|(_, r)| r.is_err()).count();

            match output_format {
                OutputFormat::Json => {
                    let rows: Vec<_> = outcomes
                        .iter()
                        .map(|(subdomain, result)| match result {
                            Ok(()) => json!({ "subdomain": subdomain, "success": true }),
                            Err(e) => json!({ "subdomain": subdomain, "success": false, "error": e }),
                        })
                        .collect();
                    output_json(&json!({ "migrated": rows }))?;
                }
                OutputFormat::Text => {
                    for (subdomain, result) in &outcomes {
                        match result {
                            Ok(()) => println!("✓ {}", subdomain),
                            Err(e) => println!("✗ {}: {}", subdomain, e),
                        }
                    }
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} company databases failed to migrate", failed, outcomes.len());
            }
            Ok(())
        }
    }
}

async fn set_status(
    service: &TenantService,
    subdomain: &str,
    status: &str,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let company = service.get_by_subdomain(subdomain).await?;
    let update = CompanyUpdate {
        status: Some(status.to_string()),
        ..CompanyUpdate::default()
    };
    let company = service.update_company(company.id, &update).await?;

    output_success(
        output_format,
        &format!("Company '{}' is now {}", company.subdomain, company.status),
        Some(json!({ "company": company })),
    )
}
