use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::{schema, DatabaseManager};

#[derive(Subcommand)]
pub enum InitCommands {
    #[command(about = "Create the main registry database and apply its schema")]
    Database,
}

pub async fn handle(cmd: InitCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        InitCommands::Database => {
            let name = config::config().database.main_database.clone();
            let existed = DatabaseManager::database_exists(&name).await?;
            if !existed {
                DatabaseManager::create_database(&name).await?;
            }
            let pool = DatabaseManager::main_pool().await?;
            schema::apply_main_schema(&pool).await?;

            let message = if existed {
                format!("Main database '{}' already existed, schema brought up to date", name)
            } else {
                format!("Main database '{}' created", name)
            };
            output_success(&output_format, &message, Some(json!({ "database": name, "created": !existed })))
        }
    }
}
