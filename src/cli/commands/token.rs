use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_json;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue a root token for the /api/root operator API")]
    Root {
        #[arg(default_value = "operator", help = "Name recorded in the token")]
        username: String,
        #[arg(long, default_value_t = 1, help = "Lifetime in hours")]
        hours: i64,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Root { username, hours } => {
            let claims = Claims::root(username, hours);
            let token = generate_jwt(&claims)?;

            match output_format {
                OutputFormat::Json => output_json(&json!({
                    "token": token,
                    "expires_in": claims.expires_in(),
                })),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
