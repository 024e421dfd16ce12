use serde_json::{json, Value};

use crate::cli::utils::output_json;
use crate::cli::OutputFormat;

pub async fn handle(url: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let endpoint = format!("{}/health", url.trim_end_matches('/'));
    let response = reqwest::get(&endpoint).await?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    match output_format {
        OutputFormat::Json => output_json(&json!({ "url": endpoint, "status": status.as_u16(), "body": body }))?,
        OutputFormat::Text => {
            let state = body.pointer("/data/status").and_then(Value::as_str).unwrap_or("unknown");
            println!("{} -> {} ({})", endpoint, status, state);
        }
    }

    if !status.is_success() {
        anyhow::bail!("server reported {}", status);
    }
    Ok(())
}
